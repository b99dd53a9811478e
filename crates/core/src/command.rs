//! External command templates.
//!
//! Transport commands (`rsync`, `mount_smbfs`, `umount`) are configured as
//! argument lists rather than shell strings, so values substituted into a
//! placeholder always stay within a single argument and never need quoting.
//! A placeholder is written `{name}`; `{{` and `}}` produce literal braces.

use crate::{UploadError, UploadResult};
use std::process::Command;

/// Substitutes `{name}` placeholders in a single template string.
///
/// # Errors
///
/// Returns `UploadError::InvalidInput` for an unknown placeholder or an
/// unbalanced brace.
pub fn render(template: &str, vars: &[(&str, &str)]) -> UploadResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => {
                            return Err(UploadError::InvalidInput(format!(
                                "unterminated placeholder in template: {template}"
                            )))
                        }
                    }
                }
                let value = vars
                    .iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| *value)
                    .ok_or_else(|| {
                        UploadError::InvalidInput(format!(
                            "unknown placeholder {{{name}}} in template: {template}"
                        ))
                    })?;
                out.push_str(value);
            }
            '}' => {
                return Err(UploadError::InvalidInput(format!(
                    "unmatched '}}' in template: {template}"
                )))
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

/// Renders every argument of a command template.
pub fn render_args(template: &[String], vars: &[(&str, &str)]) -> UploadResult<Vec<String>> {
    if template.is_empty() {
        return Err(UploadError::InvalidInput("command template is empty".into()));
    }
    template.iter().map(|arg| render(arg, vars)).collect()
}

/// Runs a rendered command to completion.
///
/// Any value in `secrets` is masked in the logged command line.
///
/// # Errors
///
/// Returns `CommandSpawn` if the program cannot be started and
/// `CommandFailed` if it exits unsuccessfully.
pub fn run_command(args: &[String], secrets: &[&str]) -> UploadResult<()> {
    let (program, rest) = args
        .split_first()
        .ok_or_else(|| UploadError::InvalidInput("command is empty".into()))?;

    let mut shown = args.join(" ");
    for secret in secrets.iter().filter(|s| !s.is_empty()) {
        shown = shown.replace(secret, "***");
    }
    tracing::info!("running: {}", shown);

    let status = Command::new(program)
        .args(rest)
        .status()
        .map_err(|source| UploadError::CommandSpawn {
            program: program.clone(),
            source,
        })?;

    if !status.success() {
        return Err(UploadError::CommandFailed {
            program: program.clone(),
            status,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_placeholders() {
        let out = render("{user}@{hostname}:{remote_dir}", &[
            ("user", "alice"),
            ("hostname", "transfer.example.org"),
            ("remote_dir", "/incoming"),
        ])
        .unwrap();
        assert_eq!(out, "alice@transfer.example.org:/incoming");
    }

    #[test]
    fn test_render_keeps_spaces_inside_one_argument() {
        let args = render_args(
            &["ssh -i {key}".to_string(), "{src}".to_string()],
            &[("key", "/home/a b/key"), ("src", "/data/x/")],
        )
        .unwrap();
        assert_eq!(args, vec!["ssh -i /home/a b/key", "/data/x/"]);
    }

    #[test]
    fn test_render_escaped_braces() {
        assert_eq!(render("{{literal}}", &[]).unwrap(), "{literal}");
    }

    #[test]
    fn test_render_unknown_placeholder() {
        let err = render("{missing}", &[("src", "x")]).unwrap_err();
        assert!(matches!(err, UploadError::InvalidInput(_)));
    }

    #[test]
    fn test_render_unbalanced() {
        assert!(render("{src", &[("src", "x")]).is_err());
        assert!(render("src}", &[]).is_err());
    }

    #[test]
    fn test_render_args_rejects_empty_template() {
        assert!(render_args(&[], &[]).is_err());
    }

    #[test]
    fn test_run_command_success_and_failure() {
        assert!(run_command(&["true".to_string()], &[]).is_ok());
        assert!(matches!(
            run_command(&["false".to_string()], &[]),
            Err(UploadError::CommandFailed { .. })
        ));
    }

    #[test]
    fn test_run_command_missing_program() {
        let err = run_command(&["ramupload-no-such-program".to_string()], &[]).unwrap_err();
        assert!(matches!(err, UploadError::CommandSpawn { .. }));
    }
}
