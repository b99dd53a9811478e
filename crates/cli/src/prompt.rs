//! Interactive prompts for values not given on the command line.
//!
//! Each prompt repeats until a valid answer is entered. Typing part of an
//! option is not enough: answers must match an option exactly, or be the
//! number shown next to it.

use ram_types::DirName;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;

/// The upload actions offered when no subcommand is given.
pub const ACTIONS: [(&str, &str); 4] = [
    ("clinical", "Upload clinical EEG data"),
    ("imaging", "Upload imaging data"),
    ("host", "Transfer EEG data from the host PC"),
    ("experiment", "Upload all experimental data"),
];

pub struct Prompter<R, W> {
    input: R,
    output: W,
    /// Input is an interactive terminal, so secrets are read without echo.
    terminal: bool,
}

impl Prompter<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        let stdin = io::stdin();
        let terminal = stdin.is_terminal();
        Self {
            input: stdin.lock(),
            output: io::stdout(),
            terminal,
        }
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            terminal: false,
        }
    }

    /// Reads one trimmed line. End of input is an error so loops terminate.
    fn ask(&mut self, message: &str) -> io::Result<String> {
        write!(self.output, "{message}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed while prompting",
            ));
        }
        Ok(line.trim().to_string())
    }

    fn hint(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.output, "  {message}")
    }

    fn list<T: std::fmt::Display>(&mut self, options: &[T]) -> io::Result<()> {
        for (i, option) in options.iter().enumerate() {
            writeln!(self.output, "  {}) {}", i + 1, option)?;
        }
        Ok(())
    }

    /// Picks an option by exact text, then by its 1-based number.
    fn pick<'a, T: AsRef<str>>(options: &'a [T], answer: &str) -> Option<&'a T> {
        if let Some(option) = options.iter().find(|o| o.as_ref() == answer) {
            return Some(option);
        }
        let n = answer.parse::<usize>().ok()?;
        n.checked_sub(1).and_then(|i| options.get(i))
    }

    /// Prompt for the action to run.
    pub fn action(&mut self) -> io::Result<&'static str> {
        let descriptions: Vec<&str> = ACTIONS.iter().map(|(_, d)| *d).collect();
        self.list(&descriptions)?;
        loop {
            let answer = self.ask("Action: ")?;
            let found = ACTIONS
                .iter()
                .enumerate()
                .find(|(i, (key, desc))| {
                    answer == *key || answer == *desc || answer == (i + 1).to_string()
                })
                .map(|(_, (key, _))| *key);
            match found {
                Some(key) => return Ok(key),
                None => self.hint("Press a number to choose an action")?,
            }
        }
    }

    /// Prompt for the subject to upload data for.
    ///
    /// With `allow_any` a subject that was not found on disk is accepted, as
    /// long as it is a valid directory name.
    pub fn subject(&mut self, subjects: &[DirName], allow_any: bool) -> io::Result<DirName> {
        self.list(subjects)?;
        loop {
            let answer = self.ask("Subject: ")?;
            if let Some(subject) = Self::pick(subjects, &answer) {
                return Ok(subject.clone());
            }
            if allow_any {
                if let Ok(subject) = DirName::new(&answer) {
                    return Ok(subject);
                }
            }
            self.hint("Invalid subject")?;
        }
    }

    /// Prompt for the experiment type to upload.
    pub fn experiment(&mut self, experiments: &[DirName]) -> io::Result<DirName> {
        self.list(experiments)?;
        loop {
            let answer = self.ask("Experiment: ")?;
            if let Some(experiment) = Self::pick(experiments, &answer) {
                return Ok(experiment.clone());
            }
            self.hint("Invalid experiment")?;
        }
    }

    /// Prompt for the session number to upload.
    pub fn session(&mut self, sessions: &[u32], allow_any: bool) -> io::Result<u32> {
        if !sessions.is_empty() {
            let shown: Vec<String> = sessions.iter().map(u32::to_string).collect();
            writeln!(self.output, "  available sessions: {}", shown.join(", "))?;
        }
        loop {
            let answer = self.ask("Session: ")?;
            match answer.parse::<u32>() {
                Ok(session) if allow_any || sessions.contains(&session) => return Ok(session),
                _ => self.hint("Invalid session")?,
            }
        }
    }

    /// Prompt for a directory path that must already exist.
    pub fn directory(&mut self, message: &str) -> io::Result<PathBuf> {
        loop {
            let answer = self.ask(message)?;
            if answer.is_empty() {
                continue;
            }
            let path = PathBuf::from(&answer);
            if path.is_dir() {
                return Ok(path);
            }
            self.hint("Not a directory")?;
        }
    }

    /// Prompt for a non-empty secret. Typing is not echoed on a terminal.
    pub fn password(&mut self, message: &str) -> io::Result<String> {
        loop {
            let answer = if self.terminal {
                self.output.flush()?;
                rpassword::prompt_password(message)?.trim().to_string()
            } else {
                self.ask(message)?
            };
            if !answer.is_empty() {
                return Ok(answer);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn prompter(input: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    fn names(items: &[&str]) -> Vec<DirName> {
        items.iter().map(|s| DirName::new(s).unwrap()).collect()
    }

    #[test]
    fn test_action_by_number_and_description() {
        assert_eq!(prompter("2\n").action().unwrap(), "imaging");
        assert_eq!(
            prompter("nonsense\nUpload all experimental data\n").action().unwrap(),
            "experiment"
        );
        assert_eq!(prompter("host\n").action().unwrap(), "host");
    }

    #[test]
    fn test_subject_retries_until_valid() {
        let subjects = names(&["R0001X", "R0002X"]);
        let mut p = prompter("R9999X\nR0002X\n");
        assert_eq!(p.subject(&subjects, false).unwrap(), "R0002X");

        let output = String::from_utf8(p.output).unwrap();
        assert!(output.contains("Invalid subject"));
    }

    #[test]
    fn test_subject_allow_any_rejects_paths() {
        let subjects = names(&["R0001X"]);
        let mut p = prompter("../etc\nR0042T\n");
        assert_eq!(p.subject(&subjects, true).unwrap(), "R0042T");
    }

    #[test]
    fn test_experiment_by_number() {
        let experiments = names(&["FR1", "catFR3"]);
        assert_eq!(
            prompter("2\n").experiment(&experiments).unwrap(),
            "catFR3"
        );
    }

    #[test]
    fn test_numeric_name_matches_before_position() {
        let experiments = names(&["2", "10"]);
        assert_eq!(prompter("2\n").experiment(&experiments).unwrap(), "2");
        assert_eq!(prompter("10\n").experiment(&experiments).unwrap(), "10");
        assert_eq!(prompter("1\n").experiment(&experiments).unwrap(), "2");
    }

    #[test]
    fn test_password_from_piped_input() {
        let mut p = prompter("\nhunter2\n");
        assert!(!p.terminal);
        assert_eq!(p.password("Host PC password: ").unwrap(), "hunter2");
    }

    #[test]
    fn test_session_must_be_available() {
        let mut p = prompter("x\n7\n2\n");
        assert_eq!(p.session(&[0, 1, 2], false).unwrap(), 2);
    }

    #[test]
    fn test_session_allow_any() {
        assert_eq!(prompter("7\n").session(&[], true).unwrap(), 7);
    }

    #[test]
    fn test_directory_must_exist() {
        let temp = tempfile::TempDir::new().unwrap();
        let input = format!("/definitely/not/here\n{}\n", temp.path().display());
        let dir = prompter(&input).directory("Directory: ").unwrap();
        assert_eq!(dir, temp.path());
    }

    #[test]
    fn test_end_of_input_is_error() {
        let err = prompter("").experiment(&names(&["FR1"])).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
