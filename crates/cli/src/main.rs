use anyhow::Context;
use clap::{Parser, Subcommand};
use ramupload_core::config::{expand_home, resolve_data_root, timeout_from_secs};
use ramupload_core::constants::{
    AMPLITUDE_DETERMINATION, DEFAULT_CONFIG_FILENAME, UPLOAD_LOG_FILENAME, UPLOAD_LOG_TARGET,
};
use ramupload_core::{
    crawl_data_dir, get_sessions, remove_transferred_eeg_data, ConnectivityChecker, Destination,
    DirName, SubjectIndex, TransferOutcome, UploadConfig, Uploader, UserSettings,
};
use std::fs::OpenOptions;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{filter::Targets, prelude::*, EnvFilter};

mod prompt;

use prompt::Prompter;

#[derive(Parser)]
#[command(name = "ramup", version)]
#[command(about = "Upload RAM data")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Subject code
    #[arg(long, short = 's', global = true)]
    subject: Option<DirName>,
    /// Experiment type
    #[arg(long, short = 'x', global = true)]
    experiment: Option<DirName>,
    /// Session number
    #[arg(long, short = 'n', global = true)]
    session: Option<u32>,
    /// Root data directory
    #[arg(long, short = 'r', global = true)]
    dataroot: Option<PathBuf>,
    /// "Upload" files to a local directory (for testing)
    #[arg(long, short = 'l', global = true)]
    local_upload: bool,
    /// SSH key to use when uploading
    #[arg(long, short = 'k', global = true)]
    ssh_key: Option<String>,
    /// Configuration file
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Transfer EEG data from the host PC
    Host,
    /// Upload imaging data
    Imaging {
        /// Directory to upload
        src: Option<PathBuf>,
    },
    /// Upload clinical EEG data
    Clinical {
        /// Directory to upload
        src: Option<PathBuf>,
    },
    /// Upload all experimental data
    Experiment,
    /// List subjects and the experiments they ran
    Subjects,
    /// List sessions for a subject and experiment
    Sessions,
    /// Check for internet connectivity
    Check {
        /// Timeout in seconds
        #[arg(long)]
        timeout: Option<f64>,
    },
    /// Remove expired EEG data from the transferred directory
    Cleanup,
}

/// Entry point for the `ramup` upload tool.
///
/// # Environment Variables
/// - `RAMUPLOAD_CONFIG`: configuration file (default: `ramupload.yaml`)
/// - `RAMUPLOAD_DATA_DIR`: data root (default: `data/` at the top of the git work tree)
/// - `RUST_LOG`: console log filter
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing()?;

    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var_os("RAMUPLOAD_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILENAME));
    let mut config = UploadConfig::load_or_default(&config_path)?;
    if config.ramtransfer.user.is_none() {
        config.ramtransfer.user = login_name();
    }

    let mut prompter = Prompter::stdio();

    match &cli.command {
        Some(Commands::Check { timeout }) => return check_connectivity(&config, *timeout),
        Some(Commands::Cleanup) => return cleanup(&config),
        _ => {}
    }

    let dataroot = cli
        .dataroot
        .clone()
        .or_else(|| std::env::var_os("RAMUPLOAD_DATA_DIR").map(PathBuf::from));
    let dataroot = resolve_data_root(dataroot).context("could not locate the data root")?;
    let available = crawl_data_dir(&dataroot)?;

    match &cli.command {
        Some(Commands::Subjects) => {
            print_index(&available);
            return Ok(());
        }
        Some(Commands::Sessions) => {
            return list_sessions(&cli, &available, &dataroot, &mut prompter);
        }
        _ => {}
    }

    // Fail if there is no Internet connection.
    check_connectivity(&config, None)?;

    let action = match &cli.command {
        Some(Commands::Host) => "host",
        Some(Commands::Imaging { .. }) => "imaging",
        Some(Commands::Clinical { .. }) => "clinical",
        Some(Commands::Experiment) => "experiment",
        _ => prompter.action()?,
    };

    let subject = match cli.subject.clone() {
        Some(subject) => subject,
        None => {
            let subjects: Vec<DirName> = available.keys().cloned().collect();
            prompter.subject(&subjects, true)?
        }
    };

    let mut uploader = Uploader::new(subject.clone(), &dataroot, config);
    if let Some(key) = &cli.ssh_key {
        uploader = uploader.with_ssh_key(key);
    }

    match action {
        "host" | "experiment" => {
            let experiment = match cli.experiment.clone() {
                Some(experiment) => experiment,
                None => prompter.experiment(&upload_experiments(&available, &subject)?)?,
            };
            let session = match cli.session {
                Some(session) => session,
                None => {
                    let allow_any = experiment == AMPLITUDE_DETERMINATION;
                    let sessions = match get_sessions(&subject, &experiment, &dataroot) {
                        Ok(sessions) => sessions,
                        Err(_) if allow_any => Vec::new(),
                        Err(e) => return Err(e.into()),
                    };
                    prompter.session(&sessions, allow_any)?
                }
            };
            let password = host_pc_password(&mut prompter)?;

            if action == "experiment" {
                println!("Beginning experiment data upload...");
                let dest = if cli.local_upload {
                    Destination::Local(prompter.directory("Destination directory: ")?)
                } else {
                    uploader.experiment_destination()
                };
                uploader.upload_experiment_data(&experiment, session, &dest, &password)?;
                println!("Upload complete.");
            } else {
                println!("Beginning host data transfer...");
                match uploader.transfer_host_data(&experiment, session, &password)? {
                    TransferOutcome::Transferred { files } => {
                        println!("Transferred {files} files from the host PC.")
                    }
                    TransferOutcome::AlreadyPresent => println!(
                        "Host PC data already present; delete the host_pc directory to re-transfer."
                    ),
                }
            }
        }
        "imaging" | "clinical" => {
            let src = match &cli.command {
                Some(Commands::Imaging { src: Some(src) })
                | Some(Commands::Clinical { src: Some(src) }) => src.clone(),
                _ => prompter.directory(&format!("{action} directory to upload: "))?,
            };
            let dest = if cli.local_upload {
                Destination::Local(prompter.directory("Destination directory: ")?)
            } else if action == "imaging" {
                uploader.imaging_destination()
            } else {
                uploader.clinical_destination()
            };
            if action == "imaging" {
                uploader.upload_imaging(&src, &dest)?;
            } else {
                uploader.upload_clinical_eeg(&src, &dest)?;
            }
            println!("Upload complete.");
        }
        other => anyhow::bail!("unknown action: {other}"),
    }

    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(UPLOAD_LOG_FILENAME)
        .with_context(|| format!("could not open {UPLOAD_LOG_FILENAME}"))?;

    let upload_log = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .with_target(false)
        .with_filter(Targets::new().with_target(UPLOAD_LOG_TARGET, tracing::Level::INFO));

    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(console_filter()?);

    tracing_subscriber::registry()
        .with(console)
        .with(upload_log)
        .init();
    Ok(())
}

/// `RUST_LOG` plus info-level output from this tool's own crates.
fn console_filter() -> anyhow::Result<EnvFilter> {
    Ok(EnvFilter::from_default_env()
        .add_directive("ramupload_core=info".parse()?)
        .add_directive("ramupload_cli=info".parse()?)
        .add_directive(format!("{UPLOAD_LOG_TARGET}=info").parse()?))
}

fn check_connectivity(config: &UploadConfig, timeout: Option<f64>) -> anyhow::Result<()> {
    let timeout = match timeout {
        Some(secs) => timeout_from_secs(secs)?,
        None => config.connectivity.timeout()?,
    };

    print!("Checking for Internet connectivity... ");
    std::io::stdout().flush()?;
    match ConnectivityChecker::with_url(&config.connectivity.url).check(timeout) {
        Ok(()) => {
            println!("Success!");
            Ok(())
        }
        Err(e) => {
            println!("FAIL");
            Err(e.into())
        }
    }
}

fn cleanup(config: &UploadConfig) -> anyhow::Result<()> {
    let dir = expand_home(&config.transferred.dir)?;
    if !dir.exists() {
        println!("Nothing to clean up in {}.", dir.display());
        return Ok(());
    }
    let removed = remove_transferred_eeg_data(&dir, config.transferred.lifetime_days)?;
    println!("Removed {removed} expired entries.");
    Ok(())
}

fn print_index(available: &SubjectIndex) {
    if available.is_empty() {
        println!("No data found.");
        return;
    }
    for (subject, experiments) in available {
        let experiments: Vec<&str> = experiments.iter().map(DirName::as_str).collect();
        println!("{}: {}", subject, experiments.join(", "));
    }
}

fn list_sessions<R: BufRead, W: Write>(
    cli: &Cli,
    available: &SubjectIndex,
    dataroot: &std::path::Path,
    prompter: &mut Prompter<R, W>,
) -> anyhow::Result<()> {
    let subject = match cli.subject.clone() {
        Some(subject) => subject,
        None => {
            let subjects: Vec<DirName> = available.keys().cloned().collect();
            prompter.subject(&subjects, false)?
        }
    };
    let experiment = match cli.experiment.clone() {
        Some(experiment) => experiment,
        None => {
            let experiments: Vec<DirName> = available
                .get(&subject)
                .map(|set| set.iter().cloned().collect())
                .unwrap_or_default();
            prompter.experiment(&experiments)?
        }
    };

    let sessions = get_sessions(&subject, &experiment, dataroot)?;
    if sessions.is_empty() {
        println!("No sessions found.");
    } else {
        for session in sessions {
            println!("{session}");
        }
    }
    Ok(())
}

/// Experiments offered for host/experiment uploads. `AmplitudeDetermination`
/// is always offered since it runs before any session data exists.
fn upload_experiments(available: &SubjectIndex, subject: &DirName) -> anyhow::Result<Vec<DirName>> {
    let mut experiments: Vec<DirName> = available
        .get(subject)
        .map(|set| set.iter().cloned().collect())
        .unwrap_or_default();
    if !experiments.iter().any(|e| e == AMPLITUDE_DETERMINATION) {
        experiments.push(DirName::new(AMPLITUDE_DETERMINATION)?);
    }
    Ok(experiments)
}

/// Get the host PC password. This should only need to be entered once
/// unless the password is changed.
fn host_pc_password<R: BufRead, W: Write>(prompter: &mut Prompter<R, W>) -> anyhow::Result<String> {
    let path = UserSettings::default_path()?;
    let mut settings = UserSettings::load(&path)?;
    if let Some(password) = settings.host_pc_password() {
        return Ok(password.to_owned());
    }

    let password = prompter.password("Host PC password: ")?;
    settings.set_host_pc_password(password.clone());
    settings.save(&path)?;
    Ok(password)
}

fn login_name() -> Option<String> {
    ["USER", "USERNAME", "LOGNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
}
