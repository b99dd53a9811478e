//! # ramupload core
//!
//! Data discovery and upload plumbing for RAM session data.
//!
//! Session data is laid out on disk as:
//!
//! ```text
//! <data root>/
//! └── <experiment>/          e.g. FR1, catFR3
//!     └── <subject>/         e.g. R1042J
//!         └── session_<N>/
//!             └── host_pc/   EEG fetched from the host PC
//! ```
//!
//! This crate provides:
//! - [`crawl_data_dir`]: which subjects ran which experiments
//! - [`get_sessions`]: which sessions exist for a subject and experiment
//! - [`check_internet_connection`]: a single reachability probe with a timeout
//! - [`Uploader`]: host PC transfer, rsync uploads and expiry of uploaded EEG
//!
//! **No CLI concerns**: prompting, argument parsing and log sinks belong in
//! the `ramup` binary.
//!
//! ## Example
//!
//! ```no_run
//! use ramupload_core::{crawl_data_dir, get_sessions};
//! use std::path::Path;
//!
//! # fn main() -> ramupload_core::UploadResult<()> {
//! let root = Path::new("data");
//! for (subject, experiments) in crawl_data_dir(root)? {
//!     for experiment in &experiments {
//!         let sessions = get_sessions(&subject, experiment, root)?;
//!         println!("{subject} {experiment}: {sessions:?}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod config;
pub mod connectivity;
pub mod constants;
pub mod crawl;
pub mod error;
pub mod layout;
pub mod mount;
pub mod sessions;
pub mod settings;
pub mod transfer;
pub mod upload;

pub use config::{resolve_data_root, UploadConfig};
pub use connectivity::{check_internet_connection, ConnectivityChecker};
pub use crawl::{crawl_data_dir, SubjectIndex};
pub use error::{UploadError, UploadResult};
pub use ram_types::{DirName, ExperimentId, SubjectId};
pub use sessions::get_sessions;
pub use settings::UserSettings;
pub use transfer::remove_transferred_eeg_data;
pub use upload::{Destination, TransferOutcome, Uploader};
