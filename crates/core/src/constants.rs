//! Constants used throughout the ramupload core crate.
//!
//! Directory names, filenames and defaults live here so that the data layout
//! is described in one place.

/// Directory (relative to the git work tree) used as the default data root.
pub const DATA_DIR_NAME: &str = "data";

/// Prefix of every session directory: `session_<N>`.
pub const SESSION_DIR_PREFIX: &str = "session_";

/// Directory inside a session that holds EEG data fetched from the host PC.
pub const HOST_PC_DIR_NAME: &str = "host_pc";

/// Experiment that may be transferred before any session directory exists.
pub const AMPLITUDE_DETERMINATION: &str = "AmplitudeDetermination";

/// Endpoint probed by the connectivity check.
pub const DEFAULT_CONNECTIVITY_URL: &str = "https://httpbin.org/get";

/// Default connectivity timeout in seconds.
pub const DEFAULT_CONNECTIVITY_TIMEOUT_SECS: f64 = 5.0;

/// Default lifetime, in days, of EEG data in the transferred directory.
pub const DEFAULT_TRANSFERRED_LIFETIME_DAYS: i64 = 30;

/// Tracing target for the persistent upload log.
pub const UPLOAD_LOG_TARGET: &str = "ramupload::uploadlog";

/// Filename of the persistent upload log.
pub const UPLOAD_LOG_FILENAME: &str = "upload.log";

/// Filename of the per-user settings file in the home directory.
pub const USER_SETTINGS_FILENAME: &str = ".ramupload.yaml";

/// Filename of the tool configuration looked up in the working directory.
pub const DEFAULT_CONFIG_FILENAME: &str = "ramupload.yaml";
