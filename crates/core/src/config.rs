//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the
//! uploader. Nothing in this module reads process-wide environment variables;
//! the binary decides which override (flag, environment, default) wins and
//! hands the result in.

use crate::constants::{
    DATA_DIR_NAME, DEFAULT_CONNECTIVITY_TIMEOUT_SECS, DEFAULT_CONNECTIVITY_URL,
    DEFAULT_TRANSFERRED_LIFETIME_DAYS,
};
use crate::{UploadError, UploadResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tool configuration, normally read from `ramupload.yaml`.
///
/// Every section may be omitted; missing values fall back to defaults.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UploadConfig {
    pub host_pc: HostPcConfig,
    pub transferred: TransferredConfig,
    pub ramtransfer: RemoteConfig,
    pub imaging: RemoteDirConfig,
    pub clinical: RemoteDirConfig,
    pub connectivity: ConnectivityConfig,
}

/// Settings for mounting the experiment host PC.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HostPcConfig {
    /// Network address of the host PC.
    pub addr: String,
    /// Share name that holds the task data.
    pub datadir: String,
    /// Account used to mount the share.
    pub user: String,
    /// Placeholders: `user`, `password`, `addr`, `datadir`, `mount_point`.
    pub mount_command: Vec<String>,
    /// Placeholders: `mount_point`.
    pub unmount_command: Vec<String>,
}

impl Default for HostPcConfig {
    fn default() -> Self {
        Self {
            addr: String::new(),
            datadir: String::new(),
            user: String::new(),
            mount_command: vec![
                "mount_smbfs".into(),
                "//{user}:{password}@{addr}/{datadir}".into(),
                "{mount_point}".into(),
            ],
            unmount_command: vec!["umount".into(), "{mount_point}".into()],
        }
    }
}

/// Where EEG data goes after upload, and how long it is kept.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransferredConfig {
    /// May start with `~/`.
    pub dir: PathBuf,
    pub lifetime_days: i64,
}

impl Default for TransferredConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("~/ramupload/transferred"),
            lifetime_days: DEFAULT_TRANSFERRED_LIFETIME_DAYS,
        }
    }
}

/// The upload server.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemoteConfig {
    /// Login on the upload server. Defaults to the local login name.
    pub user: Option<String>,
    pub hostname: String,
    pub remote_dir: String,
    /// SSH key path; may reference `{user}` and start with `~/`.
    pub key: String,
    /// Placeholders: `src`, `local_dir`.
    pub rsync_local: Vec<String>,
    /// Placeholders: `src`, `user`, `hostname`, `remote_dir`, `key`.
    pub rsync_remote: Vec<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            user: None,
            hostname: String::new(),
            remote_dir: String::new(),
            key: "~/.ssh/{user}_id_rsa".into(),
            rsync_local: vec![
                "rsync".into(),
                "-avh".into(),
                "--progress".into(),
                "{src}".into(),
                "{local_dir}".into(),
            ],
            rsync_remote: vec![
                "rsync".into(),
                "-avh".into(),
                "--progress".into(),
                "-e".into(),
                "ssh -i {key}".into(),
                "{src}".into(),
                "{user}@{hostname}:{remote_dir}".into(),
            ],
        }
    }
}

/// Per-upload-kind override of the remote directory.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemoteDirConfig {
    pub remote_dir: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConnectivityConfig {
    pub url: String,
    pub timeout_secs: f64,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_CONNECTIVITY_URL.into(),
            timeout_secs: DEFAULT_CONNECTIVITY_TIMEOUT_SECS,
        }
    }
}

impl ConnectivityConfig {
    /// The configured timeout as a `Duration`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the timeout is not a positive finite number.
    pub fn timeout(&self) -> UploadResult<Duration> {
        timeout_from_secs(self.timeout_secs)
    }
}

/// Converts a timeout in (fractional) seconds to a `Duration`.
pub fn timeout_from_secs(secs: f64) -> UploadResult<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(UploadError::InvalidInput(format!(
            "timeout must be a positive number of seconds, got {secs}"
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| UploadError::InvalidInput(format!("invalid timeout {secs}: {e}")))
}

impl UploadConfig {
    /// Parses configuration from YAML text.
    pub fn from_yaml_str(yaml: &str) -> UploadResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Reads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigRead` if the file cannot be read and `Config` if it is
    /// not valid YAML for this schema.
    pub fn load(path: &Path) -> UploadResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| UploadError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&text)?;
        tracing::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Reads configuration from `path` if it exists, otherwise returns defaults.
    pub fn load_or_default(path: &Path) -> UploadResult<Self> {
        if path.is_file() {
            Self::load(path)
        } else {
            tracing::debug!(
                "no configuration at {}; using defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }
}

/// Expands a leading `~/` to the current user's home directory.
pub fn expand_home(path: &Path) -> UploadResult<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = dirs::home_dir().ok_or(UploadError::HomeDirNotFound)?;
            Ok(home.join(rest))
        }
        Err(_) => Ok(path.to_path_buf()),
    }
}

/// Resolve the data root.
///
/// If `override_dir` is provided it must be an existing directory. Otherwise
/// the data root is the `data/` directory at the top of the git work tree
/// containing the current working directory.
pub fn resolve_data_root(override_dir: Option<PathBuf>) -> UploadResult<PathBuf> {
    match override_dir {
        Some(dir) => validate_data_root(&dir),
        None => {
            let cwd = std::env::current_dir().map_err(|e| UploadError::fs(".", e))?;
            resolve_data_root_from(&cwd)
        }
    }
}

/// Resolve `<git work tree>/data` starting the repository search at `start`.
pub fn resolve_data_root_from(start: &Path) -> UploadResult<PathBuf> {
    let repo = git2::Repository::discover(start)?;
    let workdir = repo.workdir().ok_or_else(|| {
        UploadError::Git(git2::Error::from_str(
            "repository has no work tree (bare repository)",
        ))
    })?;
    validate_data_root(&workdir.join(DATA_DIR_NAME))
}

fn validate_data_root(dir: &Path) -> UploadResult<PathBuf> {
    if !dir.exists() {
        return Err(UploadError::DataRootNotFound(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(UploadError::NotADirectory(dir.to_path_buf()));
    }
    let dir = dir.canonicalize().map_err(|e| UploadError::fs(dir, e))?;
    tracing::debug!("data path: {}", dir.display());
    Ok(dir)
}
