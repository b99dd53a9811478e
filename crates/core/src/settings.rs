//! Per-user settings stored in `~/.ramupload.yaml`.
//!
//! The host PC password only needs to be entered once; after that it is
//! remembered here unless the password changes.

use crate::constants::USER_SETTINGS_FILENAME;
use crate::{UploadError, UploadResult};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UserSettings {
    pub host_pc: HostPcCredentials,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HostPcCredentials {
    pub password: Option<String>,
}

impl UserSettings {
    /// Default location: `~/.ramupload.yaml`.
    pub fn default_path() -> UploadResult<PathBuf> {
        let home = dirs::home_dir().ok_or(UploadError::HomeDirNotFound)?;
        Ok(home.join(USER_SETTINGS_FILENAME))
    }

    /// Loads settings, returning defaults when the file does not exist.
    pub fn load(path: &Path) -> UploadResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(|source| UploadError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Writes settings, readable only by the owner on Unix.
    ///
    /// A new file is created with mode 0600, so the password is never
    /// readable by others, even briefly. An existing file is tightened to
    /// 0600 as well.
    pub fn save(&self, path: &Path) -> UploadResult<()> {
        let yaml = serde_yaml::to_string(self)?;
        let write_err = |source| UploadError::ConfigWrite {
            path: path.to_path_buf(),
            source,
        };

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path).map_err(write_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(write_err)?;
        }
        file.write_all(yaml.as_bytes()).map_err(write_err)?;
        Ok(())
    }

    pub fn host_pc_password(&self) -> Option<&str> {
        self.host_pc.password.as_deref().filter(|p| !p.is_empty())
    }

    pub fn set_host_pc_password(&mut self, password: impl Into<String>) {
        self.host_pc.password = Some(password.into());
    }
}
