//! Temporary mount of the experiment host PC share.

use crate::command::{render_args, run_command};
use crate::config::HostPcConfig;
use crate::{UploadError, UploadResult};
use std::fs;
use std::path::{Path, PathBuf};

/// A mounted host PC share.
///
/// The share is unmounted and the temporary mount point removed when the
/// value is dropped, whether the transfer succeeded or not.
#[derive(Debug)]
pub struct HostPcMount {
    mount_point: PathBuf,
    unmount_command: Vec<String>,
}

impl HostPcMount {
    /// Mounts the host PC share on a fresh temporary directory.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the host PC address is not configured or a
    /// command template is invalid, and `CommandSpawn`/`CommandFailed` if the
    /// mount command does not succeed.
    pub fn mount(config: &HostPcConfig, password: &str) -> UploadResult<Self> {
        if config.addr.trim().is_empty() {
            return Err(UploadError::InvalidInput(
                "host_pc.addr is not configured".into(),
            ));
        }

        let mount_point = create_mount_point()?;
        match Self::run_mount(config, password, &mount_point) {
            Ok(unmount_command) => Ok(Self {
                mount_point,
                unmount_command,
            }),
            Err(e) => {
                tracing::error!("error mounting host PC: {}", e);
                remove_mount_point(&mount_point);
                Err(e)
            }
        }
    }

    fn run_mount(
        config: &HostPcConfig,
        password: &str,
        mount_point: &Path,
    ) -> UploadResult<Vec<String>> {
        let mount_point = mount_point.display().to_string();
        let mount = render_args(
            &config.mount_command,
            &[
                ("user", config.user.as_str()),
                ("password", password),
                ("addr", config.addr.as_str()),
                ("datadir", config.datadir.as_str()),
                ("mount_point", mount_point.as_str()),
            ],
        )?;
        let unmount = render_args(
            &config.unmount_command,
            &[("mount_point", mount_point.as_str())],
        )?;

        tracing::info!("mounting host PC; this may take several seconds");
        run_command(&mount, &[password])?;
        Ok(unmount)
    }

    pub fn path(&self) -> &Path {
        &self.mount_point
    }
}

impl Drop for HostPcMount {
    fn drop(&mut self) {
        tracing::info!("unmounting host PC");
        if let Err(e) = run_command(&self.unmount_command, &[]) {
            tracing::error!("error unmounting host PC: {}", e);
        }
        remove_mount_point(&self.mount_point);
    }
}

// Kept rather than cleaned up by `TempDir`, whose recursive delete must
// never run against a share that is still mounted.
fn create_mount_point() -> UploadResult<PathBuf> {
    let dir = tempfile::Builder::new()
        .prefix("ramupload-mount-")
        .tempdir()
        .map_err(|e| UploadError::fs(std::env::temp_dir(), e))?;
    Ok(dir.keep())
}

// Non-recursive: if the unmount failed the share contents must not be deleted.
fn remove_mount_point(path: &Path) {
    if let Err(e) = fs::remove_dir(path) {
        tracing::warn!(
            "unable to remove temporary mount point {}: {}",
            path.display(),
            e
        );
    }
}
