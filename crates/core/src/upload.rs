//! Uploading of session, imaging and clinical EEG data.
//!
//! Every public operation on [`Uploader`] records its outcome in the upload
//! log (tracing target [`UPLOAD_LOG_TARGET`]), so a persistent record of what
//! was sent exists even when the terminal output is lost.

use crate::command::{render, render_args, run_command};
use crate::config::{expand_home, UploadConfig};
use crate::constants::{AMPLITUDE_DETERMINATION, UPLOAD_LOG_TARGET};
use crate::layout::{host_pc_dir, session_dir_name, session_path};
use crate::mount::HostPcMount;
use crate::transfer::{copy_tree, move_dir, remove_transferred_eeg_data};
use crate::{UploadError, UploadResult};
use ram_types::{ExperimentId, SubjectId};
use std::fs;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

/// Where an upload is sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    /// Copy into a local directory (testing, or staging on removable media).
    Local(PathBuf),
    /// Send to the upload server, into the given remote directory.
    Remote(String),
}

/// Result of fetching data from the host PC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Files were copied from the host PC.
    Transferred { files: u64 },
    /// A `host_pc` directory was already present; nothing was copied.
    AlreadyPresent,
}

/// Handles uploading of data for a single subject.
#[derive(Clone, Debug)]
pub struct Uploader {
    subject: SubjectId,
    data_root: PathBuf,
    config: UploadConfig,
}

impl Uploader {
    /// # Arguments
    ///
    /// * `subject` - Subject ID
    /// * `data_root` - Path to the root data directory
    /// * `config` - Host PC, transferred-data and remote settings
    pub fn new(subject: SubjectId, data_root: impl Into<PathBuf>, config: UploadConfig) -> Self {
        Self {
            subject,
            data_root: data_root.into(),
            config,
        }
    }

    /// Overrides the SSH key used for remote uploads.
    pub fn with_ssh_key(mut self, key: impl Into<String>) -> Self {
        self.config.ramtransfer.key = key.into();
        self
    }

    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Return the path to a given session's data.
    pub fn session_dir(&self, experiment: &ExperimentId, session: u32) -> PathBuf {
        session_path(&self.data_root, &self.subject, experiment, session)
    }

    /// Remote destination for experiment data.
    pub fn experiment_destination(&self) -> Destination {
        Destination::Remote(self.config.ramtransfer.remote_dir.clone())
    }

    /// Remote destination for imaging data.
    pub fn imaging_destination(&self) -> Destination {
        Destination::Remote(
            self.config
                .imaging
                .remote_dir
                .clone()
                .unwrap_or_else(|| self.config.ramtransfer.remote_dir.clone()),
        )
    }

    /// Remote destination for clinical EEG data.
    pub fn clinical_destination(&self) -> Destination {
        Destination::Remote(
            self.config
                .clinical
                .remote_dir
                .clone()
                .unwrap_or_else(|| self.config.ramtransfer.remote_dir.clone()),
        )
    }

    /// Uploads data using rsync.
    ///
    /// A trailing separator is added to `src` so that its *contents* are
    /// transferred rather than the directory itself.
    ///
    /// # Errors
    ///
    /// Returns `FilesystemAccess` if `src` does not exist, `InvalidInput` if the
    /// remote side is not configured, and `CommandSpawn`/`CommandFailed` if the
    /// transfer command fails.
    pub fn rsync(&self, src: &Path, dest: &Destination) -> UploadResult<()> {
        log_outcome("rsync", self.rsync_inner(src, dest))
    }

    fn rsync_inner(&self, src: &Path, dest: &Destination) -> UploadResult<()> {
        let args = self.rsync_command(src, dest)?;
        run_command(&args, &[])
    }

    /// Builds the transfer command without running it.
    pub fn rsync_command(&self, src: &Path, dest: &Destination) -> UploadResult<Vec<String>> {
        if !src.exists() {
            return Err(UploadError::fs(
                src,
                std::io::Error::new(std::io::ErrorKind::NotFound, "upload source does not exist"),
            ));
        }

        let mut src_arg = src.display().to_string();
        if !src_arg.ends_with(MAIN_SEPARATOR) {
            src_arg.push(MAIN_SEPARATOR);
        }

        let remote = &self.config.ramtransfer;
        match dest {
            Destination::Local(dir) => {
                let local_dir = dir.display().to_string();
                render_args(
                    &remote.rsync_local,
                    &[("src", src_arg.as_str()), ("local_dir", local_dir.as_str())],
                )
            }
            Destination::Remote(remote_dir) => {
                let user = remote.user.as_deref().filter(|u| !u.is_empty()).ok_or_else(|| {
                    UploadError::InvalidInput("ramtransfer.user is not set".into())
                })?;
                if remote.hostname.trim().is_empty() {
                    return Err(UploadError::InvalidInput(
                        "ramtransfer.hostname is not configured".into(),
                    ));
                }
                let key = render(&remote.key, &[("user", user)])?;
                let key = expand_home(Path::new(&key))?.display().to_string();

                render_args(
                    &remote.rsync_remote,
                    &[
                        ("src", src_arg.as_str()),
                        ("user", user),
                        ("hostname", remote.hostname.as_str()),
                        ("remote_dir", remote_dir.as_str()),
                        ("key", key.as_str()),
                    ],
                )
            }
        }
    }

    /// Upload imaging data.
    ///
    /// # Errors
    ///
    /// `src` must be an existing directory.
    pub fn upload_imaging(&self, src: &Path, dest: &Destination) -> UploadResult<()> {
        log_outcome("upload_imaging", self.upload_directory(src, dest))
    }

    /// Upload clinical EEG data. Same as [`Self::upload_imaging`] but with a
    /// different destination.
    pub fn upload_clinical_eeg(&self, src: &Path, dest: &Destination) -> UploadResult<()> {
        log_outcome("upload_clinical_eeg", self.upload_directory(src, dest))
    }

    fn upload_directory(&self, src: &Path, dest: &Destination) -> UploadResult<()> {
        let metadata = fs::metadata(src).map_err(|e| UploadError::fs(src, e))?;
        if !metadata.is_dir() {
            return Err(UploadError::NotADirectory(src.to_path_buf()));
        }
        self.rsync(src, dest)
    }

    /// Fetches the data from the host PC so it can be uploaded.
    ///
    /// Data is copied from `<share>/<subject>/<experiment>/session_<session + 1>`
    /// into `<session dir>/host_pc`; the host and task computers number
    /// sessions differently. If `host_pc` already exists nothing is copied.
    /// To re-transfer, delete that directory first.
    pub fn transfer_host_data(
        &self,
        experiment: &ExperimentId,
        session: u32,
        password: &str,
    ) -> UploadResult<TransferOutcome> {
        log_outcome(
            "transfer_host_data",
            self.transfer_host_data_inner(experiment, session, password),
        )
    }

    fn transfer_host_data_inner(
        &self,
        experiment: &ExperimentId,
        session: u32,
        password: &str,
    ) -> UploadResult<TransferOutcome> {
        let host_session = session.checked_add(1).ok_or_else(|| {
            UploadError::InvalidInput(format!("session number {session} is out of range"))
        })?;

        let task_dir = self.session_dir(experiment, session);
        if experiment == AMPLITUDE_DETERMINATION {
            fs::create_dir_all(&task_dir).map_err(|e| UploadError::fs(&task_dir, e))?;
        }

        let task_transfer_dir = host_pc_dir(&task_dir);
        if task_transfer_dir.exists() {
            tracing::warn!(
                "{} already exists; not transferring data from the host PC",
                task_transfer_dir.display()
            );
            tracing::warn!("to re-transfer, delete the host_pc directory manually");
            return Ok(TransferOutcome::AlreadyPresent);
        }

        let mount = HostPcMount::mount(&self.config.host_pc, password)?;
        let host_dir = mount
            .path()
            .join(self.subject.as_str())
            .join(experiment.as_str())
            .join(session_dir_name(host_session));
        let files = copy_tree(&host_dir, &task_transfer_dir)?;
        drop(mount);

        Ok(TransferOutcome::Transferred { files })
    }

    /// Directory that uploaded EEG data is moved into.
    pub fn transferred_dir(&self) -> UploadResult<PathBuf> {
        expand_home(&self.config.transferred.dir)
    }

    /// Moves EEG data to the transferred directory to be deleted when it's
    /// old enough.
    pub fn move_eeg_to_transferred(
        &self,
        experiment: &ExperimentId,
        session: u32,
    ) -> UploadResult<PathBuf> {
        log_outcome(
            "move_eeg_to_transferred",
            self.move_eeg_to_transferred_inner(experiment, session),
        )
    }

    fn move_eeg_to_transferred_inner(
        &self,
        experiment: &ExperimentId,
        session: u32,
    ) -> UploadResult<PathBuf> {
        let src = host_pc_dir(&self.session_dir(experiment, session));
        let dest = self
            .transferred_dir()?
            .join(self.subject.as_str())
            .join(experiment.as_str())
            .join(session_dir_name(session));
        move_dir(&src, &dest)?;
        Ok(dest)
    }

    /// Upload all data from an experiment.
    ///
    /// 1. transfer EEG data from the host PC
    /// 2. upload the whole session directory
    /// 3. move the EEG data to the transferred directory, to be expired later
    pub fn upload_experiment_data(
        &self,
        experiment: &ExperimentId,
        session: u32,
        dest: &Destination,
        password: &str,
    ) -> UploadResult<()> {
        log_outcome(
            "upload_experiment_data",
            self.upload_experiment_data_inner(experiment, session, dest, password),
        )
    }

    fn upload_experiment_data_inner(
        &self,
        experiment: &ExperimentId,
        session: u32,
        dest: &Destination,
        password: &str,
    ) -> UploadResult<()> {
        self.transfer_host_data(experiment, session, password)?;
        self.rsync(&self.session_dir(experiment, session), dest)?;
        self.move_eeg_to_transferred(experiment, session)?;
        Ok(())
    }

    /// Removes expired data from the transferred directory, if it exists.
    pub fn expire_transferred(&self) -> UploadResult<usize> {
        let dir = self.transferred_dir()?;
        if !dir.exists() {
            return Ok(0);
        }
        remove_transferred_eeg_data(&dir, self.config.transferred.lifetime_days)
    }
}

fn log_outcome<T>(operation: &str, result: UploadResult<T>) -> UploadResult<T> {
    match &result {
        Ok(_) => tracing::info!(target: UPLOAD_LOG_TARGET, "{} successfully completed", operation),
        Err(e) => tracing::error!(target: UPLOAD_LOG_TARGET, "{} failed: {}", operation, e),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use ram_types::DirName;
    use tempfile::TempDir;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn id(s: &str) -> DirName {
        DirName::new(s).unwrap()
    }

    /// Configuration that copies with `cp` instead of rsync and "mounts" a
    /// local fixture directory.
    fn local_config(host_fixture: &Path, transferred: &Path) -> UploadConfig {
        let mut config = UploadConfig::default();
        config.host_pc.addr = "127.0.0.1".into();
        config.host_pc.mount_command = strings(&[
            "cp",
            "-R",
            &format!("{}/.", host_fixture.display()),
            "{mount_point}",
        ]);
        config.host_pc.unmount_command = strings(&["rm", "-rf", "{mount_point}/R0000X"]);
        config.ramtransfer.rsync_local = strings(&["cp", "-R", "{src}.", "{local_dir}"]);
        config.transferred.dir = transferred.to_path_buf();
        config
    }

    fn uploader(root: &Path, config: UploadConfig) -> Uploader {
        Uploader::new(id("R0000X"), root, config)
    }

    #[test]
    fn test_session_dir() {
        let u = uploader(Path::new("/data"), UploadConfig::default());
        assert_eq!(
            u.session_dir(&id("FR1"), 3),
            PathBuf::from("/data/FR1/R0000X/session_3")
        );
    }

    #[test]
    fn test_rsync_local_copies_contents() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("img");
        fs::create_dir_all(&src).unwrap();
        let data: Vec<u8> = (0..=255).collect();
        fs::write(src.join("image.bmp"), &data).unwrap();
        let dest = temp.path().join("dest");
        fs::create_dir_all(&dest).unwrap();

        let u = uploader(temp.path(), local_config(temp.path(), temp.path()));
        u.rsync(&src, &Destination::Local(dest.clone())).unwrap();

        assert_eq!(fs::read(dest.join("image.bmp")).unwrap(), data);
    }

    #[test]
    fn test_rsync_missing_source() {
        let temp = TempDir::new().unwrap();
        let u = uploader(temp.path(), UploadConfig::default());
        let err = u
            .rsync(
                &temp.path().join("missing"),
                &Destination::Local(temp.path().to_path_buf()),
            )
            .unwrap_err();
        assert!(matches!(err, UploadError::FilesystemAccess { .. }));
    }

    #[test]
    fn test_rsync_command_local_adds_trailing_separator() {
        let temp = TempDir::new().unwrap();
        let u = uploader(temp.path(), UploadConfig::default());
        let args = u
            .rsync_command(temp.path(), &Destination::Local(PathBuf::from("/mnt/usb")))
            .unwrap();

        let src = format!("{}{}", temp.path().display(), MAIN_SEPARATOR);
        assert_eq!(args, strings(&["rsync", "-avh", "--progress", &src, "/mnt/usb"]));
    }

    #[test]
    fn test_rsync_command_remote() {
        let temp = TempDir::new().unwrap();
        let mut config = UploadConfig::default();
        config.ramtransfer.user = Some("alice".into());
        config.ramtransfer.hostname = "transfer.example.org".into();
        config.ramtransfer.remote_dir = "/incoming".into();
        config.ramtransfer.key = "/keys/{user}_id_rsa".into();
        config.imaging.remote_dir = Some("/imaging".into());

        let u = uploader(temp.path(), config);
        let args = u.rsync_command(temp.path(), &u.imaging_destination()).unwrap();

        assert_eq!(args[4], "ssh -i /keys/alice_id_rsa");
        assert_eq!(args[6], "alice@transfer.example.org:/imaging");

        let args = u.rsync_command(temp.path(), &u.clinical_destination()).unwrap();
        assert_eq!(args[6], "alice@transfer.example.org:/incoming");
    }

    #[test]
    fn test_ssh_key_override() {
        let temp = TempDir::new().unwrap();
        let mut config = UploadConfig::default();
        config.ramtransfer.user = Some("alice".into());
        config.ramtransfer.hostname = "transfer.example.org".into();

        let u = uploader(temp.path(), config).with_ssh_key("/tmp/other_key");
        let args = u
            .rsync_command(temp.path(), &u.experiment_destination())
            .unwrap();
        assert_eq!(args[4], "ssh -i /tmp/other_key");
    }

    #[test]
    fn test_rsync_command_remote_requires_configuration() {
        let temp = TempDir::new().unwrap();
        let mut config = UploadConfig::default();
        let u = uploader(temp.path(), config.clone());
        assert!(matches!(
            u.rsync_command(temp.path(), &u.experiment_destination()),
            Err(UploadError::InvalidInput(_))
        ));

        config.ramtransfer.user = Some("alice".into());
        let u = uploader(temp.path(), config);
        assert!(matches!(
            u.rsync_command(temp.path(), &u.experiment_destination()),
            Err(UploadError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_upload_clinical_eeg_nonexistent_path() {
        let temp = TempDir::new().unwrap();
        let u = uploader(temp.path(), UploadConfig::default());
        let err = u
            .upload_clinical_eeg(
                Path::new("nonexistantpath"),
                &Destination::Local(temp.path().to_path_buf()),
            )
            .unwrap_err();
        assert!(matches!(err, UploadError::FilesystemAccess { .. }));
    }

    #[test]
    fn test_upload_imaging_rejects_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("scan.nii");
        fs::write(&file, "x").unwrap();

        let u = uploader(temp.path(), UploadConfig::default());
        let err = u
            .upload_imaging(&file, &Destination::Local(temp.path().to_path_buf()))
            .unwrap_err();
        assert!(matches!(err, UploadError::NotADirectory(_)));
    }

    #[test]
    fn test_transfer_host_data_already_present() {
        let temp = TempDir::new().unwrap();
        let u = uploader(temp.path(), UploadConfig::default());
        fs::create_dir_all(u.session_dir(&id("FR1"), 0).join("host_pc")).unwrap();

        let outcome = u.transfer_host_data(&id("FR1"), 0, "pw").unwrap();
        assert_eq!(outcome, TransferOutcome::AlreadyPresent);
    }

    #[test]
    fn test_transfer_host_data_copies_next_host_session() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("data");
        let host = temp.path().join("host");
        fs::create_dir_all(host.join("R0000X/FR1/session_1")).unwrap();
        fs::write(host.join("R0000X/FR1/session_1/eeg.h5"), "eeg").unwrap();
        fs::create_dir_all(host.join("R0000X/FR1/session_0")).unwrap();
        fs::write(host.join("R0000X/FR1/session_0/wrong.h5"), "wrong").unwrap();

        let u = uploader(&root, local_config(&host, &temp.path().join("transferred")));
        let outcome = u.transfer_host_data(&id("FR1"), 0, "pw").unwrap();

        assert_eq!(outcome, TransferOutcome::Transferred { files: 1 });
        let host_pc = u.session_dir(&id("FR1"), 0).join("host_pc");
        assert_eq!(fs::read_to_string(host_pc.join("eeg.h5")).unwrap(), "eeg");
        assert!(!host_pc.join("wrong.h5").exists());
    }

    #[test]
    fn test_transfer_host_data_missing_host_session() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("data");
        let host = temp.path().join("host");
        fs::create_dir_all(host.join("R0000X/FR1")).unwrap();

        let u = uploader(&root, local_config(&host, &temp.path().join("transferred")));
        let err = u.transfer_host_data(&id("FR1"), 4, "pw").unwrap_err();
        assert!(matches!(err, UploadError::FilesystemAccess { .. }));
    }

    #[test]
    fn test_transfer_amplitude_determination_creates_session_dir() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("data");
        let host = temp.path().join("host");
        let exp = AMPLITUDE_DETERMINATION;
        fs::create_dir_all(host.join(format!("R0000X/{exp}/session_3"))).unwrap();
        fs::write(host.join(format!("R0000X/{exp}/session_3/amp.log")), "amp").unwrap();

        let u = uploader(&root, local_config(&host, &temp.path().join("transferred")));
        u.transfer_host_data(&id(exp), 2, "pw").unwrap();

        assert!(u.session_dir(&id(exp), 2).join("host_pc/amp.log").is_file());
    }

    #[test]
    fn test_move_eeg_to_transferred() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("data");
        let transferred = temp.path().join("transferred");
        let u = uploader(&root, local_config(temp.path(), &transferred));

        let host_pc = u.session_dir(&id("FR1"), 1).join("host_pc");
        fs::create_dir_all(&host_pc).unwrap();
        fs::write(host_pc.join("eeg.h5"), "eeg").unwrap();

        let dest = u.move_eeg_to_transferred(&id("FR1"), 1).unwrap();

        assert_eq!(dest, transferred.join("R0000X/FR1/session_1"));
        assert!(dest.join("eeg.h5").is_file());
        assert!(!host_pc.exists());
    }

    #[test]
    fn test_upload_experiment_data_end_to_end() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("data");
        let host = temp.path().join("host");
        let transferred = temp.path().join("transferred");
        let dest = temp.path().join("dest");
        fs::create_dir_all(&dest).unwrap();

        fs::create_dir_all(host.join("R0000X/FR1/session_1")).unwrap();
        fs::write(host.join("R0000X/FR1/session_1/eeg.h5"), "eeg").unwrap();

        let u = uploader(&root, local_config(&host, &transferred));
        let session_dir = u.session_dir(&id("FR1"), 0);
        fs::create_dir_all(&session_dir).unwrap();
        fs::write(session_dir.join("session.log"), "events").unwrap();

        u.upload_experiment_data(&id("FR1"), 0, &Destination::Local(dest.clone()), "pw")
            .unwrap();

        assert_eq!(fs::read_to_string(dest.join("session.log")).unwrap(), "events");
        assert_eq!(fs::read_to_string(dest.join("host_pc/eeg.h5")).unwrap(), "eeg");
        assert!(transferred.join("R0000X/FR1/session_0/eeg.h5").is_file());
        assert!(!session_dir.join("host_pc").exists());
    }

    #[test]
    fn test_expire_transferred_keeps_session_just_moved() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("data");
        let transferred = temp.path().join("transferred");
        let u = uploader(&root, local_config(temp.path(), &transferred));

        let forty_days_ago =
            std::time::SystemTime::now() - std::time::Duration::from_secs(40 * 24 * 60 * 60);
        let old_session = transferred.join("R0000X/FR1/session_0");
        fs::create_dir_all(&old_session).unwrap();
        for dir in [&old_session, &transferred.join("R0000X")] {
            fs::File::open(dir).unwrap().set_modified(forty_days_ago).unwrap();
        }

        let host_pc = u.session_dir(&id("FR1"), 1).join("host_pc");
        fs::create_dir_all(&host_pc).unwrap();
        fs::write(host_pc.join("eeg.h5"), "eeg").unwrap();
        let moved = u.move_eeg_to_transferred(&id("FR1"), 1).unwrap();

        assert_eq!(u.expire_transferred().unwrap(), 1);
        assert!(!old_session.exists());
        assert!(moved.join("eeg.h5").is_file());
    }

    #[test]
    fn test_expire_transferred_without_directory() {
        let temp = TempDir::new().unwrap();
        let u = uploader(
            temp.path(),
            local_config(temp.path(), &temp.path().join("never-created")),
        );
        assert_eq!(u.expire_transferred().unwrap(), 0);
    }
}
