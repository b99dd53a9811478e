//! Session discovery for a single subject and experiment.

use crate::layout::{parse_session_dir_name, subject_dir};
use crate::{UploadError, UploadResult};
use ram_types::{ExperimentId, SubjectId};
use std::fs;
use std::path::Path;

/// Get available sessions to upload.
///
/// Lists the immediate subdirectories of `<root>/<experiment>/<subject>` and
/// keeps those named `session_<digits>`. Anything else in the directory is
/// ignored.
///
/// The result is sorted ascending and contains each session number once,
/// even if the same number is spelled twice on disk (`session_1` and
/// `session_01`).
///
/// # Errors
///
/// Returns `UploadError::FilesystemAccess` if the subject directory does not
/// exist, is not a directory, or cannot be read.
pub fn get_sessions(
    subject: &SubjectId,
    experiment: &ExperimentId,
    root: &Path,
) -> UploadResult<Vec<u32>> {
    let dir = subject_dir(root, subject, experiment);
    let entries = fs::read_dir(&dir).map_err(|e| UploadError::fs(&dir, e))?;

    let mut sessions = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| UploadError::fs(&dir, e))?;
        if !entry.path().is_dir() {
            continue;
        }
        if let Some(session) = entry.file_name().to_str().and_then(parse_session_dir_name) {
            sessions.push(session);
        }
    }

    sessions.sort_unstable();
    sessions.dedup();
    tracing::debug!(
        "sessions for {} {}: {:?}",
        subject,
        experiment,
        sessions
    );
    Ok(sessions)
}
