//! On-disk layout of the data tree.
//!
//! Session data lives at `<root>/<experiment>/<subject>/session_<N>/`.
//! This module contains **no I/O logic**, only typed path construction and
//! session directory name parsing.

use crate::constants::{HOST_PC_DIR_NAME, SESSION_DIR_PREFIX};
use ram_types::{ExperimentId, SubjectId};
use std::path::{Path, PathBuf};

/// Returns the directory name for a session number, e.g. `session_3`.
pub fn session_dir_name(session: u32) -> String {
    format!("{SESSION_DIR_PREFIX}{session}")
}

/// Parses the session number out of a `session_<digits>` directory name.
///
/// Only ASCII digits are accepted after the prefix, so `session_+1`,
/// `session_ 2` and `session_` are rejected. Leading zeros are allowed and
/// `session_007` parses to `7`. Numbers that do not fit in a `u32` are
/// rejected.
pub fn parse_session_dir_name(name: &str) -> Option<u32> {
    let digits = name.strip_prefix(SESSION_DIR_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// `<root>/<experiment>/<subject>`
pub fn subject_dir(root: &Path, subject: &SubjectId, experiment: &ExperimentId) -> PathBuf {
    root.join(experiment.as_str()).join(subject.as_str())
}

/// `<root>/<experiment>/<subject>/session_<N>`
pub fn session_path(
    root: &Path,
    subject: &SubjectId,
    experiment: &ExperimentId,
    session: u32,
) -> PathBuf {
    subject_dir(root, subject, experiment).join(session_dir_name(session))
}

/// `<session>/host_pc`
pub fn host_pc_dir(session_dir: &Path) -> PathBuf {
    session_dir.join(HOST_PC_DIR_NAME)
}
