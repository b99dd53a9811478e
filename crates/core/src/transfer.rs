//! Local file movement for transferred EEG data.
//!
//! This module contains functions for copying data fetched from the host PC
//! and for expiring EEG data once it has been uploaded.

use crate::constants::UPLOAD_LOG_TARGET;
use crate::layout::parse_session_dir_name;
use crate::{UploadError, UploadResult};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

/// Recursively copies a directory, logging each file as it is copied.
///
/// The destination directory is created if it doesn't exist.
///
/// # Arguments
/// * `src` - Source directory path
/// * `dst` - Destination directory path
///
/// # Errors
/// Returns `UploadError::FilesystemAccess` if:
/// - creating a destination directory fails,
/// - reading source directory entries fails,
/// - inspecting entry types fails,
/// - copying a file fails.
pub fn copy_tree(src: &Path, dst: &Path) -> UploadResult<u64> {
    if !src.is_dir() {
        return Err(UploadError::fs(
            src,
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "source directory does not exist",
            ),
        ));
    }
    fs::create_dir_all(dst).map_err(|e| UploadError::fs(dst, e))?;

    let mut copied = 0;
    for entry in fs::read_dir(src).map_err(|e| UploadError::fs(src, e))? {
        let entry = entry.map_err(|e| UploadError::fs(src, e))?;
        let ty = entry.file_type().map_err(|e| UploadError::fs(entry.path(), e))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if ty.is_dir() {
            copied += copy_tree(&src_path, &dst_path)?;
        } else {
            tracing::info!("copying {}", src_path.display());
            fs::copy(&src_path, &dst_path).map_err(|e| UploadError::fs(&src_path, e))?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Moves a directory, falling back to copy-and-delete across filesystems.
pub fn move_dir(src: &Path, dst: &Path) -> UploadResult<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| UploadError::fs(parent, e))?;
    }

    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if src.is_dir() => {
            tracing::debug!("rename of {} failed ({}); copying instead", src.display(), e);
            copy_tree(src, dst)?;
            fs::remove_dir_all(src).map_err(|e| UploadError::fs(src, e))
        }
        Err(e) => Err(UploadError::fs(src, e)),
    }
}

/// Removes transferred EEG data that is older than the lifetime limit.
///
/// Transferred data is filed as `<path>/<subject>/<experiment>/session_<N>`.
/// Each session directory is aged by the newest modification time found
/// anywhere inside it, and removed once that is more than `lifetime_days`
/// whole days in the past. Experiment and subject directories left empty by
/// a removal are pruned. Anything that does not fit the layout is left alone.
///
/// # Returns
/// The number of session directories removed.
pub fn remove_transferred_eeg_data(path: &Path, lifetime_days: i64) -> UploadResult<usize> {
    remove_transferred_eeg_data_at(path, lifetime_days, Utc::now())
}

/// Same as [`remove_transferred_eeg_data`], measuring age relative to `now`.
pub fn remove_transferred_eeg_data_at(
    path: &Path,
    lifetime_days: i64,
    now: DateTime<Utc>,
) -> UploadResult<usize> {
    let mut removed = 0;

    for subject_dir in child_dirs(path)? {
        let mut removed_here = 0;
        for experiment_dir in child_dirs(&subject_dir)? {
            let mut removed_sessions = 0;
            for session_dir in child_dirs(&experiment_dir)? {
                let is_session = session_dir
                    .file_name()
                    .and_then(|name| name.to_str())
                    .and_then(parse_session_dir_name)
                    .is_some();
                if !is_session {
                    continue;
                }

                let age_days = (now - newest_modified(&session_dir)?).num_days();
                if age_days <= lifetime_days {
                    continue;
                }

                tracing::info!(
                    target: UPLOAD_LOG_TARGET,
                    "removing {} since it is {} days old",
                    session_dir.display(),
                    age_days
                );
                fs::remove_dir_all(&session_dir).map_err(|e| UploadError::fs(&session_dir, e))?;
                removed_sessions += 1;
            }

            if removed_sessions > 0 {
                prune_if_empty(&experiment_dir)?;
            }
            removed_here += removed_sessions;
        }

        if removed_here > 0 {
            prune_if_empty(&subject_dir)?;
        }
        removed += removed_here;
    }

    Ok(removed)
}

/// Immediate subdirectories of `dir`, not following symlinks.
fn child_dirs(dir: &Path) -> UploadResult<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| UploadError::fs(dir, e))? {
        let entry = entry.map_err(|e| UploadError::fs(dir, e))?;
        let ty = entry.file_type().map_err(|e| UploadError::fs(entry.path(), e))?;
        if ty.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Newest modification time of `path` and everything beneath it.
fn newest_modified(path: &Path) -> UploadResult<DateTime<Utc>> {
    let metadata = fs::symlink_metadata(path).map_err(|e| UploadError::fs(path, e))?;
    let mut newest: DateTime<Utc> = metadata
        .modified()
        .map_err(|e| UploadError::fs(path, e))?
        .into();

    if metadata.is_dir() {
        for entry in fs::read_dir(path).map_err(|e| UploadError::fs(path, e))? {
            let entry = entry.map_err(|e| UploadError::fs(path, e))?;
            newest = newest.max(newest_modified(&entry.path())?);
        }
    }
    Ok(newest)
}

fn prune_if_empty(dir: &Path) -> UploadResult<()> {
    let mut entries = fs::read_dir(dir).map_err(|e| UploadError::fs(dir, e))?;
    if entries.next().is_none() {
        tracing::debug!("removing empty directory {}", dir.display());
        fs::remove_dir(dir).map_err(|e| UploadError::fs(dir, e))?;
    }
    Ok(())
}
