//! Discovery of available data under the data root.
//!
//! The data root is organised as `<root>/<experiment>/<subject>/session_<N>/`.
//! Crawling is purely a listing of the first two levels; session directories
//! are handled by [`crate::sessions`].

use crate::{UploadError, UploadResult};
use ram_types::{DirName, ExperimentId, SubjectId};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// Subjects found on disk, each with the experiments they took part in.
pub type SubjectIndex = BTreeMap<SubjectId, BTreeSet<ExperimentId>>;

/// Crawl the data directory to find available data for uploading.
///
/// Every immediate subdirectory of `root` is treated as an experiment and
/// every immediate subdirectory of an experiment as a subject. Plain files,
/// hidden entries and names that are not valid UTF-8 are skipped.
///
/// # Arguments
///
/// * `root` - The data root. Must exist and be a directory.
///
/// # Returns
///
/// A [`SubjectIndex`] keyed by subject. A subject only appears if it was
/// found under at least one experiment; an empty root yields an empty index.
///
/// # Errors
///
/// Returns `UploadError::FilesystemAccess` if `root` or one of the experiment
/// directories cannot be read.
pub fn crawl_data_dir(root: &Path) -> UploadResult<SubjectIndex> {
    let mut subjects = SubjectIndex::new();

    for experiment in list_subdirectories(root)? {
        let experiment_dir = root.join(experiment.as_str());
        for subject in list_subdirectories(&experiment_dir)? {
            tracing::info!("found experiment {} for subject {}", experiment, subject);
            subjects
                .entry(subject)
                .or_default()
                .insert(experiment.clone());
        }
    }

    Ok(subjects)
}

/// Lists the names of the visible immediate subdirectories of `dir`.
pub(crate) fn list_subdirectories(dir: &Path) -> UploadResult<Vec<DirName>> {
    let entries = fs::read_dir(dir).map_err(|e| UploadError::fs(dir, e))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| UploadError::fs(dir, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            tracing::warn!("skipping non UTF-8 directory name: {}", path.display());
            continue;
        };
        match DirName::new(&name) {
            Ok(name) if name.is_hidden() => {}
            Ok(name) => names.push(name),
            Err(e) => tracing::warn!("skipping directory {}: {}", path.display(), e),
        }
    }

    names.sort();
    Ok(names)
}
