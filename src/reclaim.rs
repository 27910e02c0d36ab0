//! Removal of every file that belongs to a stored image.
//!
//! Deletes are best-effort: a file that is already gone counts as removed, and
//! any other failure is collected into the report instead of aborting. That
//! makes [`reclaim`] idempotent: running it twice, or on a path that never
//! existed, leaves the same state and never errors.

use crate::derivatives::derivative_path;
use crate::sizes::SizeTable;
use crate::types::{CleanupFailure, Reclaimed, StoredImagePath};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Remove each path, ignoring files that do not exist.
pub fn remove_best_effort(paths: impl IntoIterator<Item = PathBuf>) -> Reclaimed {
    let mut report = Reclaimed::default();
    for path in paths {
        match std::fs::remove_file(&path) {
            Ok(()) => report.removed.push(path),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not remove file");
                report.failures.push(CleanupFailure {
                    path,
                    message: e.to_string(),
                });
            }
        }
    }
    report
}

/// Every file path a stored image may own under `root`: the master, one file
/// per named prefix in `table`, and the preserved upload.
pub fn owned_files(root: &Path, stored: &StoredImagePath, table: &SizeTable) -> Vec<PathBuf> {
    let master = stored.to_native(root);
    let mut paths = vec![master.clone()];
    paths.extend(table.named().map(|(prefix, _)| derivative_path(&master, prefix)));
    paths.push(stored.original_path(root));
    paths
}

/// Delete the master, all derivatives and the preserved upload of `stored`.
pub fn reclaim(root: &Path, stored: &StoredImagePath, table: &SizeTable) -> Reclaimed {
    let report = remove_best_effort(owned_files(root, stored, table));
    info!(
        stored = %stored,
        removed = report.removed.len(),
        failed = report.failures.len(),
        "reclaimed image"
    );
    report
}
