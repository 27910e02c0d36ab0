//! Shared types returned by the pipeline and persisted by callers.
//!
//! [`StoredImagePath`] is the only value a caller needs to keep: every other
//! file belonging to an image is derived from it by the rules in
//! [`naming`](crate::naming).

use crate::imaging::Dimensions;
use crate::naming::{add_prefix_to_file, original_of};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("stored image path is empty")]
    Empty,
    #[error("stored image path must be relative: {0}")]
    Absolute(String),
    #[error("stored image path contains an invalid segment: {0}")]
    InvalidSegment(String),
}

/// Relative `shard/filename` path of a master image, e.g. `3/7/1/01hq3k9x2m.jpg`.
///
/// Always `/`-separated and never contains the save root. Converted to the
/// OS-native form only when touching the filesystem ([`to_native`](Self::to_native)).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoredImagePath(String);

impl StoredImagePath {
    /// Parse and normalize a persisted identifier.
    ///
    /// Backslashes become `/`. Absolute paths, empty segments and `.`/`..`
    /// are rejected so the path can never point outside the save root.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let normalized = raw.trim().replace('\\', "/");
        if normalized.is_empty() {
            return Err(PathError::Empty);
        }
        if normalized.starts_with('/') || normalized.contains(':') {
            return Err(PathError::Absolute(raw.to_string()));
        }
        for segment in normalized.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(PathError::InvalidSegment(raw.to_string()));
            }
        }
        Ok(Self(normalized))
    }

    /// Join a shard path and a file name produced by the ingestor.
    pub(crate) fn from_parts(shard: &str, file_name: &str) -> Self {
        Self(format!("{shard}/{file_name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final segment, e.g. `01hq3k9x2m.jpg`.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Relative path of the derivative with `prefix` (the master for `""`).
    pub fn with_prefix(&self, prefix: &str) -> String {
        add_prefix_to_file(&self.0, prefix)
    }

    /// Relative path of the preserved upload.
    pub fn original(&self) -> String {
        original_of(&self.0)
    }

    /// Absolute path of the master under `root`.
    pub fn to_native(&self, root: &Path) -> PathBuf {
        join_relative(root, &self.0)
    }

    /// Absolute path of the derivative with `prefix` under `root`.
    pub fn variant_path(&self, root: &Path, prefix: &str) -> PathBuf {
        join_relative(root, &self.with_prefix(prefix))
    }

    /// Absolute path of the preserved upload under `root`.
    pub fn original_path(&self, root: &Path) -> PathBuf {
        join_relative(root, &self.original())
    }
}

/// Join a `/`-separated relative path onto `root` segment by segment.
fn join_relative(root: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .fold(root.to_path_buf(), |acc, segment| acc.join(segment))
}

impl fmt::Display for StoredImagePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for StoredImagePath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StoredImagePath> for String {
    fn from(value: StoredImagePath) -> Self {
        value.0
    }
}

/// A file that a best-effort delete could not remove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub message: String,
}

/// One resized file written by the derivative generator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivativeFile {
    /// Size prefix; empty for the master itself.
    pub prefix: String,
    /// Relative `/`-separated path.
    pub path: String,
    pub width: u32,
    pub height: u32,
}

/// Outcome of a successful ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct Ingested {
    pub stored: StoredImagePath,
    /// Relative path of the preserved upload, if the best-effort copy succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
    /// Final master dimensions.
    pub master: Dimensions,
    pub derivatives: Vec<DerivativeFile>,
}

/// Outcome of a successful crop.
#[derive(Debug, Clone, Serialize)]
pub struct Cropped {
    pub stored: StoredImagePath,
    pub master: Dimensions,
    pub derivatives: Vec<DerivativeFile>,
}

/// Outcome of a reclaim. Never an error; failures are listed for logging.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Reclaimed {
    /// Files that existed and were removed.
    pub removed: Vec<PathBuf>,
    pub failures: Vec<CleanupFailure>,
}
