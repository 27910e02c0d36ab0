//! Resized derivatives of a master image.
//!
//! For every `(prefix, width)` entry the master is fit-resized into
//! `width x max_height(width)` and written next to it as `{prefix}{filename}`.
//! The empty prefix rewrites the master itself.
//!
//! ## Ordering
//!
//! The master entry runs first, on its own, because it overwrites the file
//! every other entry reads. Named derivatives are then produced in parallel
//! with rayon; each reads the (possibly just capped) master independently.
//!
//! The batch is all-or-nothing from the caller's point of view: the first
//! failure is returned and the caller removes whatever was written
//! ([`derivative_paths`] lists the candidates).

use crate::imaging::{Dimensions, ImageBackend, Quality, resize_to_width};
use crate::pipeline::PipelineError;
use crate::sizes::SizeTable;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One file written by [`generate_derivatives`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedDerivative {
    pub prefix: String,
    pub path: PathBuf,
    pub dimensions: Dimensions,
}

/// Path of the derivative with `prefix` next to `source`.
pub fn derivative_path(source: &Path, prefix: &str) -> PathBuf {
    if prefix.is_empty() {
        return source.to_path_buf();
    }
    let file_name = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    source.with_file_name(format!("{prefix}{file_name}"))
}

/// Paths of every named derivative `table` would produce from `source`.
///
/// The master entry is excluded: it is the source itself.
pub fn derivative_paths(source: &Path, table: &SizeTable) -> Vec<PathBuf> {
    table
        .named()
        .map(|(prefix, _)| derivative_path(source, prefix))
        .collect()
}

/// Produce every derivative in `table` from `source`.
///
/// Fails with [`PipelineError::SourceMissing`] before touching anything if the
/// source does not exist, and with [`PipelineError::PartialDerivative`] naming
/// the first entry that failed otherwise.
pub fn generate_derivatives(
    backend: &impl ImageBackend,
    source: &Path,
    table: &SizeTable,
    quality: Quality,
) -> Result<Vec<GeneratedDerivative>, PipelineError> {
    if !source.is_file() {
        return Err(PipelineError::SourceMissing(source.to_path_buf()));
    }

    let mut generated = Vec::with_capacity(table.len());

    if let Some(width) = table.master_width() {
        let dimensions = resize_to_width(backend, source, source, width, quality).map_err(|e| {
            PipelineError::PartialDerivative {
                prefix: String::new(),
                source: e,
            }
        })?;
        debug!(source = %source.display(), width, ?dimensions, "resized master");
        generated.push(GeneratedDerivative {
            prefix: String::new(),
            path: source.to_path_buf(),
            dimensions,
        });
    }

    let named: Vec<(&str, u32)> = table.named().collect();
    let results: Vec<GeneratedDerivative> = named
        .par_iter()
        .map(|&(prefix, width)| -> Result<GeneratedDerivative, PipelineError> {
            let output = derivative_path(source, prefix);
            let dimensions = resize_to_width(backend, source, &output, width, quality).map_err(
                |e| PipelineError::PartialDerivative {
                    prefix: prefix.to_string(),
                    source: e,
                },
            )?;
            debug!(output = %output.display(), prefix, width, ?dimensions, "wrote derivative");
            Ok(GeneratedDerivative {
                prefix: prefix.to_string(),
                path: output,
                dimensions,
            })
        })
        .collect::<Result<_, PipelineError>>()?;

    generated.extend(results);
    Ok(generated)
}
