//! Upload ingestion.
//!
//! Turns an upload stream into a stored image:
//!
//! ```text
//! upload ──► {shard}/{id}.{ext}            persisted byte-for-byte
//!        ──► {shard}/{id}_original.{ext}   best-effort copy, never modified again
//!        ──► master center-cropped to aspect_ratio (if set), then capped to max_width
//!        ──► {shard}/{prefix}{id}.{ext}    one per named size
//! ```
//!
//! Once the master file exists every failure is wrapped in
//! [`PipelineError::Abandoned`] so the caller knows which files to reclaim.
//! Derivatives of a failed batch are removed here.

use crate::config::PipelineConfig;
use crate::derivatives::{derivative_paths, generate_derivatives};
use crate::imaging::{
    Dimensions, ImageBackend, Quality, get_dimensions, plan_aspect_crop, resize_to_width,
};
use crate::naming::{is_plain_extension, unique_id};
use crate::pipeline::PipelineError;
use crate::reclaim::remove_best_effort;
use crate::shard;
use crate::sizes::SizeTable;
use crate::types::{DerivativeFile, Ingested, StoredImagePath};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::{debug, info, warn};

/// Persist `upload` as a new stored image and produce its derivatives.
pub fn ingest(
    backend: &impl ImageBackend,
    config: &PipelineConfig,
    table: &SizeTable,
    upload: &mut impl Read,
    extension: &str,
) -> Result<Ingested, PipelineError> {
    check_extension(config, extension)?;

    let root = &config.save_path_root;
    let shard = shard::allocate(root, config.shard_dir_mode, &mut rand::thread_rng()).map_err(
        |source| PipelineError::StorageWrite {
            path: root.clone(),
            source,
        },
    )?;
    let stored =
        StoredImagePath::from_parts(&shard.relative(), &format!("{}.{extension}", unique_id()));
    let master = stored.to_native(root);

    let bytes = persist_upload(upload, &master, config.max_file_size)?;
    info!(stored = %stored, bytes, "persisted upload");

    process_master(backend, config, table, &stored, &master).map_err(|cause| {
        PipelineError::Abandoned {
            stored: stored.clone(),
            cause: Box::new(cause),
        }
    })
}

fn check_extension(config: &PipelineConfig, extension: &str) -> Result<(), PipelineError> {
    if !is_plain_extension(extension) {
        return Err(PipelineError::UploadRejected(format!(
            "invalid file extension {extension:?}"
        )));
    }
    if !config.accepts_extension(extension) {
        return Err(PipelineError::UploadRejected(format!(
            "file type {extension:?} is not allowed (allowed: {})",
            config.file_types.join(", ")
        )));
    }
    Ok(())
}

/// Copy the upload to `dest`, leaving nothing behind on failure.
fn persist_upload(upload: &mut impl Read, dest: &Path, max_bytes: u64) -> Result<u64, PipelineError> {
    let result = copy_with_budget(upload, dest, max_bytes);
    if result.is_err() {
        remove_best_effort([dest.to_path_buf()]);
    }
    result
}

fn copy_with_budget(
    upload: &mut impl Read,
    dest: &Path,
    max_bytes: u64,
) -> Result<u64, PipelineError> {
    let storage = |source: io::Error| PipelineError::StorageWrite {
        path: dest.to_path_buf(),
        source,
    };
    let mut file = File::create(dest).map_err(storage)?;
    let written = io::copy(&mut upload.take(max_bytes.saturating_add(1)), &mut file)
        .map_err(storage)?;
    if written == 0 {
        return Err(PipelineError::UploadRejected("upload is empty".into()));
    }
    if written > max_bytes {
        return Err(PipelineError::UploadRejected(format!(
            "upload exceeds the {max_bytes} byte limit"
        )));
    }
    Ok(written)
}

/// Copy the untouched upload next to the master. A failed copy only loses the
/// ability to re-crop later, so it is logged and skipped.
fn preserve_original(stored: &StoredImagePath, master: &Path, root: &Path) -> Option<String> {
    let original = stored.original_path(root);
    match std::fs::copy(master, &original) {
        Ok(_) => Some(stored.original()),
        Err(e) => {
            warn!(path = %original.display(), error = %e, "could not preserve original upload");
            None
        }
    }
}

fn process_master(
    backend: &impl ImageBackend,
    config: &PipelineConfig,
    table: &SizeTable,
    stored: &StoredImagePath,
    master: &Path,
) -> Result<Ingested, PipelineError> {
    let original = preserve_original(stored, master, &config.save_path_root);
    let quality = Quality::new(config.quality);
    let backend_err = |e| PipelineError::from_backend(master, e);

    let mut dims = Dimensions::from(get_dimensions(backend, master).map_err(backend_err)?);

    // Crop before capping so the box is taken at full resolution
    if let Some(ratio) = config.aspect_ratio {
        let params = plan_aspect_crop(master, (dims.width, dims.height), ratio, quality);
        if params.crop.width != dims.width || params.crop.height != dims.height {
            let cropped = backend.transform(&params).map_err(backend_err)?;
            info!(stored = %stored, ratio, crop = ?params.crop, "cropped master to aspect ratio");
            dims = cropped;
        }
    }

    if dims.width > config.max_width {
        let capped =
            resize_to_width(backend, master, master, config.max_width, quality).map_err(backend_err)?;
        info!(stored = %stored, from = ?dims, to = ?capped, "downscaled master");
        dims = capped;
    }

    let effective = table.for_master_width(dims.width);
    if effective.len() < table.len() {
        debug!(stored = %stored, width = dims.width, "master already within size cap");
    }
    let generated = generate_derivatives(backend, master, &effective, quality).inspect_err(|e| {
        warn!(stored = %stored, error = %e, "derivative generation failed, removing batch");
        remove_best_effort(derivative_paths(master, &effective));
    })?;

    let mut derivatives = Vec::with_capacity(generated.len());
    for g in generated {
        if g.prefix.is_empty() {
            dims = g.dimensions;
        }
        derivatives.push(DerivativeFile {
            path: stored.with_prefix(&g.prefix),
            prefix: g.prefix,
            width: g.dimensions.width,
            height: g.dimensions.height,
        });
    }

    info!(stored = %stored, derivatives = derivatives.len(), "ingested image");
    Ok(Ingested {
        stored: stored.clone(),
        original,
        master: dims,
        derivatives,
    })
}
