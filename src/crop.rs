//! Re-cropping a stored image from its preserved original.
//!
//! The crop box is always applied to `{id}_original.{ext}`, never to the
//! current master, so repeated crops do not compound.
//!
//! ## Staging
//!
//! The new master and every named derivative are first written under a
//! `_staged` name:
//!
//! ```text
//! 3/7/1/abc_staged.jpg          new master
//! 3/7/1/small_abc_staged.jpg    refreshed derivative
//! ```
//!
//! Only when the whole batch succeeded are they renamed over the live files,
//! derivatives first and the master last. On failure the staged files are
//! removed and the previous master and derivatives stay untouched.

use crate::config::PipelineConfig;
use crate::derivatives::{GeneratedDerivative, derivative_path, generate_derivatives};
use crate::imaging::{
    CropBox, Dimensions, ImageBackend, Quality, crop_and_rotate, get_dimensions, resize_to_width,
};
use crate::naming::{STAGED_POSTFIX, add_postfix_to_file};
use crate::pipeline::PipelineError;
use crate::reclaim::remove_best_effort;
use crate::sizes::SizeTable;
use crate::types::{Cropped, DerivativeFile, StoredImagePath};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Staging name for `path`: `_staged` inserted before the extension.
pub fn staged_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(add_postfix_to_file(&file_name, STAGED_POSTFIX))
}

/// Replace the master of `stored` with `crop` of its original rotated
/// clockwise by `rotate_degrees`, then refresh every named derivative.
///
/// The master entry of `table` is ignored: a cropped master keeps the size
/// the crop box gives it, downscaled only when wider than `max_width`.
pub fn crop(
    backend: &impl ImageBackend,
    config: &PipelineConfig,
    table: &SizeTable,
    stored: &StoredImagePath,
    crop: CropBox,
    rotate_degrees: f32,
) -> Result<Cropped, PipelineError> {
    let root = &config.save_path_root;
    let original = stored.original_path(root);
    if !original.is_file() {
        return Err(PipelineError::SourceMissing(original));
    }
    if !rotate_degrees.is_finite() {
        return Err(PipelineError::InvalidCrop(format!(
            "rotation must be a finite angle, got {rotate_degrees}"
        )));
    }

    let (width, height) =
        get_dimensions(backend, &original).map_err(|e| PipelineError::from_backend(&original, e))?;
    if !crop.fits_within(width, height) {
        return Err(PipelineError::InvalidCrop(format!(
            "box {}x{}+{}+{} does not fit inside the {width}x{height} original",
            crop.width, crop.height, crop.x, crop.y
        )));
    }

    let master = stored.to_native(root);
    let staged_master = staged_path(&master);
    let named = table.without_master();
    let quality = Quality::new(config.quality);

    let target = CropTarget {
        crop,
        rotate_degrees,
        max_width: config.max_width,
        quality,
    };
    let result = stage(backend, &original, &staged_master, &target, &named)
        .and_then(|(dimensions, generated)| {
            commit(&master, &staged_master, &generated)?;
            Ok((dimensions, generated))
        });
    let (dimensions, generated) = match result {
        Ok(done) => done,
        Err(e) => {
            let mut leftovers = vec![staged_master.clone()];
            leftovers.extend(named.named().map(|(prefix, _)| derivative_path(&staged_master, prefix)));
            let cleanup = remove_best_effort(leftovers);
            warn!(stored = %stored, error = %e, discarded = cleanup.removed.len(), "crop failed");
            return Err(e);
        }
    };

    info!(
        stored = %stored,
        crop = ?crop,
        rotate = rotate_degrees,
        master = ?dimensions,
        derivatives = generated.len(),
        "cropped image"
    );
    Ok(Cropped {
        stored: stored.clone(),
        master: dimensions,
        derivatives: generated
            .into_iter()
            .map(|g| DerivativeFile {
                path: stored.with_prefix(&g.prefix),
                prefix: g.prefix,
                width: g.dimensions.width,
                height: g.dimensions.height,
            })
            .collect(),
    })
}

struct CropTarget {
    crop: CropBox,
    rotate_degrees: f32,
    max_width: u32,
    quality: Quality,
}

/// Write the new master and its derivatives under staged names.
///
/// The master is held to `max_width` like an ingested one; rotation can
/// widen the box past it.
fn stage(
    backend: &impl ImageBackend,
    original: &Path,
    staged_master: &Path,
    target: &CropTarget,
    named: &SizeTable,
) -> Result<(Dimensions, Vec<GeneratedDerivative>), PipelineError> {
    let backend_err = |e| PipelineError::from_backend(staged_master, e);
    let mut dimensions = crop_and_rotate(
        backend,
        original,
        staged_master,
        target.crop,
        target.rotate_degrees,
        target.quality,
    )
    .map_err(backend_err)?;
    if dimensions.width > target.max_width {
        let capped =
            resize_to_width(backend, staged_master, staged_master, target.max_width, target.quality)
                .map_err(backend_err)?;
        debug!(from = ?dimensions, to = ?capped, "downscaled cropped master");
        dimensions = capped;
    }
    debug!(staged = %staged_master.display(), ?dimensions, "staged cropped master");
    let generated = generate_derivatives(backend, staged_master, named, target.quality)?;
    Ok((dimensions, generated))
}

/// Rename staged files over the live ones, derivatives before the master.
fn commit(
    master: &Path,
    staged_master: &Path,
    generated: &[GeneratedDerivative],
) -> Result<(), PipelineError> {
    let renames = generated
        .iter()
        .map(|g| (g.path.clone(), derivative_path(master, &g.prefix)))
        .chain(std::iter::once((staged_master.to_path_buf(), master.to_path_buf())));
    for (from, to) in renames {
        std::fs::rename(&from, &to)
            .map_err(|source| PipelineError::StorageWrite { path: to, source })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::test_helpers::{list_files, test_config};
    use tempfile::TempDir;

    struct Fixture {
        tmp: TempDir,
        config: PipelineConfig,
        stored: StoredImagePath,
        backend: MockBackend,
    }

    /// A stored image `1/2/3/abc.jpg` with a 2000x1000 original and one
    /// `small_` derivative already on disk.
    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let stored = StoredImagePath::parse("1/2/3/abc.jpg").unwrap();
        let backend = MockBackend::new();

        std::fs::create_dir_all(tmp.path().join("1/2/3")).unwrap();
        for rel in ["1/2/3/abc.jpg", "1/2/3/small_abc.jpg", "1/2/3/abc_original.jpg"] {
            std::fs::write(tmp.path().join(rel), b"old").unwrap();
        }
        backend.set_size(&stored.original_path(tmp.path()), 2000, 1000);
        Fixture {
            tmp,
            config,
            stored,
            backend,
        }
    }

    fn table() -> SizeTable {
        SizeTable::new().with("", 1500).with("small_", 300)
    }

    #[test]
    fn staged_path_inserts_postfix_before_extension() {
        assert_eq!(
            staged_path(Path::new("/r/1/2/3/abc.jpg")),
            PathBuf::from("/r/1/2/3/abc_staged.jpg")
        );
    }

    #[test]
    fn crop_reads_original_and_rotates() {
        let f = fixture();

        let cropped = crop(
            &f.backend,
            &f.config,
            &table(),
            &f.stored,
            CropBox::new(100, 50, 400, 300),
            90.0,
        )
        .unwrap();

        assert_eq!(cropped.master, Dimensions::from((300, 400)));
        let original = f.stored.original_path(f.tmp.path()).to_string_lossy().to_string();
        assert!(f.backend.get_operations().iter().any(|op| matches!(
            op,
            RecordedOp::Transform { source, x: 100, y: 50, width: 400, height: 300, .. }
                if *source == original
        )));
        // Mock writes are empty; the old bytes are gone once the rename landed
        let master = f.stored.to_native(f.tmp.path());
        assert_eq!(std::fs::read(&master).unwrap(), b"");
    }

    #[test]
    fn crop_refreshes_named_derivatives_only() {
        let f = fixture();

        let cropped = crop(
            &f.backend,
            &f.config,
            &table(),
            &f.stored,
            CropBox::new(0, 0, 1000, 1000),
            0.0,
        )
        .unwrap();

        assert_eq!(cropped.derivatives.len(), 1);
        assert_eq!(cropped.derivatives[0].prefix, "small_");
        assert_eq!(cropped.derivatives[0].path, "1/2/3/small_abc.jpg");
        assert_eq!(cropped.derivatives[0].width, 300);
        assert_eq!(
            list_files(f.tmp.path()),
            vec!["1/2/3/abc.jpg", "1/2/3/abc_original.jpg", "1/2/3/small_abc.jpg"]
        );
        assert_eq!(
            std::fs::read(f.tmp.path().join("1/2/3/small_abc.jpg")).unwrap(),
            b""
        );
    }

    #[test]
    fn wide_crop_is_capped_to_max_width() {
        let f = fixture();

        let cropped = crop(
            &f.backend,
            &f.config,
            &table(),
            &f.stored,
            CropBox::new(0, 0, 2000, 1000),
            0.0,
        )
        .unwrap();

        assert_eq!(cropped.master, Dimensions::from((1500, 750)));
        let master = f.stored.to_native(f.tmp.path());
        assert_eq!(f.backend.size_of(&master), Some(Dimensions::from((1500, 750))));
        assert_eq!(
            list_files(f.tmp.path()),
            vec!["1/2/3/abc.jpg", "1/2/3/abc_original.jpg", "1/2/3/small_abc.jpg"]
        );
    }

    #[test]
    fn missing_original_is_source_missing() {
        let f = fixture();
        std::fs::remove_file(f.stored.original_path(f.tmp.path())).unwrap();

        let err = crop(
            &f.backend,
            &f.config,
            &table(),
            &f.stored,
            CropBox::new(0, 0, 10, 10),
            0.0,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::SourceMissing(_)));
    }

    #[test]
    fn box_outside_original_is_rejected() {
        let f = fixture();

        for bad in [CropBox::new(1900, 0, 200, 100), CropBox::new(0, 0, 0, 10)] {
            let err = crop(&f.backend, &f.config, &table(), &f.stored, bad, 0.0).unwrap_err();
            assert!(matches!(err, PipelineError::InvalidCrop(_)));
        }
        assert_eq!(
            std::fs::read(f.tmp.path().join("1/2/3/abc.jpg")).unwrap(),
            b"old"
        );
    }

    #[test]
    fn non_finite_rotation_is_rejected() {
        let f = fixture();
        let err = crop(
            &f.backend,
            &f.config,
            &table(),
            &f.stored,
            CropBox::new(0, 0, 10, 10),
            f32::NAN,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidCrop(_)));
    }

    #[test]
    fn failed_derivative_keeps_previous_files() {
        let f = fixture();
        f.backend.fail_on("small_");

        let err = crop(
            &f.backend,
            &f.config,
            &table(),
            &f.stored,
            CropBox::new(0, 0, 500, 500),
            0.0,
        )
        .unwrap_err();

        assert!(matches!(err, PipelineError::PartialDerivative { .. }));
        assert_eq!(
            list_files(f.tmp.path()),
            vec!["1/2/3/abc.jpg", "1/2/3/abc_original.jpg", "1/2/3/small_abc.jpg"]
        );
        for rel in ["1/2/3/abc.jpg", "1/2/3/small_abc.jpg"] {
            assert_eq!(std::fs::read(f.tmp.path().join(rel)).unwrap(), b"old");
        }
    }

    #[test]
    fn repeated_crops_start_from_original() {
        let f = fixture();

        crop(&f.backend, &f.config, &table(), &f.stored, CropBox::new(0, 0, 800, 800), 0.0)
            .unwrap();
        let second = crop(
            &f.backend,
            &f.config,
            &table(),
            &f.stored,
            CropBox::new(1000, 500, 600, 400),
            0.0,
        )
        .unwrap();

        assert_eq!(second.master, Dimensions::from((600, 400)));
        let original = f.stored.original_path(f.tmp.path()).to_string_lossy().to_string();
        let transforms: Vec<_> = f
            .backend
            .get_operations()
            .into_iter()
            .filter_map(|op| match op {
                RecordedOp::Transform { source, .. } => Some(source),
                _ => None,
            })
            .collect();
        assert_eq!(transforms, vec![original.clone(), original]);
    }
}
