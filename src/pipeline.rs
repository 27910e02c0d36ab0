//! The assembled pipeline: configuration, backend and size tables in one
//! handle.
//!
//! [`ImagePipeline`] is what callers hold on to. It resolves the size table
//! for each operation from a [`SizeTableProvider`] and forwards to the stage
//! functions in [`ingest`](crate::ingest), [`crop`](crate::crop) and
//! [`reclaim`](crate::reclaim). `C` is the caller's context type (the owning
//! record, say) handed to dynamic size tables; it defaults to `()`.
//!
//! ```rust,no_run
//! use image_shelf::config::PipelineConfig;
//! use image_shelf::imaging::RustBackend;
//! use image_shelf::pipeline::ImagePipeline;
//!
//! let pipeline: ImagePipeline<RustBackend> =
//!     ImagePipeline::new(PipelineConfig::default(), RustBackend::new());
//! let mut upload = std::fs::File::open("photo.jpg")?;
//! let ingested = pipeline.ingest(&mut upload, "jpg", &())?;
//! println!("{}", pipeline.image_src(Some(&ingested.stored), Some("small_"), &()));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::config::PipelineConfig;
use crate::imaging::{BackendError, CropBox, ImageBackend};
use crate::sizes::{SizeTable, SizeTableProvider};
use crate::types::{Cropped, Ingested, PathError, Reclaimed, StoredImagePath};
use crate::{crop, ingest, reclaim, urls};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to write {path}: {source}")]
    StorageWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("source image not found: {0}")]
    SourceMissing(PathBuf),
    #[error("failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },
    #[error("image processing failed for {path}: {message}")]
    Processing { path: PathBuf, message: String },
    #[error("derivative {prefix:?} failed: {source}")]
    PartialDerivative {
        prefix: String,
        #[source]
        source: BackendError,
    },
    #[error("upload rejected: {0}")]
    UploadRejected(String),
    #[error("invalid stored path: {0}")]
    InvalidPath(#[from] PathError),
    #[error("invalid crop: {0}")]
    InvalidCrop(String),
    #[error("ingestion of {stored} abandoned: {cause}")]
    Abandoned {
        stored: StoredImagePath,
        #[source]
        cause: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Attribute a backend failure on `path` to the matching pipeline error.
    pub fn from_backend(path: &Path, err: BackendError) -> Self {
        match err {
            BackendError::Io(source) => Self::StorageWrite {
                path: path.to_path_buf(),
                source,
            },
            BackendError::Decode { path, message } => Self::Decode {
                path: PathBuf::from(path),
                message,
            },
            BackendError::ProcessingFailed(message) => Self::Processing {
                path: path.to_path_buf(),
                message,
            },
        }
    }

    /// Stored path whose files were left behind by a failed ingestion.
    pub fn abandoned(&self) -> Option<&StoredImagePath> {
        match self {
            Self::Abandoned { stored, .. } => Some(stored),
            _ => None,
        }
    }
}

/// Configuration, image backend and size tables assembled once and shared by
/// every operation.
pub struct ImagePipeline<B, C: ?Sized = ()> {
    config: PipelineConfig,
    backend: B,
    sizes: SizeTableProvider<C>,
}

impl<B: ImageBackend, C: ?Sized> ImagePipeline<B, C> {
    /// Pipeline using the fixed `image_sizes` table from `config`.
    pub fn new(config: PipelineConfig, backend: B) -> Self {
        let sizes = SizeTableProvider::Static(config.image_sizes.clone());
        Self {
            config,
            backend,
            sizes,
        }
    }

    /// Replace the size table source, e.g. with a per-record function.
    pub fn with_sizes(mut self, sizes: impl Into<SizeTableProvider<C>>) -> Self {
        self.sizes = sizes.into();
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Size table in effect for `ctx`.
    pub fn sizes_for(&self, ctx: &C) -> SizeTable {
        self.sizes.resolve(ctx)
    }

    /// Store a new upload and generate its derivatives.
    pub fn ingest(
        &self,
        upload: &mut impl Read,
        extension: &str,
        ctx: &C,
    ) -> Result<Ingested, PipelineError> {
        let table = self.sizes_for(ctx);
        ingest::ingest(&self.backend, &self.config, &table, upload, extension)
    }

    /// Re-crop `stored` from its original and refresh its derivatives.
    pub fn crop(
        &self,
        stored: &StoredImagePath,
        crop: CropBox,
        rotate_degrees: f32,
        ctx: &C,
    ) -> Result<Cropped, PipelineError> {
        let table = self.sizes_for(ctx);
        crop::crop(
            &self.backend,
            &self.config,
            &table,
            stored,
            crop,
            rotate_degrees,
        )
    }

    /// Delete every file of `stored`. Never fails; see [`Reclaimed::failures`].
    pub fn remove(&self, stored: &StoredImagePath, ctx: &C) -> Reclaimed {
        reclaim::reclaim(&self.config.save_path_root, stored, &self.sizes_for(ctx))
    }

    /// Ingest a new upload in place of `previous`.
    ///
    /// On success the previous image is reclaimed. On failure any files the
    /// new upload left behind are reclaimed instead and `previous` stays the
    /// caller's current value.
    pub fn replace(
        &self,
        previous: Option<&StoredImagePath>,
        upload: &mut impl Read,
        extension: &str,
        ctx: &C,
    ) -> Result<Ingested, PipelineError> {
        let table = self.sizes_for(ctx);
        let root = &self.config.save_path_root;
        match ingest::ingest(&self.backend, &self.config, &table, upload, extension) {
            Ok(ingested) => {
                if let Some(previous) = previous {
                    reclaim::reclaim(root, previous, &table);
                    info!(previous = %previous, stored = %ingested.stored, "replaced image");
                }
                Ok(ingested)
            }
            Err(e) => {
                if let Some(stored) = e.abandoned() {
                    reclaim::reclaim(root, stored, &table);
                }
                Err(e)
            }
        }
    }

    /// Public URL of `stored` at `size`, or of the placeholder image.
    pub fn image_src(&self, stored: Option<&StoredImagePath>, size: Option<&str>, ctx: &C) -> String {
        urls::image_src(&self.config, &self.sizes_for(ctx), stored, size)
    }
}
