//! # Image Shelf
//!
//! Sharded on-disk storage for uploaded images. An upload is saved once under
//! a random shard directory, its untouched original is kept for later
//! re-cropping, and a configurable set of resized derivatives is written next
//! to it. A single relative path, the [`StoredImagePath`](types::StoredImagePath),
//! is all a caller persists.
//!
//! # Architecture: Three Operations Over One Directory Tree
//!
//! ```text
//! ingest   upload       →  3/7/1/{id}.jpg + {id}_original.jpg + {prefix}{id}.jpg
//! crop     stored path  →  master rebuilt from {id}_original.jpg, derivatives refreshed
//! reclaim  stored path  →  every file above deleted (best-effort, idempotent)
//! ```
//!
//! The three share a naming scheme ([`naming`]) and a derivative generator
//! ([`derivatives`]); nothing else is shared state. The filesystem tree under
//! `save_path_root` is the only source of truth, with no index or database.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | `ImagePipeline` facade and `PipelineError`; replace/remove flows |
//! | [`ingest`] | Upload persistence, master cap, aspect pre-crop, first derivatives |
//! | [`crop`] | Staged re-crop from the preserved original |
//! | [`reclaim`] | Best-effort removal of every file of a stored image |
//! | [`derivatives`] | Width-capped resizes, master first then named sizes in parallel |
//! | [`shard`] | Random `d/d/d` shard directories, created lazily |
//! | [`sizes`] | Prefix → width tables, static or computed per caller context |
//! | [`config`] | `image-shelf.toml` loading, merging over defaults, validation |
//! | [`types`] | `StoredImagePath` and the report types returned by operations |
//! | [`naming`] | Prefix/postfix file naming rules and unique ids |
//! | [`urls`] | Public URLs, with the no-image placeholder fallback |
//! | [`imaging`] | Backend trait and the pure-Rust `image` implementation |
//! | [`output`] | CLI output formatting of operation reports |
//!
//! # Design Decisions
//!
//! ## Injected Backend
//!
//! All raster work goes through the [`ImageBackend`](imaging::ImageBackend)
//! trait. The pipeline owns the backend handle it was built with; tests hand
//! in a recording mock and never decode a pixel.
//!
//! ## Originals Are Never Touched
//!
//! `{id}_original.{ext}` is a byte copy of the upload, taken before any resize
//! or crop. Every crop starts from it, so cropping twice yields the second box
//! applied to the pristine upload rather than a crop of a crop.
//!
//! ## Crops Stage, Then Rename
//!
//! A crop writes its new master and derivatives under `_staged` names and
//! renames them into place only once everything succeeded. A failed crop
//! leaves the previous image fully intact.
//!
//! ## Best-Effort Deletes
//!
//! Removing files never fails an operation. A missing file counts as removed,
//! and anything else is reported in [`Reclaimed`](types::Reclaimed) for the
//! caller to log.

pub mod config;
pub mod crop;
pub mod derivatives;
pub mod imaging;
pub mod ingest;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod reclaim;
pub mod shard;
pub mod sizes;
pub mod types;
pub mod urls;

#[cfg(test)]
pub(crate) mod test_helpers;
