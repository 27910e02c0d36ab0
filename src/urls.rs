//! Public URLs for stored images.

use crate::config::PipelineConfig;
use crate::naming::add_prefix_to_file;
use crate::sizes::SizeTable;
use crate::types::StoredImagePath;

/// URL of `stored` at `size` under `config.public_url`.
///
/// Without a stored image the placeholder `no_image_base_name` is used,
/// prefixed when `size` is one of the configured sizes:
///
/// | stored | size | URL |
/// |--------|------|-----|
/// | `1/2/3/a.jpg` | `small_` | `/images/1/2/3/small_a.jpg` |
/// | `1/2/3/a.jpg` | none | `/images/1/2/3/a.jpg` |
/// | none | `small_` (configured) | `/images/small_noimage.png` |
/// | none | `huge_` (unknown) | `/images/noimage.png` |
pub fn image_src(
    config: &PipelineConfig,
    sizes: &SizeTable,
    stored: Option<&StoredImagePath>,
    size: Option<&str>,
) -> String {
    let base = config.public_url.trim_end_matches('/');
    let relative = match (stored, size) {
        (Some(stored), Some(size)) => stored.with_prefix(size),
        (Some(stored), None) => stored.as_str().to_string(),
        (None, Some(size)) if sizes.contains(size) => {
            add_prefix_to_file(&config.no_image_base_name, size)
        }
        (None, _) => config.no_image_base_name.clone(),
    };
    format!("{base}/{relative}")
}
