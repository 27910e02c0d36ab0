//! File naming conventions shared by every pipeline stage.
//!
//! All files belonging to one image live in the same shard directory and are
//! derived from the master file name:
//!
//! ```text
//! 3/7/1/01hq3k9x2m.jpg            master (the stored identifier)
//! 3/7/1/small_01hq3k9x2m.jpg      derivative, prefix "small_"
//! 3/7/1/01hq3k9x2m_original.jpg   untouched upload, postfix "_original"
//! ```
//!
//! These names are part of the on-disk format and must not change.

use ulid::Ulid;

/// Postfix marking the preserved upload.
pub const ORIGINAL_POSTFIX: &str = "_original";

/// Postfix for files written by a crop before they are renamed into place.
pub const STAGED_POSTFIX: &str = "_staged";

/// Prepend `prefix` to the final segment of a `/`- or `\`-separated path.
///
/// - `("3/7/1/abc.jpg", "small_")` → `"3/7/1/small_abc.jpg"`
/// - `("abc.jpg", "small_")` → `"small_abc.jpg"`
/// - `("3/7/1/abc.jpg", "")` → `"3/7/1/abc.jpg"` (untouched)
///
/// The result always uses `/` separators.
pub fn add_prefix_to_file(path: &str, prefix: &str) -> String {
    if prefix.is_empty() {
        return path.to_string();
    }
    let path = path.replace('\\', "/");
    match path.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/{prefix}{file}"),
        None => format!("{prefix}{path}"),
    }
}

/// Insert `postfix` before the final extension of the file name.
///
/// - `("3/7/1/abc.jpg", "_original")` → `"3/7/1/abc_original.jpg"`
/// - `("a.b/abc.tar.gz", "_x")` → `"a.b/abc.tar_x.gz"` (directory dots ignored)
/// - `("3/7/1/abc", "_original")` → `"3/7/1/abc_original"`
pub fn add_postfix_to_file(path: &str, postfix: &str) -> String {
    if postfix.is_empty() {
        return path.to_string();
    }
    let path = path.replace('\\', "/");
    let (dir, file) = match path.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, path.as_str()),
    };
    let file = match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}{postfix}.{ext}"),
        _ => format!("{file}{postfix}"),
    };
    match dir {
        Some(dir) => format!("{dir}/{file}"),
        None => file,
    }
}

/// Path of the preserved upload for a master path.
pub fn original_of(path: &str) -> String {
    add_postfix_to_file(path, ORIGINAL_POSTFIX)
}

/// Collision-resistant base name for a new upload.
///
/// A lowercase ULID: millisecond timestamp followed by 80 random bits, so
/// names also sort by upload time.
pub fn unique_id() -> String {
    Ulid::new().to_string().to_lowercase()
}

/// Whether an upload extension is safe to use as a file name suffix.
pub fn is_plain_extension(ext: &str) -> bool {
    !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Whether a size prefix can be glued onto a file name without escaping the
/// shard directory.
pub fn is_valid_prefix(prefix: &str) -> bool {
    !prefix.contains(['/', '\\']) && !prefix.contains("..")
}
