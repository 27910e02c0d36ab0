//! CLI output formatting for pipeline results.
//!
//! # Output Format
//!
//! Every report leads with the stored identifier, followed by indented
//! context lines: the master's pixel size, then one line per derivative.
//!
//! ## Ingest
//!
//! ```text
//! Stored 3/7/1/01hq3k9x2m.jpg (1500x750)
//!     Original: 3/7/1/01hq3k9x2m_original.jpg
//!     small_  300x150  3/7/1/small_01hq3k9x2m.jpg
//! ```
//!
//! ## Crop
//!
//! ```text
//! Cropped 3/7/1/01hq3k9x2m.jpg (300x400)
//!     small_  300x400  3/7/1/small_01hq3k9x2m.jpg
//! ```
//!
//! ## Reclaim
//!
//! ```text
//! Reclaimed 3/7/1/01hq3k9x2m.jpg: 3 files removed
//!     Failed: images/3/7/1/small_01hq3k9x2m.jpg (Permission denied)
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure.

use crate::types::{Cropped, DerivativeFile, Ingested, Reclaimed, StoredImagePath};

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// One derivative line, prefix column padded to `width`.
///
/// ```text
///     small_  300x150  3/7/1/small_abc.jpg
///     (master)  1500x750  3/7/1/abc.jpg
/// ```
fn derivative_line(file: &DerivativeFile, width: usize) -> String {
    let label = if file.prefix.is_empty() {
        "(master)"
    } else {
        file.prefix.as_str()
    };
    format!(
        "{}{:<width$}  {}x{}  {}",
        indent(1),
        label,
        file.width,
        file.height,
        file.path
    )
}

fn derivative_lines(files: &[DerivativeFile]) -> Vec<String> {
    let width = files
        .iter()
        .map(|f| if f.prefix.is_empty() { 8 } else { f.prefix.len() })
        .max()
        .unwrap_or(0);
    files.iter().map(|f| derivative_line(f, width)).collect()
}

// ============================================================================
// Ingest / crop
// ============================================================================

pub fn format_ingested(report: &Ingested) -> Vec<String> {
    let mut lines = vec![format!(
        "Stored {} ({}x{})",
        report.stored, report.master.width, report.master.height
    )];
    match &report.original {
        Some(original) => lines.push(format!("{}Original: {}", indent(1), original)),
        None => lines.push(format!("{}Original: not preserved", indent(1))),
    }
    lines.extend(derivative_lines(&report.derivatives));
    lines
}

pub fn print_ingested(report: &Ingested) {
    for line in format_ingested(report) {
        println!("{}", line);
    }
}

pub fn format_cropped(report: &Cropped) -> Vec<String> {
    let mut lines = vec![format!(
        "Cropped {} ({}x{})",
        report.stored, report.master.width, report.master.height
    )];
    lines.extend(derivative_lines(&report.derivatives));
    lines
}

pub fn print_cropped(report: &Cropped) {
    for line in format_cropped(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Reclaim
// ============================================================================

pub fn format_reclaimed(stored: &StoredImagePath, report: &Reclaimed) -> Vec<String> {
    let count = report.removed.len();
    let noun = if count == 1 { "file" } else { "files" };
    let mut lines = vec![format!("Reclaimed {stored}: {count} {noun} removed")];
    for failure in &report.failures {
        lines.push(format!(
            "{}Failed: {} ({})",
            indent(1),
            failure.path.display(),
            failure.message
        ));
    }
    lines
}

pub fn print_reclaimed(stored: &StoredImagePath, report: &Reclaimed) {
    for line in format_reclaimed(stored, report) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::Dimensions;
    use crate::types::CleanupFailure;
    use std::path::PathBuf;

    fn stored() -> StoredImagePath {
        StoredImagePath::parse("3/7/1/abc.jpg").unwrap()
    }

    fn file(prefix: &str, w: u32, h: u32) -> DerivativeFile {
        DerivativeFile {
            prefix: prefix.into(),
            path: stored().with_prefix(prefix),
            width: w,
            height: h,
        }
    }

    #[test]
    fn indent_depth() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn ingested_lists_original_and_derivatives() {
        let report = Ingested {
            stored: stored(),
            original: Some(stored().original()),
            master: Dimensions::from((1500, 750)),
            derivatives: vec![file("small_", 300, 150), file("big_", 900, 450)],
        };

        assert_eq!(
            format_ingested(&report),
            vec![
                "Stored 3/7/1/abc.jpg (1500x750)",
                "    Original: 3/7/1/abc_original.jpg",
                "    small_  300x150  3/7/1/small_abc.jpg",
                "    big_    900x450  3/7/1/big_abc.jpg",
            ]
        );
    }

    #[test]
    fn ingested_without_original() {
        let report = Ingested {
            stored: stored(),
            original: None,
            master: Dimensions::from((10, 10)),
            derivatives: vec![],
        };
        let lines = format_ingested(&report);
        assert_eq!(lines[1], "    Original: not preserved");
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn master_entry_is_labelled() {
        let lines = derivative_lines(&[file("", 1200, 600), file("s_", 100, 50)]);
        assert_eq!(lines[0], "    (master)  1200x600  3/7/1/abc.jpg");
        assert_eq!(lines[1], "    s_        100x50  3/7/1/s_abc.jpg");
    }

    #[test]
    fn cropped_header() {
        let report = Cropped {
            stored: stored(),
            master: Dimensions::from((300, 400)),
            derivatives: vec![file("small_", 300, 400)],
        };
        let lines = format_cropped(&report);
        assert_eq!(lines[0], "Cropped 3/7/1/abc.jpg (300x400)");
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn reclaimed_counts_and_failures() {
        let report = Reclaimed {
            removed: vec![PathBuf::from("a"), PathBuf::from("b")],
            failures: vec![CleanupFailure {
                path: PathBuf::from("images/3/7/1/small_abc.jpg"),
                message: "Permission denied".into(),
            }],
        };
        assert_eq!(
            format_reclaimed(&stored(), &report),
            vec![
                "Reclaimed 3/7/1/abc.jpg: 2 files removed",
                "    Failed: images/3/7/1/small_abc.jpg (Permission denied)",
            ]
        );
    }

    #[test]
    fn reclaimed_singular() {
        let report = Reclaimed {
            removed: vec![PathBuf::from("a")],
            failures: vec![],
        };
        assert_eq!(
            format_reclaimed(&stored(), &report),
            vec!["Reclaimed 3/7/1/abc.jpg: 1 file removed"]
        );
    }
}
