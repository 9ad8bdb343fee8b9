//! High-level orchestration layer over the TMX engine.
//! Intentionally thin: exposes the directory-level runs used by the CLI.

use std::path::Path;

pub use tmxkit_core::{FileStatus, Result};

pub mod analyze;
pub mod denylist;
pub mod discover;
pub mod filter;

pub use analyze::analyze_dir;
pub use denylist::{load_list, load_report, Denylist};
pub use discover::find_tmx_files;
pub use filter::{filter_dir, FilterRun};

/// File name used in reports and log lines.
pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
