use crate::Result;
use color_eyre::eyre::WrapErr;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const TMX_EXT: &str = "tmx";

fn is_tmx(p: &Path) -> bool {
    p.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(TMX_EXT))
}

/// `.tmx` files under `root`, sorted by path. Directories listed in `skip`
/// (e.g. the output directory of a previous run) are not entered.
///
/// An unreadable `root` is an error; unreadable entries below it are logged
/// and skipped.
pub fn find_tmx_files(root: &Path, recursive: bool, skip: &[PathBuf]) -> Result<Vec<PathBuf>> {
    std::fs::read_dir(root).wrap_err_with(|| format!("cannot read input directory {}", root.display()))?;

    let skip: Vec<PathBuf> = skip.iter().filter_map(|p| p.canonicalize().ok()).collect();
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(if recursive { usize::MAX } else { 1 })
        .into_iter()
        .filter_entry(|e| {
            !(e.file_type().is_dir() && e.path().canonicalize().is_ok_and(|c| skip.contains(&c)))
        });
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                tracing::warn!(event = "discover_skip", error = %err);
                continue;
            }
        };
        if entry.file_type().is_file() && is_tmx(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    tracing::debug!(event = "discovered", root = %root.display(), count = files.len());
    Ok(files)
}
