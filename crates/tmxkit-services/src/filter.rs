use crate::denylist::Denylist;
use crate::discover::find_tmx_files;
use crate::{file_name, Result};
use color_eyre::eyre::WrapErr;
use std::io::Write;
use std::path::{Path, PathBuf};
use tmxkit_core::FileStatus;
use tmxkit_domain::{FilterFileStat, FilterSummary, SCHEMA_VERSION};
use tmxkit_parsers_tmx::{filter_file, DenyMatch, FilterOptions, FilterOutcome};

pub const DEFAULT_SUFFIX: &str = "_Updated";
pub const DEFAULT_OUT_DIR: &str = "output";
pub const DEFAULT_LOG_FILE: &str = "cleanup.log";

/// Settings shared by every file of one filtering run.
#[derive(Debug, Clone)]
pub struct FilterRun {
    pub out_dir: PathBuf,
    pub suffix: String,
    pub matching: DenyMatch,
    pub recursive: bool,
    /// Rewrite options; the retention policy is replaced per file.
    pub options: FilterOptions,
}

impl FilterRun {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            suffix: DEFAULT_SUFFIX.to_string(),
            matching: DenyMatch::default(),
            recursive: false,
            options: FilterOptions::default(),
        }
    }

    /// `<out_dir>/<relative dir>/<stem><suffix>.tmx` for an input below `root`.
    pub fn output_path(&self, root: &Path, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let rel_dir = input
            .parent()
            .and_then(|p| p.strip_prefix(root).ok())
            .unwrap_or_else(|| Path::new(""));
        self.out_dir
            .join(rel_dir)
            .join(format!("{stem}{}.tmx", self.suffix))
    }
}

/// One cleanup log line for a finished file.
pub fn log_line(name: &str, outcome: &std::result::Result<FilterOutcome, FileStatus>) -> String {
    match outcome {
        Ok(o) if o.stats.removed_units > 0 => format!(
            "SUCCESS: {name} -> Removed {} segments (Total checked: {}).",
            o.stats.removed_units, o.stats.total_units
        ),
        Ok(o) => format!(
            "OK (NO CHANGES): {name} -> No denied IDs found (Total checked: {}).",
            o.stats.total_units
        ),
        Err(status) => format!("{} ({name})", status.label()),
    }
}

fn remove_partial(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(event = "partial_output_left", path = %path.display(), error = %e);
        }
    }
}

/// Filter every `.tmx` file under `root` into `run.out_dir`, appending one
/// timestamped line per file to `log`. Per-file failures are logged and
/// counted; only output-directory and log write failures abort the run.
pub fn filter_dir<L: Write>(
    root: &Path,
    denylist: &Denylist,
    run: &FilterRun,
    log: &mut L,
) -> Result<FilterSummary> {
    std::fs::create_dir_all(&run.out_dir)
        .wrap_err_with(|| format!("cannot create output directory {}", run.out_dir.display()))?;
    let files = find_tmx_files(root, run.recursive, std::slice::from_ref(&run.out_dir))?;
    if denylist.is_empty() {
        tracing::warn!(event = "denylist_empty", "no identities to remove; files are re-encoded only");
    }

    let mut summary = FilterSummary {
        files: Vec::with_capacity(files.len()),
        removed: 0,
        failed: 0,
    };

    for path in &files {
        let name = file_name(path);
        let out = run.output_path(root, path);
        let opts = FilterOptions {
            policy: denylist.policy_for(&name, run.matching),
            ..run.options.clone()
        };

        let result = match out.parent().map(std::fs::create_dir_all).transpose() {
            Err(e) => Err(FileStatus::Failed(format!("cannot create {}: {e}", out.display()))),
            Ok(_) => filter_file(path, &out, &opts).map_err(|e| {
                remove_partial(&out);
                FileStatus::from(&e)
            }),
        };

        let line = log_line(&name, &result);
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(log, "[{stamp}] {line}").wrap_err("cannot write cleanup log")?;

        let stat = match &result {
            Ok(o) => {
                tracing::info!(
                    event = "file_filtered",
                    file = %name,
                    removed = o.stats.removed_units,
                    total = o.stats.total_units,
                    strategy = %o.strategy,
                    input_encoding = o.input_encoding,
                    output_encoding = o.output_encoding,
                );
                summary.removed += o.stats.removed_units;
                FilterFileStat {
                    schema_version: SCHEMA_VERSION,
                    file: name,
                    output: Some(out.display().to_string()),
                    total_units: o.stats.total_units,
                    removed_units: o.stats.removed_units,
                    strategy: o.strategy.to_string(),
                    status: FileStatus::Ok.label(),
                }
            }
            Err(status) => {
                tracing::warn!(event = "file_failed", file = %name, status = %status.label());
                summary.failed += 1;
                FilterFileStat {
                    schema_version: SCHEMA_VERSION,
                    file: name,
                    output: None,
                    total_units: 0,
                    removed_units: 0,
                    strategy: opts.strategy.to_string(),
                    status: status.label(),
                }
            }
        };
        summary.files.push(stat);
    }
    log.flush().wrap_err("cannot write cleanup log")?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tmxkit_parsers_tmx::{OutputEncoding, RewriteStrategy};

    const GOOD: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<tmx version=\"1.4\"><header/><body>\n<tu creationid=\"anna\"><tuv xml:lang=\"en\"><seg>a</seg></tuv></tu>\n<tu creationid=\"bob\"><tuv xml:lang=\"en\"><seg>b</seg></tuv></tu>\n<tu creationid=\"ANNA\"><tuv xml:lang=\"en\"><seg>c</seg></tuv></tu>\n</body></tmx>\n";

    fn run(out_dir: &Path) -> FilterRun {
        let mut run = FilterRun::new(out_dir);
        run.options.output_encoding = OutputEncoding::Utf8;
        run.options.strategy = RewriteStrategy::Structural;
        run
    }

    #[test]
    fn output_path_mirrors_subdirectories() {
        let r = FilterRun::new("/out");
        assert_eq!(
            r.output_path(Path::new("/in"), Path::new("/in/a/b/Memo.tmx")),
            PathBuf::from("/out/a/b/Memo_Updated.tmx")
        );
        assert_eq!(
            r.output_path(Path::new("/in"), Path::new("/in/x.tmx")),
            PathBuf::from("/out/x_Updated.tmx")
        );
    }

    #[test]
    fn filters_directory_and_logs_each_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("one.tmx"), GOOD).unwrap();
        fs::write(root.join("two.tmx"), GOOD.replace("anna", "carl").replace("ANNA", "carl")).unwrap();
        fs::write(root.join("broken.tmx"), "<tmx><header/></tmx>").unwrap();
        let out_dir = root.join("output");

        let mut deny = Denylist::new();
        deny.deny("Anna");
        let mut log = Vec::new();
        let summary = filter_dir(root, &deny, &run(&out_dir), &mut log).unwrap();

        assert_eq!(summary.files.len(), 3);
        assert_eq!(summary.removed, 2);
        assert_eq!(summary.failed, 1);

        let log = String::from_utf8(log).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] ERROR: no <body> element found (broken.tmx)"));
        assert!(lines[1].ends_with("] SUCCESS: one.tmx -> Removed 2 segments (Total checked: 3)."));
        assert!(lines[2].contains("] OK (NO CHANGES): two.tmx"));

        let one = fs::read_to_string(out_dir.join("one_Updated.tmx")).unwrap();
        assert!(one.contains("creationid=\"bob\""));
        assert!(!one.to_lowercase().contains("anna"));
        assert!(!out_dir.join("broken_Updated.tmx").exists());

        // A second run over the same root does not pick up its own output.
        let mut log = Vec::new();
        let again = filter_dir(root, &deny, &run(&out_dir), &mut log).unwrap();
        assert_eq!(again.files.len(), 3);
    }

    #[test]
    fn retained_plus_removed_equals_total() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("m.tmx"), GOOD).unwrap();
        let mut deny = Denylist::new();
        deny.deny_in("M", "bob");
        let out_dir = dir.path().join("out");
        let summary = filter_dir(dir.path(), &deny, &run(&out_dir), &mut Vec::new()).unwrap();
        let stat = &summary.files[0];
        assert_eq!(stat.removed_units, 1);
        assert_eq!(stat.total_units, 3);

        let written = fs::read_to_string(out_dir.join("m_Updated.tmx")).unwrap();
        assert_eq!(written.matches("<tu ").count() as u64, stat.total_units - stat.removed_units);
    }
}
