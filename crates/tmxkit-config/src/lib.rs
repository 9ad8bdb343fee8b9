use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const CONFIG_FILE: &str = "tmxkit.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TmxkitConfig {
    pub analyze: Option<AnalyzeCfg>,
    pub filter: Option<FilterCfg>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzeCfg {
    pub out_csv: Option<String>,
    pub format: Option<String>,
    pub recursive: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterCfg {
    pub denylist: Option<String>,
    pub deny_report: Option<String>,
    pub out_dir: Option<String>,
    pub suffix: Option<String>,
    pub match_change_id: Option<bool>,
    pub strategy: Option<String>,
    pub output_encoding: Option<String>,
    pub xml_declaration: Option<String>,
    pub doctype: Option<String>,
    pub log_file: Option<String>,
    pub recursive: Option<bool>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Search locations, highest priority first.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(p) = std::env::current_dir() {
        paths.push(p.join(CONFIG_FILE));
    }
    if let Some(base) = dirs::config_dir() {
        paths.push(base.join("tmxkit").join(CONFIG_FILE));
    }
    paths
}

pub fn load_config() -> Result<TmxkitConfig, ConfigError> {
    load_from(&config_paths())
}

/// Merge every readable file of `paths`; earlier files win field by field.
/// Missing files are skipped, malformed ones are an error.
pub fn load_from(paths: &[PathBuf]) -> Result<TmxkitConfig, ConfigError> {
    let mut merged = TmxkitConfig::default();
    for path in paths {
        if let Some(cfg) = read_file(path)? {
            merged = merge(merged, cfg);
        }
    }
    Ok(merged)
}

fn read_file(path: &Path) -> Result<Option<TmxkitConfig>, ConfigError> {
    let Ok(s) = std::fs::read_to_string(path) else {
        return Ok(None);
    };
    toml::from_str::<TmxkitConfig>(&s)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

fn merge(mut a: TmxkitConfig, b: TmxkitConfig) -> TmxkitConfig {
    a.analyze = merge_opt(a.analyze, b.analyze, merge_analyze);
    a.filter = merge_opt(a.filter, b.filter, merge_filter);
    a
}

fn merge_opt<T>(a: Option<T>, b: Option<T>, f: fn(T, T) -> T) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(f(a, b)),
        (None, Some(b)) => Some(b),
        (Some(a), None) => Some(a),
        (None, None) => None,
    }
}

fn merge_analyze(mut a: AnalyzeCfg, b: AnalyzeCfg) -> AnalyzeCfg {
    a.out_csv = a.out_csv.or(b.out_csv);
    a.format = a.format.or(b.format);
    a.recursive = a.recursive.or(b.recursive);
    a
}

fn merge_filter(mut a: FilterCfg, b: FilterCfg) -> FilterCfg {
    a.denylist = a.denylist.or(b.denylist);
    a.deny_report = a.deny_report.or(b.deny_report);
    a.out_dir = a.out_dir.or(b.out_dir);
    a.suffix = a.suffix.or(b.suffix);
    a.match_change_id = a.match_change_id.or(b.match_change_id);
    a.strategy = a.strategy.or(b.strategy);
    a.output_encoding = a.output_encoding.or(b.output_encoding);
    a.xml_declaration = a.xml_declaration.or(b.xml_declaration);
    a.doctype = a.doctype.or(b.doctype);
    a.log_file = a.log_file.or(b.log_file);
    a.recursive = a.recursive.or(b.recursive);
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let p = dir.join(name);
        std::fs::write(&p, body).unwrap();
        p
    }

    #[test]
    fn first_file_wins_per_field() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        let local = write(dir, "local.toml", "[filter]\nout_dir = \"out\"\n");
        let user = write(
            dir,
            "user.toml",
            "[filter]\nout_dir = \"elsewhere\"\nstrategy = \"auto\"\n[analyze]\nformat = \"json\"\n",
        );
        let cfg = load_from(&[local, dir.join("missing.toml"), user]).unwrap();
        let filter = cfg.filter.unwrap();
        assert_eq!(filter.out_dir.as_deref(), Some("out"));
        assert_eq!(filter.strategy.as_deref(), Some("auto"));
        assert_eq!(cfg.analyze.unwrap().format.as_deref(), Some("json"));
    }

    #[test]
    fn malformed_file_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let bad = write(tmp.path(), "bad.toml", "[filter\n");
        let err = load_from(&[bad]).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
