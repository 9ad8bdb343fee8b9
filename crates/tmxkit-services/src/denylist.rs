//! Denied translator identities, global or per TM file.

use crate::Result;
use color_eyre::eyre::WrapErr;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tmxkit_parsers_tmx::{normalize_identity, DenyMatch, RetentionPolicy};

/// File-name key that applies a report row to every file.
pub const ANY_FILE: &str = "*";

/// Identity cells of an analysis report that do not name a translator.
const NOT_AN_IDENTITY: [&str; 2] = ["-", "no data"];

fn file_key(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    match lower.strip_suffix(".tmx") {
        Some(stem) => stem.to_string(),
        None => lower,
    }
}

#[derive(Debug, Clone, Default)]
pub struct Denylist {
    global: HashSet<String>,
    per_file: HashMap<String, HashSet<String>>,
}

impl Denylist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny(&mut self, identity: &str) {
        let id = normalize_identity(identity.trim());
        if !id.is_empty() {
            self.global.insert(id);
        }
    }

    pub fn deny_in(&mut self, file: &str, identity: &str) {
        if file.trim() == ANY_FILE {
            self.deny(identity);
            return;
        }
        let id = normalize_identity(identity.trim());
        if !id.is_empty() {
            self.per_file.entry(file_key(file)).or_default().insert(id);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.per_file.is_empty()
    }

    /// Number of distinct (file, identity) entries, global entries counted once.
    pub fn len(&self) -> usize {
        self.global.len() + self.per_file.values().map(HashSet::len).sum::<usize>()
    }

    /// Identities denied for the TM file `file_name` (with or without `.tmx`).
    pub fn for_file(&self, file_name: &str) -> HashSet<&str> {
        let mut ids: HashSet<&str> = self.global.iter().map(String::as_str).collect();
        if let Some(local) = self.per_file.get(&file_key(file_name)) {
            ids.extend(local.iter().map(String::as_str));
        }
        ids
    }

    pub fn policy_for(&self, file_name: &str, matching: DenyMatch) -> RetentionPolicy {
        RetentionPolicy::new(self.for_file(file_name), matching)
    }

    /// Parse a newline-delimited identity list. Blank lines and `#` comments are ignored.
    pub fn parse_list(&mut self, text: &str) {
        for line in text.lines() {
            let line = line.trim().trim_start_matches('\u{feff}');
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            self.deny(line);
        }
    }

    /// Parse a `;`-delimited `file;identity` report.
    ///
    /// A header row containing `Translator ID` switches to the analysis report
    /// layout (file in the first column, identity in the third), so an edited
    /// analysis CSV can be fed back directly.
    pub fn parse_report<R: std::io::Read>(&mut self, input: R) -> Result<()> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(false)
            .flexible(true)
            .from_reader(input);
        let mut identity_col = 1usize;
        for (i, rec) in rdr.records().enumerate() {
            let rec = rec?;
            let cell = |c: usize| rec.get(c).map(|s| s.trim().trim_start_matches('\u{feff}'));
            if i == 0 {
                if let Some(col) = rec.iter().position(|h| h.trim().eq_ignore_ascii_case("translator id")) {
                    identity_col = col;
                    continue;
                }
            }
            let (Some(file), Some(identity)) = (cell(0), cell(identity_col)) else {
                continue;
            };
            if file.is_empty()
                || file.starts_with('#')
                || NOT_AN_IDENTITY.iter().any(|n| identity.eq_ignore_ascii_case(n))
            {
                continue;
            }
            self.deny_in(file, identity);
        }
        Ok(())
    }
}

pub fn load_list(path: &Path) -> Result<Denylist> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("cannot read denylist {}", path.display()))?;
    let mut list = Denylist::new();
    list.parse_list(&text);
    tracing::info!(event = "denylist_loaded", path = %path.display(), identities = list.len());
    Ok(list)
}

pub fn load_report(path: &Path) -> Result<Denylist> {
    let file = std::fs::File::open(path)
        .wrap_err_with(|| format!("cannot open deny report {}", path.display()))?;
    let mut list = Denylist::new();
    list.parse_report(file)
        .wrap_err_with(|| format!("invalid deny report {}", path.display()))?;
    tracing::info!(event = "deny_report_loaded", path = %path.display(), entries = list.len());
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(set: HashSet<&str>) -> Vec<&str> {
        let mut v: Vec<&str> = set.into_iter().collect();
        v.sort();
        v
    }

    #[test]
    fn list_ignores_blanks_comments_and_case() {
        let mut d = Denylist::new();
        d.parse_list("\u{feff}Anna\n\n# reviewers\n  BOB  \r\nanna\n");
        assert_eq!(d.len(), 2);
        assert_eq!(sorted(d.for_file("whatever.tmx")), vec!["anna", "bob"]);
    }

    #[test]
    fn report_rows_apply_to_matching_files() {
        let mut d = Denylist::new();
        d.parse_report("Client_A.tmx;Anna\nclient_a;Carl\nclient_b.tmx;Bob\n*;Eve\n".as_bytes())
            .unwrap();
        assert_eq!(sorted(d.for_file("CLIENT_A.TMX")), vec!["anna", "carl", "eve"]);
        assert_eq!(sorted(d.for_file("client_b")), vec!["bob", "eve"]);
        assert_eq!(sorted(d.for_file("other.tmx")), vec!["eve"]);
    }

    #[test]
    fn analysis_report_layout_is_recognised() {
        let report = "\u{feff}File;Total segments;Translator ID;Last segment date\n\
                      a.tmx;3;Anna;2024.01.01\n\
                      b.tmx;0;NO DATA;-\n\
                      c.tmx;-;-;-\n";
        let mut d = Denylist::new();
        d.parse_report(report.as_bytes()).unwrap();
        assert_eq!(d.len(), 1);
        assert!(d.policy_for("a.tmx", DenyMatch::CreationOnly).denies("ANNA"));
        assert!(d.policy_for("b.tmx", DenyMatch::CreationOnly).is_empty());
    }
}
