use std::collections::HashSet;

use tmxkit_core::TranslationUnit;

use crate::dates::{day, keep_latest};
use crate::ledger::{normalize_identity, Ledger};

/// Events credited for one unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Classification {
    pub created: bool,
    pub changed: bool,
}

fn same_identity(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => normalize_identity(a) == normalize_identity(b),
        (None, None) => true,
        _ => false,
    }
}

/// A unit whose change stamp repeats its creation stamp (same identity, same
/// day) carries no real change.
pub fn is_creation_only(unit: &TranslationUnit) -> bool {
    day(unit.creation_date.as_deref()) == day(unit.change_date.as_deref())
        && same_identity(unit.creation_id.as_deref(), unit.change_id.as_deref())
}

/// Credit the creation and change events of `unit` into `ledger`.
pub fn classify(unit: &TranslationUnit, ledger: &mut Ledger) -> Classification {
    let chars = unit.target_len() as u64;
    let mut out = Classification::default();

    if let Some(id) = unit.creation_id.as_deref() {
        let rec = ledger.entry(id);
        rec.created_segments += 1;
        rec.created_characters += chars;
        keep_latest(&mut rec.last_creation_date, unit.creation_date.as_deref());
        out.created = true;
    }

    if let Some(id) = unit.change_id.as_deref() {
        if !is_creation_only(unit) {
            let rec = ledger.entry(id);
            rec.changed_segments += 1;
            rec.changed_characters += chars;
            keep_latest(&mut rec.last_change_date, unit.change_date.as_deref());
            out.changed = true;
        }
    }

    out
}

/// Which unit attributes are checked against the denylist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DenyMatch {
    #[default]
    CreationOnly,
    CreationAndChange,
}

impl std::str::FromStr for DenyMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "creation" | "creation-only" => Ok(DenyMatch::CreationOnly),
            "creation-and-change" | "both" => Ok(DenyMatch::CreationAndChange),
            other => Err(format!("unknown deny match mode: {other}")),
        }
    }
}

/// Retention decision for filtering.
#[derive(Debug, Clone, Default)]
pub struct RetentionPolicy {
    denied: HashSet<String>,
    matching: DenyMatch,
}

impl RetentionPolicy {
    pub fn new<I, S>(identities: I, matching: DenyMatch) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let denied = identities
            .into_iter()
            .map(|s| normalize_identity(s.as_ref().trim()))
            .filter(|s| !s.is_empty())
            .collect();
        Self { denied, matching }
    }

    pub fn keep_all() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.denied.is_empty()
    }

    pub fn matching(&self) -> DenyMatch {
        self.matching
    }

    pub fn denies(&self, identity: &str) -> bool {
        self.denied.contains(&normalize_identity(identity))
    }

    /// `true` when a unit with these attributes must be removed.
    pub fn drops(&self, creation_id: Option<&str>, change_id: Option<&str>) -> bool {
        if self.denied.is_empty() {
            return false;
        }
        if creation_id.is_some_and(|id| self.denies(id)) {
            return true;
        }
        self.matching == DenyMatch::CreationAndChange && change_id.is_some_and(|id| self.denies(id))
    }

    pub fn drops_unit(&self, unit: &TranslationUnit) -> bool {
        self.drops(unit.creation_id.as_deref(), unit.change_id.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tmxkit_core::Variant;

    fn unit(cid: &str, cdate: &str, mid: &str, mdate: &str, len: usize) -> TranslationUnit {
        let opt = |s: &str| (!s.is_empty()).then(|| s.to_string());
        TranslationUnit {
            creation_id: opt(cid),
            creation_date: opt(cdate),
            change_id: opt(mid),
            change_date: opt(mdate),
            variants: vec![Variant {
                lang: Some("en".into()),
                clean_len: Some(len),
            }],
        }
    }

    #[test]
    fn same_day_same_id_is_not_a_change() {
        let mut ledger = Ledger::new();
        let u = unit("anna", "20240101T100000Z", "anna", "20240101T120000Z", 3);
        let c = classify(&u, &mut ledger);
        assert!(c.created && !c.changed);
        let anna = ledger.get("anna").unwrap();
        assert_eq!(anna.created_segments, 1);
        assert_eq!(anna.changed_segments, 0);
        assert_eq!(anna.last_change_date, None);
    }

    #[test]
    fn exclusion_ignores_identity_case() {
        let u = unit("Anna", "20240101T100000Z", "ANNA", "20240101T180000Z", 3);
        assert!(is_creation_only(&u));
    }

    #[test]
    fn different_editor_is_credited_with_change() {
        let mut ledger = Ledger::new();
        let u = unit("anna", "20240101T100000Z", "bob", "20240301T100000Z", 4);
        classify(&u, &mut ledger);
        let anna = ledger.get("anna").unwrap();
        let bob = ledger.get("bob").unwrap();
        assert_eq!((anna.created_segments, anna.created_characters), (1, 4));
        assert_eq!((bob.changed_segments, bob.changed_characters), (1, 4));
        assert_eq!(bob.last_change_date.as_deref(), Some("20240301T100000Z"));
        assert_eq!(bob.created_segments, 0);
    }

    #[test]
    fn same_id_next_day_counts_as_change() {
        let mut ledger = Ledger::new();
        let u = unit("anna", "20240101T100000Z", "anna", "20240102T090000Z", 2);
        classify(&u, &mut ledger);
        let anna = ledger.get("anna").unwrap();
        assert_eq!(anna.changed_segments, 1);
        assert_eq!(anna.changed_characters, 2);
    }

    #[test]
    fn missing_ids_credit_nothing() {
        let mut ledger = Ledger::new();
        let c = classify(&unit("", "", "", "", 9), &mut ledger);
        assert_eq!(c, Classification::default());
        assert!(ledger.is_empty());
    }

    #[test]
    fn policy_matches_creation_id_case_insensitively() {
        let policy = RetentionPolicy::new(["  Anna "], DenyMatch::CreationOnly);
        assert!(policy.drops(Some("ANNA"), None));
        assert!(!policy.drops(Some("bob"), Some("anna")));
        assert!(!policy.drops(None, None));
    }

    #[test]
    fn policy_can_match_change_id() {
        let policy = RetentionPolicy::new(["anna"], DenyMatch::CreationAndChange);
        assert!(policy.drops(Some("bob"), Some("Anna")));
        assert!(!RetentionPolicy::keep_all().drops(Some("anna"), None));
    }
}
