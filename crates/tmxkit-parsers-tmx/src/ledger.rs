use std::collections::HashMap;

use tmxkit_core::AttributionRecord;

/// Lower-cased lookup key for a translator identity.
pub fn normalize_identity(identity: &str) -> String {
    identity.to_lowercase()
}

/// Per-file map from translator identity to accumulated statistics.
///
/// Lookups are case-insensitive; records keep the first-seen spelling and
/// iterate in first-seen order.
#[derive(Debug, Default)]
pub struct Ledger {
    records: Vec<AttributionRecord>,
    index: HashMap<String, usize>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get-or-create the record for `identity`.
    pub fn entry(&mut self, identity: &str) -> &mut AttributionRecord {
        let key = normalize_identity(identity);
        let idx = match self.index.get(&key) {
            Some(&i) => i,
            None => {
                self.records.push(AttributionRecord::new(identity));
                let i = self.records.len() - 1;
                self.index.insert(key, i);
                i
            }
        };
        &mut self.records[idx]
    }

    pub fn get(&self, identity: &str) -> Option<&AttributionRecord> {
        self.index
            .get(&normalize_identity(identity))
            .map(|&i| &self.records[i])
    }

    pub fn records(&self) -> &[AttributionRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<AttributionRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_is_case_insensitive_and_keeps_first_spelling() {
        let mut ledger = Ledger::new();
        ledger.entry("Anna").created_segments += 1;
        ledger.entry("ANNA").created_segments += 1;
        ledger.entry("bob");
        assert_eq!(ledger.len(), 2);
        let anna = ledger.get("anna").unwrap();
        assert_eq!(anna.identity, "Anna");
        assert_eq!(anna.created_segments, 2);
        let order: Vec<_> = ledger.records().iter().map(|r| r.identity.as_str()).collect();
        assert_eq!(order, ["Anna", "bob"]);
    }
}
