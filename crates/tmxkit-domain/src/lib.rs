use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

/// Placeholder written into report cells that have no value.
pub const PLACEHOLDER: &str = "-";

/// One analysis report row: a (file, translator identity) pair.
///
/// Numeric cells are `None` on error rows, which are rendered as `-`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisRow {
    pub schema_version: u32,
    pub file: String,
    pub total_units: Option<u64>,
    pub identity: String,
    pub last_creation: String,
    pub last_change: String,
    pub created_segments: Option<u64>,
    pub changed_segments: Option<u64>,
    pub created_characters: Option<u64>,
    pub changed_characters: Option<u64>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisSummary {
    pub files: usize,
    pub failed: usize,
    pub rows: Vec<AnalysisRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FilterFileStat {
    pub schema_version: u32,
    pub file: String,
    pub output: Option<String>,
    pub total_units: u64,
    pub removed_units: u64,
    pub strategy: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FilterSummary {
    pub files: Vec<FilterFileStat>,
    pub removed: u64,
    pub failed: usize,
}
