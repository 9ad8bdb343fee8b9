use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Workspace-wide result alias for run-level (fatal) errors.
pub type Result<T> = color_eyre::eyre::Result<T>;

/// One language variant (`<tuv>`) of a translation unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    /// Language tag as written in the file (`xml:lang` or bare `lang`).
    pub lang: Option<String>,
    /// Clean segment length, filled only for the variant matching the target language.
    pub clean_len: Option<usize>,
}

/// Authorship metadata of one `<tu>` plus its variants.
///
/// Empty attribute values are stored as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationUnit {
    pub creation_id: Option<String>,
    pub creation_date: Option<String>,
    pub change_id: Option<String>,
    pub change_date: Option<String>,
    pub variants: Vec<Variant>,
}

impl TranslationUnit {
    /// Clean character length of the target variant, 0 when none matched.
    pub fn target_len(&self) -> usize {
        self.variants
            .iter()
            .find_map(|v| v.clean_len)
            .unwrap_or(0)
    }
}

/// Accumulated statistics for one translator identity within one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionRecord {
    /// First-seen spelling of the identity.
    pub identity: String,
    pub created_segments: u64,
    pub created_characters: u64,
    pub changed_segments: u64,
    pub changed_characters: u64,
    pub last_creation_date: Option<String>,
    pub last_change_date: Option<String>,
}

impl AttributionRecord {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            ..Self::default()
        }
    }
}

/// Per-file failure. Every variant is recoverable at file granularity.
#[derive(Debug, Error)]
pub enum TmxError {
    #[error("XML parse error at byte {position}: {message}")]
    Parse { position: u64, message: String },
    #[error("no <body> element found")]
    MissingBody,
    #[error("encoding: {0}")]
    Encoding(String),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TmxError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TmxError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for failures caused by the document itself rather than the file system.
    pub fn is_document_error(&self) -> bool {
        matches!(self, TmxError::Parse { .. } | TmxError::MissingBody)
    }
}

/// Outcome of processing one file, as reported to callers and reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum FileStatus {
    Ok,
    NoData,
    Failed(String),
}

impl FileStatus {
    pub fn is_ok(&self) -> bool {
        !matches!(self, FileStatus::Failed(_))
    }

    /// Status column text used by reports and log lines.
    pub fn label(&self) -> String {
        match self {
            FileStatus::Ok => "OK".to_string(),
            FileStatus::NoData => "NO ID".to_string(),
            FileStatus::Failed(reason) => format!("ERROR: {reason}"),
        }
    }
}

impl From<&TmxError> for FileStatus {
    fn from(e: &TmxError) -> Self {
        FileStatus::Failed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_len_uses_first_measured_variant() {
        let tu = TranslationUnit {
            variants: vec![
                Variant {
                    lang: Some("pl-PL".into()),
                    clean_len: None,
                },
                Variant {
                    lang: Some("en-GB".into()),
                    clean_len: Some(7),
                },
            ],
            ..TranslationUnit::default()
        };
        assert_eq!(tu.target_len(), 7);
        assert_eq!(TranslationUnit::default().target_len(), 0);
    }

    #[test]
    fn status_labels() {
        assert_eq!(FileStatus::Ok.label(), "OK");
        assert_eq!(FileStatus::NoData.label(), "NO ID");
        let st = FileStatus::from(&TmxError::MissingBody);
        assert_eq!(st.label(), "ERROR: no <body> element found");
        assert!(!st.is_ok());
    }
}
