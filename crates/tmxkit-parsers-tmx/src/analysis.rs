use std::io::BufRead;
use std::path::Path;

use tmxkit_core::{AttributionRecord, TmxError, TranslationUnit};

use crate::classify::{classify, Classification};
use crate::encoding::{open_decoded, reject_malformed};
use crate::ledger::Ledger;
use crate::reader::TmxReader;

/// Result of analysing one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileAnalysis {
    pub total_units: u64,
    pub target_lang: Option<String>,
    /// In first-seen order of identities.
    pub records: Vec<AttributionRecord>,
    pub encoding: Option<&'static str>,
}

/// Per-file analysis state. Created for one file and dropped with it.
#[derive(Debug, Default)]
pub struct AnalysisSession {
    ledger: Ledger,
    total_units: u64,
}

impl AnalysisSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, unit: &TranslationUnit) -> Classification {
        self.total_units += 1;
        classify(unit, &mut self.ledger)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn finish(self, target_lang: Option<String>) -> FileAnalysis {
        FileAnalysis {
            total_units: self.total_units,
            target_lang,
            records: self.ledger.into_records(),
            encoding: None,
        }
    }
}

/// Analyse an already decoded (UTF-8) TMX stream.
pub fn analyze_reader<R: BufRead>(input: R, origin: &Path) -> Result<FileAnalysis, TmxError> {
    let mut reader = TmxReader::new(input, origin);
    let mut session = AnalysisSession::new();
    while let Some(unit) = reader.next_unit()? {
        session.observe(&unit);
    }
    if reader.target_lang().is_none() {
        tracing::warn!(event = "target_lang_missing", path = %origin.display());
    }
    let target = reader.target_lang().map(str::to_string);
    Ok(session.finish(target))
}

/// Detect the encoding of `path` and analyse it in one streaming pass.
pub fn analyze_file(path: &Path) -> Result<FileAnalysis, TmxError> {
    let (detection, mut input) = open_decoded(path)?;
    let mut analysis = analyze_reader(&mut input, path)?;
    reject_malformed(&input, &detection, path)?;
    analysis.encoding = Some(detection.name());
    Ok(analysis)
}
