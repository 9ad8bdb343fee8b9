use crate::discover::find_tmx_files;
use crate::{file_name, Result};
use std::path::Path;
use tmxkit_core::{FileStatus, TmxError};
use tmxkit_domain::{AnalysisRow, AnalysisSummary, PLACEHOLDER, SCHEMA_VERSION};
use tmxkit_parsers_tmx::dates::format_date;
use tmxkit_parsers_tmx::{analyze_file, FileAnalysis};

/// Identity cell of the row emitted for a file without any translator ids.
pub const NO_DATA: &str = "NO DATA";

fn error_row(file: &str, status: &FileStatus) -> AnalysisRow {
    AnalysisRow {
        schema_version: SCHEMA_VERSION,
        file: file.to_string(),
        total_units: None,
        identity: PLACEHOLDER.to_string(),
        last_creation: PLACEHOLDER.to_string(),
        last_change: PLACEHOLDER.to_string(),
        created_segments: None,
        changed_segments: None,
        created_characters: None,
        changed_characters: None,
        status: status.label(),
    }
}

/// Report rows for one file's outcome, plus its status.
pub fn rows_for(file: &str, outcome: std::result::Result<FileAnalysis, TmxError>) -> (FileStatus, Vec<AnalysisRow>) {
    let analysis = match outcome {
        Ok(a) => a,
        Err(e) => {
            let status = FileStatus::from(&e);
            return (status.clone(), vec![error_row(file, &status)]);
        }
    };

    if analysis.records.is_empty() {
        let status = FileStatus::NoData;
        let row = AnalysisRow {
            total_units: Some(analysis.total_units),
            identity: NO_DATA.to_string(),
            ..error_row(file, &status)
        };
        return (status, vec![row]);
    }

    let status = FileStatus::Ok;
    let rows = analysis
        .records
        .iter()
        .map(|r| AnalysisRow {
            schema_version: SCHEMA_VERSION,
            file: file.to_string(),
            total_units: Some(analysis.total_units),
            identity: r.identity.clone(),
            last_creation: format_date(r.last_creation_date.as_deref()),
            last_change: format_date(r.last_change_date.as_deref()),
            created_segments: Some(r.created_segments),
            changed_segments: Some(r.changed_segments),
            created_characters: Some(r.created_characters),
            changed_characters: Some(r.changed_characters),
            status: status.label(),
        })
        .collect();
    (status, rows)
}

/// Analyse every `.tmx` file under `root`. Per-file failures become error rows.
pub fn analyze_dir(root: &Path, recursive: bool) -> Result<AnalysisSummary> {
    let files = find_tmx_files(root, recursive, &[])?;
    let total = files.len();
    let mut summary = AnalysisSummary {
        files: total,
        failed: 0,
        rows: Vec::new(),
    };

    for (i, path) in files.iter().enumerate() {
        let name = file_name(path);
        let outcome = analyze_file(path);
        match &outcome {
            Ok(a) => tracing::info!(
                event = "file_analyzed",
                file = %name,
                progress = format!("{}/{}", i + 1, total),
                units = a.total_units,
                identities = a.records.len(),
                encoding = a.encoding.unwrap_or("-"),
            ),
            Err(e) => tracing::warn!(event = "file_failed", file = %name, error = %e),
        }
        let (status, rows) = rows_for(&name, outcome);
        if !status.is_ok() {
            summary.failed += 1;
        }
        summary.rows.extend(rows);
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tmxkit_core::AttributionRecord;

    #[test]
    fn one_row_per_identity() {
        let mut anna = AttributionRecord::new("Anna");
        anna.created_segments = 2;
        anna.created_characters = 11;
        anna.last_creation_date = Some("20240105T101010Z".into());
        let analysis = FileAnalysis {
            total_units: 2,
            records: vec![anna, AttributionRecord::new("bob")],
            ..FileAnalysis::default()
        };
        let (status, rows) = rows_for("a.tmx", Ok(analysis));
        assert_eq!(status, FileStatus::Ok);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].identity, "Anna");
        assert_eq!(rows[0].last_creation, "2024.01.05");
        assert_eq!(rows[0].last_change, "-");
        assert_eq!(rows[0].created_characters, Some(11));
        assert_eq!(rows[1].status, "OK");
    }

    #[test]
    fn no_identities_and_errors() {
        let (status, rows) = rows_for("empty.tmx", Ok(FileAnalysis { total_units: 4, ..FileAnalysis::default() }));
        assert_eq!(status, FileStatus::NoData);
        assert_eq!(rows[0].identity, NO_DATA);
        assert_eq!(rows[0].total_units, Some(4));
        assert_eq!(rows[0].created_segments, None);
        assert_eq!(rows[0].status, "NO ID");

        let (status, rows) = rows_for("bad.tmx", Err(TmxError::MissingBody));
        assert!(!status.is_ok());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_units, None);
        assert_eq!(rows[0].status, "ERROR: no <body> element found");
    }

    #[test]
    fn directory_run_continues_past_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("good.tmx"),
            r#"<tmx><header><prop type="targetlang">en</prop></header><body><tu creationid="anna"><tuv xml:lang="en"><seg>Hi</seg></tuv></tu></body></tmx>"#,
        )
        .unwrap();
        fs::write(dir.path().join("bad.tmx"), "<tmx><body><tu></body>").unwrap();

        let summary = analyze_dir(dir.path(), false).unwrap();
        assert_eq!(summary.files, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.rows.len(), 2);
        assert!(summary.rows[0].status.starts_with("ERROR: "));
        assert_eq!(summary.rows[1].identity, "anna");
        assert_eq!(summary.rows[1].created_characters, Some(2));
    }
}
