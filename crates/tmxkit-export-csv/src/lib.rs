use color_eyre::eyre::Result;
use std::io::Write;
use tmxkit_domain::{AnalysisRow, PLACEHOLDER};

pub const DELIMITER: u8 = b';';
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub const ANALYSIS_HEADERS: [&str; 10] = [
    "File",
    "Total segments",
    "Translator ID",
    "Last segment date",
    "Last change date",
    "Created segments",
    "Changed segments",
    "Created characters",
    "Changed characters",
    "Status",
];

fn cell(v: Option<u64>) -> String {
    v.map(|n| n.to_string())
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

/// Write the analysis report: UTF-8 BOM, `;`-delimited, one header line.
pub fn write_analysis_csv<W: Write>(mut writer: W, rows: &[AnalysisRow]) -> Result<()> {
    writer.write_all(UTF8_BOM)?;
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .from_writer(writer);

    wtr.write_record(ANALYSIS_HEADERS)?;
    for r in rows {
        wtr.write_record([
            r.file.as_str(),
            &cell(r.total_units),
            &r.identity,
            &r.last_creation,
            &r.last_change,
            &cell(r.created_segments),
            &cell(r.changed_segments),
            &cell(r.created_characters),
            &cell(r.changed_characters),
            &r.status,
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
