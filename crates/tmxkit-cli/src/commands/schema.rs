use std::fs;

pub fn run_schema(out_dir: std::path::PathBuf) -> color_eyre::Result<()> {
    fs::create_dir_all(&out_dir)?;
    macro_rules! dump {
        ($ty:ty, $name:literal) => {{
            let schema = schemars::schema_for!($ty);
            let path = out_dir.join($name);
            let f = std::fs::File::create(&path)?;
            serde_json::to_writer_pretty(f, &schema)?;
        }};
    }
    dump!(tmxkit_domain::AnalysisRow, "analysis_row.schema.json");
    dump!(tmxkit_domain::AnalysisSummary, "analysis_summary.schema.json");
    dump!(tmxkit_domain::FilterFileStat, "filter_file_stat.schema.json");
    dump!(tmxkit_domain::FilterSummary, "filter_summary.schema.json");
    tracing::info!(event = "schema_dumped", path = %out_dir.display());
    Ok(())
}
