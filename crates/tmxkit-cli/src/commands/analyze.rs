use std::io::Write;
use std::path::PathBuf;

pub fn run_analyze(
    root: PathBuf,
    out_csv: Option<PathBuf>,
    format: Option<String>,
    recursive: bool,
) -> color_eyre::Result<()> {
    let cfg = tmxkit_config::load_config()?.analyze.unwrap_or_default();
    let format = format.or(cfg.format).unwrap_or_else(|| "csv".to_string());
    let out = out_csv.or(cfg.out_csv.map(PathBuf::from));
    let recursive = recursive || cfg.recursive.unwrap_or(false);
    tracing::debug!(event = "analyze_args", root = ?root, out = ?out, format = %format, recursive);

    let summary = tmxkit_services::analyze_dir(&root, recursive)?;

    let mut writer: Box<dyn Write> = match &out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Box::new(std::io::BufWriter::new(std::fs::File::create(path)?))
        }
        None => Box::new(std::io::stdout().lock()),
    };
    match format.as_str() {
        "json" => {
            serde_json::to_writer_pretty(&mut writer, &summary)?;
            writeln!(writer)?;
        }
        "csv" => tmxkit_export_csv::write_analysis_csv(&mut writer, &summary.rows)?,
        other => color_eyre::eyre::bail!("unsupported format: {other}"),
    }
    writer.flush()?;

    tracing::info!(
        event = "analyze_done",
        files = summary.files,
        failed = summary.failed,
        rows = summary.rows.len(),
        out = %out.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "-".into()),
    );
    Ok(())
}
