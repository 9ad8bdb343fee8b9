use color_eyre::eyre::{bail, eyre, WrapErr};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tmxkit_parsers_tmx::{DenyMatch, OutputEncoding, RewriteStrategy};
use tmxkit_services::filter::{DEFAULT_LOG_FILE, DEFAULT_OUT_DIR};
use tmxkit_services::FilterRun;

#[derive(Debug)]
pub struct FilterArgs {
    pub root: PathBuf,
    pub denylist: Option<PathBuf>,
    pub deny_report: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub match_change_id: bool,
    pub strategy: Option<String>,
    pub output_encoding: Option<String>,
    pub log_file: Option<PathBuf>,
    pub recursive: bool,
    pub json: bool,
}

pub fn run_filter(args: FilterArgs) -> color_eyre::Result<()> {
    let cfg = tmxkit_config::load_config()?.filter.unwrap_or_default();

    // Flags win over the config file; a flag-given source hides both config sources.
    let (denylist, deny_report) = if args.denylist.is_some() || args.deny_report.is_some() {
        (args.denylist, args.deny_report)
    } else {
        (cfg.denylist.map(PathBuf::from), cfg.deny_report.map(PathBuf::from))
    };
    let deny = match (denylist, deny_report) {
        (Some(list), None) => tmxkit_services::load_list(&list)?,
        (None, Some(report)) => tmxkit_services::load_report(&report)?,
        (Some(_), Some(_)) => bail!("use either a denylist or a deny report, not both"),
        (None, None) => bail!("no denylist given (--denylist or --deny-report)"),
    };

    let mut run = FilterRun::new(
        args.out_dir
            .or(cfg.out_dir.map(PathBuf::from))
            .unwrap_or_else(|| args.root.join(DEFAULT_OUT_DIR)),
    );
    if let Some(suffix) = cfg.suffix {
        run.suffix = suffix;
    }
    run.recursive = args.recursive || cfg.recursive.unwrap_or(false);
    run.matching = if args.match_change_id || cfg.match_change_id.unwrap_or(false) {
        DenyMatch::CreationAndChange
    } else {
        DenyMatch::CreationOnly
    };
    if let Some(s) = args.strategy.or(cfg.strategy) {
        run.options.strategy = s.parse::<RewriteStrategy>().map_err(|e| eyre!(e))?;
    }
    if let Some(s) = args.output_encoding.or(cfg.output_encoding) {
        run.options.output_encoding = s.parse::<OutputEncoding>().map_err(|e| eyre!(e))?;
    }
    run.options.xml_declaration = cfg.xml_declaration;
    run.options.doctype = cfg.doctype;

    let log_path = args
        .log_file
        .or(cfg.log_file.map(PathBuf::from))
        .unwrap_or_else(|| run.out_dir.join(DEFAULT_LOG_FILE));
    tracing::debug!(
        event = "filter_args",
        root = ?args.root,
        out_dir = ?run.out_dir,
        log = ?log_path,
        strategy = %run.options.strategy,
        matching = ?run.matching,
    );

    std::fs::create_dir_all(&run.out_dir)
        .wrap_err_with(|| format!("cannot create output directory {}", run.out_dir.display()))?;
    let mut log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .wrap_err_with(|| format!("cannot open log file {}", log_path.display()))?;

    let summary = tmxkit_services::filter_dir(&args.root, &deny, &run, &mut log)?;

    if args.json {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        serde_json::to_writer_pretty(&mut lock, &summary)?;
        writeln!(lock)?;
    }
    tracing::info!(
        event = "filter_done",
        files = summary.files.len(),
        removed = summary.removed,
        failed = summary.failed,
        out_dir = %run.out_dir.display(),
        log = %log_path.display(),
    );
    Ok(())
}
