use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::Layer;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "tmxkit", version, about = "TMX translator attribution and cleanup toolkit")]
struct Cli {
    /// Only print warnings and errors to the console
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Per-translator segment and character statistics for every TMX file
    Analyze {
        #[arg(short, long)]
        root: PathBuf,
        /// Report path; stdout when omitted
        #[arg(long)]
        out_csv: Option<PathBuf>,
        #[arg(long, value_parser = ["csv", "json"])]
        format: Option<String>,
        #[arg(long, default_value_t = false)]
        recursive: bool,
    },

    /// Remove units created by denied translators and write `<name>_Updated.tmx`
    Filter {
        #[arg(short, long)]
        root: PathBuf,
        /// Newline-delimited identities denied in every file
        #[arg(long, conflicts_with = "deny_report")]
        denylist: Option<PathBuf>,
        /// `file;identity` rows denying identities per TM file
        #[arg(long)]
        deny_report: Option<PathBuf>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Also remove units whose last modifier is denied
        #[arg(long, default_value_t = false)]
        match_change_id: bool,
        #[arg(long, value_parser = ["structural", "lines", "auto"])]
        strategy: Option<String>,
        #[arg(long, value_parser = ["utf-16le", "utf-8", "utf-8-bom", "source"])]
        output_encoding: Option<String>,
        #[arg(long)]
        log_file: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        recursive: bool,
        /// Print the per-file summary as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Write JSON schemas of the report rows
    Schema {
        #[arg(long, default_value = "./docs/assets/schemas")]
        out_dir: PathBuf,
    },
}

trait Runnable {
    fn run(self) -> Result<()>;
}

impl Runnable for Commands {
    fn run(self) -> Result<()> {
        debug!(event = "command_args", args = ?self);
        match self {
            Commands::Analyze {
                root,
                out_csv,
                format,
                recursive,
            } => commands::analyze::run_analyze(root, out_csv, format, recursive),

            Commands::Filter {
                root,
                denylist,
                deny_report,
                out_dir,
                match_change_id,
                strategy,
                output_encoding,
                log_file,
                recursive,
                json,
            } => commands::filter::run_filter(commands::filter::FilterArgs {
                root,
                denylist,
                deny_report,
                out_dir,
                match_change_id,
                strategy,
                output_encoding,
                log_file,
                recursive,
                json,
            }),

            Commands::Schema { out_dir } => commands::schema::run_schema(out_dir),
        }
    }
}

fn init_tracing(quiet: bool) -> WorkerGuard {
    let file_appender = rolling::daily("logs", "tmxkit.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if quiet { "warn" } else { "info" };
    let console_filter = if quiet {
        EnvFilter::new(default_level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };
    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(file_writer)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
    guard
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let _guard = init_tracing(cli.quiet);
    info!(event = "start", version = env!("CARGO_PKG_VERSION"));

    cli.cmd.run()
}
