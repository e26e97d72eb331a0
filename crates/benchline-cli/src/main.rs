#![forbid(unsafe_code)]

mod cmd;
mod output;

use benchline_core::config::{EffectiveConfig, resolve_config};
use benchline_core::error::ErrorCode;
use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "benchline: day-by-day repair timelines for hashboard batches",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Suppress non-essential output.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Directory holding `batches.json` and per-batch unit exports.
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Derive the output mode from flags and the resolved config.
    fn output_mode(&self, config: &EffectiveConfig) -> OutputMode {
        resolve_output_mode(self.format, &config.resolved_output)
    }

    /// `--data-dir`, then the user config, then `./data`.
    fn data_dir(&self, config: &EffectiveConfig, project_root: &Path) -> PathBuf {
        self.data_dir
            .clone()
            .or_else(|| config.user.data_dir.clone())
            .unwrap_or_else(|| project_root.join("data"))
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Read",
        about = "List batches",
        long_about = "List every batch in the dataset with its unit count and closure state.",
        after_help = "EXAMPLES:\n    # List active batches\n    bl batches\n\n    # Include batches on the skip-list\n    bl batches --all\n\n    # Emit machine-readable output\n    bl batches --json"
    )]
    Batches(cmd::batches::BatchesArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show the daily cohort table of a batch",
        long_about = "Rebuild every unit's day-by-day state and show how many units sat in each state on each day.",
        after_help = "EXAMPLES:\n    # Pruned table for a batch\n    bl timeline RT-18231\n\n    # Every day of the batch range\n    bl timeline 18231 --no-prune\n\n    # Emit machine-readable output\n    bl timeline RT-18231 --json"
    )]
    Timeline(cmd::timeline::TimelineArgs),

    #[command(
        next_help_heading = "Read",
        about = "Summarize batches",
        long_about = "Closure state, activity window, business days and throughput for one batch or all of them.",
        after_help = "EXAMPLES:\n    # Summarize every batch\n    bl summary\n\n    # Summarize one batch\n    bl summary RT-18231\n\n    # Emit machine-readable output\n    bl summary --json"
    )]
    Summary(cmd::summary::SummaryArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show repair events per board",
        long_about = "Milestone transitions and technician comments for boards that completed the repair path.",
        after_help = "EXAMPLES:\n    # Repair log for a batch\n    bl repairs RT-18231\n\n    # Emit machine-readable output\n    bl repairs RT-18231 --json"
    )]
    Repairs(cmd::repairs::RepairsArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Generate shell completion scripts",
        long_about = "Generate shell completion scripts for supported shells.",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    bl completions bash\n\n    # Generate zsh completions\n    bl completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("BENCHLINE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "benchline=debug,info"
        } else {
            "benchline=info,warn"
        })
    });

    let format = env::var("BENCHLINE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    if let Commands::Completions(args) = &cli.command {
        let mut command = Cli::command();
        return cmd::completions::run_completions(args.shell, &mut command);
    }

    let project_root = env::current_dir()?;
    let config = match resolve_config(&project_root, cli.json) {
        Ok(config) => config,
        Err(err) => {
            let output = resolve_output_mode(cli.format, if cli.json { "json" } else { "text" });
            render_error(
                output,
                &CliError::coded(format!("{err:#}"), ErrorCode::ConfigParseError),
            )?;
            return Err(err);
        }
    };
    let output = cli.output_mode(&config);
    let data_dir = cli.data_dir(&config, &project_root);
    debug!(data_dir = %data_dir.display(), ?output, "resolved run settings");

    let ctx = cmd::Context::open(&data_dir, config.project, output, cli.quiet)?;

    match cli.command {
        Commands::Batches(ref args) => cmd::batches::run_batches(args, &ctx),
        Commands::Timeline(ref args) => cmd::timeline::run_timeline(args, &ctx),
        Commands::Summary(ref args) => cmd::summary::run_summary(args, &ctx),
        Commands::Repairs(ref args) => cmd::repairs::run_repairs(args, &ctx),
        Commands::Completions(_) => Ok(()),
    }
}
