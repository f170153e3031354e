// qtycheck - landscaping quantity checks: plan sheets vs. the master table

mod exit_codes;
mod recon;
mod report;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use exit_codes::EXIT_SUCCESS;

#[derive(Parser)]
#[command(name = "qtycheck")]
#[command(about = "Reconcile plan-sheet quantities against the master summary table")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// More log output on stderr (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that runs a stage.
#[derive(Args)]
pub struct RunOpts {
    /// TOML config (tolerance, duplicate policy, tree keywords)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Directory for CSV reports and logs [default: config output.dir, else ./output]
    #[arg(long)]
    pub outdir: Option<PathBuf>,

    /// Extractor log to merge into extract_log.txt
    #[arg(long, value_name = "FILE")]
    pub extract_log: Option<PathBuf>,

    /// Print the result as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Write the JSON result to a file
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Stage 2: reconcile summed plan-sheet quantities against master totals
    #[command(after_help = "\
Exit code 3 means at least one MISMATCH, ONLY_IN_MASTER or ONLY_IN_PLANS item.

Examples:
  qtycheck totals --plan plan_rows.csv --master master_rows.csv
  qtycheck totals --plan L-101.csv --plan L-102.csv --master L-003.csv -c qty.toml
  qtycheck totals --plan plan.csv --master master.csv --json > totals.json")]
    Totals {
        /// Plan-sheet rows CSV. Repeatable.
        #[arg(long, required = true)]
        plan: Vec<PathBuf>,

        /// Master-table rows CSV
        #[arg(long)]
        master: PathBuf,

        #[command(flatten)]
        opts: RunOpts,
    },

    /// Stage 3: check recognized quantities of tree items from master remarks
    #[command(after_help = "\
Exit code 3 means at least one MISMATCH, RULE_NOT_FOUND or TREE_CANDIDATE item.

Examples:
  qtycheck recognized --master master.csv
  qtycheck recognized --master master.csv --stage2 output/recon_summary.csv
  qtycheck recognized --master master.csv --plan plan.csv -c qty.toml")]
    Recognized {
        /// Master-table rows CSV
        #[arg(long)]
        master: PathBuf,

        /// Plan-sheet rows CSV, used for provenance only. Repeatable.
        #[arg(long)]
        plan: Vec<PathBuf>,

        /// Stage-2 recon_summary.csv supplying actual quantities
        #[arg(long)]
        stage2: Option<PathBuf>,

        #[command(flatten)]
        opts: RunOpts,
    },

    /// Run Stage 2 and then Stage 3 on its in-memory results
    #[command(after_help = "\
Examples:
  qtycheck run --plan plan.csv --master master.csv
  qtycheck run --plan plan.csv --master master.csv --outdir reports --json")]
    Run {
        /// Plan-sheet rows CSV. Repeatable.
        #[arg(long, required = true)]
        plan: Vec<PathBuf>,

        /// Master-table rows CSV
        #[arg(long)]
        master: PathBuf,

        #[command(flatten)]
        opts: RunOpts,
    },

    /// Report, per plan row, whether and how loosely the master lists it
    #[command(after_help = "\
Exit code 3 means at least one plan row is NOT_FOUND in the master table.

Examples:
  qtycheck audit --plan plan.csv --master master.csv")]
    Audit {
        /// Plan-sheet rows CSV. Repeatable.
        #[arg(long, required = true)]
        plan: Vec<PathBuf>,

        /// Master-table rows CSV
        #[arg(long)]
        master: PathBuf,

        #[command(flatten)]
        opts: RunOpts,
    },

    /// Validate a config file without running
    #[command(after_help = "\
Examples:
  qtycheck validate qty.toml")]
    Validate {
        /// Path to the TOML config file
        config: PathBuf,
    },
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  qtycheck-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  qtycheck-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

/// Route engine `log` records and our own to stderr.
fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Totals { plan, master, opts } => recon::cmd_totals(plan, master, opts),
        Commands::Recognized { master, plan, stage2, opts } => {
            recon::cmd_recognized(master, plan, stage2, opts)
        }
        Commands::Run { plan, master, opts } => recon::cmd_run(plan, master, opts),
        Commands::Audit { plan, master, opts } => recon::cmd_audit(plan, master, opts),
        Commands::Validate { config } => recon::cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<qtycheck_recon::ReconError> for CliError {
    fn from(err: qtycheck_recon::ReconError) -> Self {
        let code = exit_codes::recon_exit_code(&err);
        let hint = match &err {
            qtycheck_recon::ReconError::MissingColumn { .. } => {
                Some("expected captions like work_name/공종, spec/규격, unit/단위, qty/수량".to_string())
            }
            qtycheck_recon::ReconError::DuplicateMasterKey { .. } => {
                Some("set [master] on_duplicate = \"keep_first\" or \"sum\" to continue".to_string())
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }
}
