//! `dist_qsub` diagnostics tool.
//!
//! Reports which runs of a run list are missing, finished, or unfinished, and
//! whether `dist_qsub` still tracks them. With `--patch` it also repairs the
//! wrapper's bookkeeping so stalled arrays can be resubmitted.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use qsub_diag::error::exit_code_for;
use qsub_diag::io::config::{DEFAULT_CONFIG_FILE, load_config};
use qsub_diag::io::diag_report::{DiagSummary, render_text};
use qsub_diag::io::probe::{ProbeRegistry, ProbeSelection};
use qsub_diag::reconcile::{DiagnoseRequest, diagnose};
use qsub_diag::{exit_codes, logging};

#[derive(Parser)]
#[command(name = "qsub-diag", version, about = "dist_qsub diagnostics tool")]
struct Cli {
    /// Run list for the runs being diagnosed.
    run_list: PathBuf,

    /// A run is finished when a line of its `run.log` contains this string.
    #[arg(long)]
    done_str: Option<String>,

    /// Registered done predicate (e.g. `fitness_csv`). Takes precedence over
    /// `--done-str`.
    #[arg(long)]
    done_fn: Option<String>,

    /// Rewrite tracking files and flip checkpoint recovery on dead arrays.
    #[arg(long)]
    patch: bool,

    /// Directory for the `.diag` artifacts (default: current directory).
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Configuration file.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Print a JSON summary instead of the text report.
    #[arg(long)]
    json: bool,

    /// Also list expected runs and the runs `dist_qsub` is finished tracking.
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(exit_code_for(&err));
    }
    std::process::exit(exit_codes::OK);
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let mut registry = ProbeRegistry::with_builtins(&config);

    let request = DiagnoseRequest {
        run_list_path: cli.run_list,
        selection: ProbeSelection {
            done_str: cli.done_str,
            done_fn: cli.done_fn,
        },
        config,
        out_dir: cli.out_dir,
        patch: cli.patch,
    };
    let outcome = diagnose(&request, &mut registry)?;

    if cli.json {
        let summary = DiagSummary::new(
            &outcome.run_list,
            &outcome.reconciliation.classification,
            &outcome.artifacts,
            outcome.repairs.as_deref(),
        );
        let payload = serde_json::to_string_pretty(&summary).context("serialize summary")?;
        println!("{payload}");
    } else {
        print!(
            "{}",
            render_text(
                &outcome.run_list,
                &outcome.reconciliation.classification,
                outcome.repairs.as_deref(),
                cli.verbose.then_some(outcome.reconciliation.tracked.as_slice()),
            )
        );
    }
    Ok(())
}
