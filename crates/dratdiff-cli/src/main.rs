//! dratdiff - differential harness for DRAT proof checkers
//!
//! Builds the checker under test, then for every file in the test directory
//! produces a certificate with the solver and checks it with both the
//! reference checker and the checker under test.
//!
//! Results go to stdout, logs to stderr. The exit code is 0 whenever the
//! batch ran, regardless of mismatches.

use anyhow::{Context, Result};
use clap::Parser;
use dratdiff_core::config::{
    DEFAULT_CERTIFICATE, DEFAULT_REFERENCE, DEFAULT_SOLVER, DEFAULT_UNDER_TEST,
};
use dratdiff_core::{init_tracing, BatchSummary, HarnessConfig, InstanceReport, InstanceRunner};
use std::path::PathBuf;
use tracing::{warn, Level};

/// Exit code after Ctrl-C, following the shell convention.
const INTERRUPTED_EXIT: i32 = 130;

#[derive(Parser, Debug)]
#[command(name = "dratdiff")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compare a DRAT proof checker against a reference checker", long_about = None)]
struct Cli {
    /// Directory of problem instances (regular files, non-recursive)
    test_dir: PathBuf,

    /// Solver producing certificates in certified mode
    #[arg(long, env = "DRATDIFF_SOLVER", default_value = DEFAULT_SOLVER)]
    solver: PathBuf,

    /// Trusted reference checker
    #[arg(long, env = "DRATDIFF_REFERENCE", default_value = DEFAULT_REFERENCE)]
    reference: PathBuf,

    /// Checker under test, produced by `cargo build --release`
    #[arg(long, env = "DRATDIFF_CHECKER", default_value = DEFAULT_UNDER_TEST)]
    checker: PathBuf,

    /// Scratch certificate path, overwritten per instance
    #[arg(long, env = "DRATDIFF_CERTIFICATE", default_value = DEFAULT_CERTIFICATE)]
    certificate: PathBuf,

    /// Kill a tool after this many seconds (0 = never)
    #[arg(long, env = "DRATDIFF_TIMEOUT_SECS", default_value_t = 0)]
    timeout_secs: u64,

    /// Print reports and summary as JSON lines (logs too)
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> HarnessConfig {
        HarnessConfig {
            solver: self.solver.clone(),
            reference: self.reference.clone(),
            under_test: self.checker.clone(),
            certificate: self.certificate.clone(),
            timeout_secs: self.timeout_secs,
            ..HarnessConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Usage errors exit with 1; help and version exit with 0.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    let json = cli.json;
    let runner =
        InstanceRunner::with_processes(cli.config()).context("Invalid harness configuration")?;

    if !json {
        println!("-- building executable");
    }

    let batch = runner.run_batch_with_build_hook(
        &cli.test_dir,
        |_| {
            if !json {
                println!("-- test directory '{}'", cli.test_dir.display());
            }
        },
        |report| print_report(report, json),
    );
    let outcome = tokio::select! {
        result = batch => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    runner
        .finish()
        .context("Failed to remove scratch certificate")?;

    match outcome {
        Some(result) => {
            let summary = result
                .with_context(|| format!("Failed to run batch over {:?}", cli.test_dir))?;
            print_summary(&summary, json)
        }
        None => {
            warn!("Interrupted, batch stopped");
            std::process::exit(INTERRUPTED_EXIT);
        }
    }
}

fn print_report(report: &InstanceReport, json: bool) {
    if !json {
        println!("{}", report);
        return;
    }
    match report.to_json_line() {
        Ok(line) => println!("{}", line),
        Err(e) => warn!(instance = %report.instance, error = %e, "Failed to serialize report"),
    }
}

fn print_summary(summary: &BatchSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", summary.to_json_line()?);
    } else {
        println!("{}", summary);
    }
    Ok(())
}
