//! Headless match runner.
//!
//! Runs two-team matches without graphics and writes JSON reports.
//! Designed for CI testing and determinism checks.
//!
//! # Usage
//!
//! ```bash
//! # Run one match and print its report
//! cargo run -p clash_headless -- run --scenario duel_1v1
//!
//! # Run a batch of jittered matches
//! cargo run -p clash_headless -- batch --scenario skirmish_3v3 --count 1000 --output results/
//!
//! # Verify determinism
//! cargo run -p clash_headless -- verify --scenario skirmish_3v3 --seed 7 --runs 5
//! ```
//!
//! Reports go to stdout, logs to stderr. `RUST_LOG` overrides the log level.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use clash_headless::{
    batch::{run_batch, verify_determinism, BatchConfig},
    runner::MatchRunner,
    scenario::{Scenario, PRESETS},
};

#[derive(Parser)]
#[command(name = "clash_headless")]
#[command(about = "Headless two-team match runner for CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single match to completion
    Run {
        /// Preset name or scenario file
        #[arg(short, long, default_value = "duel_1v1")]
        scenario: String,

        /// Override the scenario's tick limit
        #[arg(long)]
        max_ticks: Option<u64>,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a batch of seeded matches
    Batch {
        /// Preset name or scenario file
        #[arg(short, long, default_value = "skirmish_3v3")]
        scenario: String,

        /// Number of matches to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel matches (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: usize,

        /// Starting seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Largest spawn nudge per axis
        #[arg(long, default_value = "1.0")]
        jitter: f64,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,
    },

    /// Verify determinism by running the same seed several times
    Verify {
        /// Preset name or scenario file
        #[arg(short, long, default_value = "skirmish_3v3")]
        scenario: String,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Largest spawn nudge per axis
        #[arg(long, default_value = "1.0")]
        jitter: f64,
    },

    /// List built-in scenarios
    Presets,
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr, stdout is for reports
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match cli.command {
        Commands::Run {
            scenario,
            max_ticks,
            output,
        } => cmd_run(&scenario, max_ticks, output),
        Commands::Batch {
            scenario,
            count,
            parallel,
            seed,
            jitter,
            output,
        } => cmd_batch(&scenario, count, parallel, seed, jitter, output),
        Commands::Verify {
            scenario,
            seed,
            runs,
            jitter,
        } => cmd_verify(&scenario, seed, runs, jitter),
        Commands::Presets => {
            for name in PRESETS {
                println!("{name}");
            }
        }
    }
}

fn load_scenario(name_or_path: &str) -> Scenario {
    match Scenario::resolve(name_or_path) {
        Ok(scenario) => scenario,
        Err(e) => {
            tracing::error!(error = %e, scenario = name_or_path, "Failed to load scenario");
            eprintln!("FATAL: Cannot load scenario '{name_or_path}': {e}");
            std::process::exit(1);
        }
    }
}

/// Run a single match
fn cmd_run(scenario: &str, max_ticks: Option<u64>, output: Option<PathBuf>) {
    let mut scenario = load_scenario(scenario);
    if let Some(limit) = max_ticks {
        scenario.max_ticks = limit;
    }

    let runner = match MatchRunner::new(&scenario) {
        Ok(runner) => runner,
        Err(e) => {
            tracing::error!(error = %e, "Failed to set up match");
            eprintln!("FATAL: {e}");
            std::process::exit(1);
        }
    };
    let report = runner.run_to_completion();

    if let Some(path) = output {
        if let Err(e) = report.save(&path) {
            tracing::error!(error = %e, path = %path.display(), "Failed to save report");
            eprintln!("FATAL: Failed to save report: {e}");
            std::process::exit(1);
        }
        eprintln!("Report saved to: {}", path.display());
        return;
    }

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("FATAL: Failed to encode report: {e}");
            std::process::exit(1);
        }
    }
}

/// Run a batch of seeded matches
fn cmd_batch(
    scenario_name: &str,
    count: u32,
    parallel: usize,
    seed: u64,
    jitter: f64,
    output: PathBuf,
) {
    let scenario = load_scenario(scenario_name);

    tracing::info!(
        scenario = %scenario.name,
        count,
        parallel,
        seed,
        jitter,
        output = %output.display(),
        "Batch configuration"
    );

    if let Err(e) = std::fs::create_dir_all(&output) {
        tracing::error!(error = %e, path = %output.display(), "Failed to create output directory");
        eprintln!(
            "FATAL: Cannot create output directory '{}': {}",
            output.display(),
            e
        );
        std::process::exit(1);
    }

    let mut config = BatchConfig::new(scenario_name, count)
        .with_seed(seed)
        .with_jitter(jitter)
        .with_output(output.clone());
    config.parallel_matches = parallel;

    let results = run_batch(config, &scenario);

    let results_path = output.join("batch_results.json");
    if let Err(e) = results.save(&results_path) {
        tracing::error!(error = %e, path = %results_path.display(), "Failed to save results");
        eprintln!("FATAL: Failed to save results: {e}");
        std::process::exit(1);
    }

    let summary = &results.summary;
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Matches played: {}", results.matches.len());
    if !results.errors.is_empty() {
        eprintln!("Matches FAILED: {}", results.errors.len());
    }
    eprintln!("Duration: {:.1}s", results.duration_seconds);
    eprintln!(
        "Average length: {:.1} ticks ({}..={})",
        summary.avg_duration_ticks, summary.min_duration_ticks, summary.max_duration_ticks
    );
    eprintln!("Draws: {}  Timeouts: {}", summary.draws, summary.timeouts);
    eprintln!("\nWin Rates:");
    for (team, rate) in &summary.win_rates {
        eprintln!("  {}: {:.1}%", team, rate * 100.0);
    }

    if !results.errors.is_empty() {
        eprintln!("\nMATCH FAILURES:");
        for error in results.errors.iter().take(10) {
            eprintln!(
                "  Match {} (seed {}): {}",
                error.match_index, error.seed, error.message
            );
        }
        if results.errors.len() > 10 {
            eprintln!("  ... and {} more failures", results.errors.len() - 10);
        }
    }

    eprintln!("\nResults saved to: {}", results_path.display());
}

/// Verify determinism
fn cmd_verify(scenario_name: &str, seed: u64, runs: u32, jitter: f64) {
    let scenario = load_scenario(scenario_name);
    tracing::info!(
        "Verifying determinism: {} with seed {} ({} runs)",
        scenario.name,
        seed,
        runs
    );

    if verify_determinism(&scenario, seed, jitter, runs) {
        eprintln!("PASS: All {runs} runs produced identical results");
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        std::process::exit(1);
    }
}
