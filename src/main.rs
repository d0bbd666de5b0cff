//! CLI entry point for the benchmark metrics tools.
//!
//! Provides subcommands for aggregating a benchmark results directory,
//! flattening qmassa telemetry dumps, charting GPU monitor CSVs, and
//! timestamping frame metadata messages.

use anyhow::{Result, bail};
use bench_metrics::analyzers::merge::merge;
use bench_metrics::analyzers::scan::process_benchmark_directory;
use bench_metrics::annotate::{VecFrame, process_frame};
use bench_metrics::output::{COMPREHENSIVE_METRICS_FILE, render_summary_table, save_to_csv};
use bench_metrics::telemetry::plot::plot_gpu_metrics;
use bench_metrics::telemetry::qmassa::{QmassaMetrics, parse_qmassa_file};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "bench_metrics")]
#[command(about = "Offline analysis tools for GPU/media benchmark runs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge benchmark logs and per-run VRAM telemetry into one CSV and summary table
    Metrics {
        /// Benchmark results directory
        #[arg(
            value_name = "BENCHMARK_DIR",
            env = "BENCH_RESULTS_DIR",
            default_value = "benchmark_results"
        )]
        benchmark_dir: PathBuf,
    },
    /// Print the latest readings of a qmassa JSON dump as one CSV line
    Qmassa {
        /// qmassa JSON output file
        #[arg(value_name = "JSON_FILE")]
        json_file: PathBuf,
    },
    /// Render GPU monitor charts and print summary statistics
    Plot {
        /// gpu_monitor.csv to chart
        #[arg(value_name = "CSV_FILE")]
        csv_file: PathBuf,

        /// Directory for the charts (defaults to the CSV's directory)
        #[arg(value_name = "OUTPUT_DIR")]
        output_dir: Option<PathBuf>,
    },
    /// Add a system timestamp to each JSON metadata line read from stdin
    Stamp,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let _file_guard = init_tracing()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Metrics { benchmark_dir } => run_metrics(&benchmark_dir)?,
        Commands::Qmassa { json_file } => {
            let line = match parse_qmassa_file(&json_file) {
                Ok(metrics) => metrics.to_csv_line(),
                Err(e) => {
                    error!(error = %e, "Error parsing qmassa JSON");
                    QmassaMetrics::zero_csv_line()
                }
            };
            println!("{line}");
        }
        Commands::Plot {
            csv_file,
            output_dir,
        } => {
            if !csv_file.exists() {
                bail!("CSV file not found: {}", csv_file.display());
            }
            let report = plot_gpu_metrics(&csv_file, output_dir.as_deref())?;
            print!("{}", report.render_summary());
            info!(output_dir = %report.output_dir.display(), "Plots saved");
        }
        Commands::Stamp => run_stamp()?,
    }

    Ok(())
}

/// Logging setup: colored stderr + JSON rolling log file.
fn init_tracing() -> Result<WorkerGuard> {
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/bench_metrics.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("bench_metrics.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    Ok(guard)
}

/// Scans, merges, saves and summarises one benchmark results directory.
#[tracing::instrument(skip_all, fields(dir = %benchmark_dir.display()))]
fn run_metrics(benchmark_dir: &Path) -> Result<()> {
    if !benchmark_dir.is_dir() {
        error!("Benchmark directory not found");
        bail!("Directory not found: {}", benchmark_dir.display());
    }

    info!("Processing benchmark directory");
    let data = process_benchmark_directory(benchmark_dir)?;
    let rows = merge(&data.performance, &data.vram);

    save_to_csv(&rows, &benchmark_dir.join(COMPREHENSIVE_METRICS_FILE))?;
    print!("{}", render_summary_table(&rows));

    Ok(())
}

/// Treats each non-empty stdin line as a one-message frame and writes it back stamped.
fn run_stamp() -> Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();
    let mut frames = 0usize;

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let mut frame = VecFrame::new(vec![line]);
        process_frame(&mut frame);
        for message in frame.into_messages() {
            writeln!(stdout, "{message}")?;
        }
        frames += 1;
    }

    stdout.flush()?;
    info!(frames, "Stamping complete");
    Ok(())
}
