//! Benchmark driver: sweep strategies × worker counts × repeats
//!
//! Each cell re-invokes this executable with a strategy subcommand and treats
//! the child as an opaque metrics source: stdout and stderr are scanned for
//! the literal `Time elapsed:` and `Average throughput:` markers. When a
//! child dies or times out, the cell records dashes and the sweep continues;
//! when the markers are missing, the driver falls back to its own wall-clock
//! measurement of the child.

use crate::dates::DateKey;
use crate::error::Result;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tabled::{Table, Tabled};

/// Strategy subcommands the sweep drives, with whether they take a
/// concurrency cap
const METHODS: [(&str, bool); 3] = [("pool", false), ("ranks", false), ("bounded", true)];

/// Benchmark sweep settings
#[derive(Debug, Clone)]
pub struct BenchOptions {
    /// Inclusive range start handed to every child run
    pub start: DateKey,
    /// Inclusive range end handed to every child run
    pub end: DateKey,
    /// Worker counts to sweep
    pub workers: Vec<usize>,
    /// Repeats per (method, workers) cell
    pub repeats: u32,
    /// Per-child timeout in seconds
    pub timeout_secs: u64,
}

/// One sweep cell in the final table
#[derive(Debug, Clone, Tabled)]
pub struct BenchRow {
    /// Strategy subcommand name
    #[tabled(rename = "Method")]
    pub method: String,
    /// Worker count for this cell
    #[tabled(rename = "Workers")]
    pub workers: usize,
    /// Repeat index, 1-based
    #[tabled(rename = "Run")]
    pub run: u32,
    /// Scraped elapsed seconds, or wall-clock fallback, or `-`
    #[tabled(rename = "ExecTime")]
    pub exec_time: String,
    /// Scraped throughput in days/sec, or `-`
    #[tabled(rename = "Throughput")]
    pub throughput: String,
}

/// Run the full sweep and print the result table
///
/// # Errors
///
/// Fails only on startup problems (no current executable path, no runtime);
/// individual child failures are recorded as dashes.
pub fn run(opts: &BenchOptions) -> Result<()> {
    let exe = std::env::current_exe()?;
    let runtime = tokio::runtime::Runtime::new()?;
    let mut rows = Vec::new();

    for (method, takes_concurrent) in METHODS {
        for &workers in &opts.workers {
            for run in 1..=opts.repeats {
                println!("\nRunning {method} | workers: {workers} | run: {run}");
                let row = runtime.block_on(run_cell(CellSpec {
                    exe: exe.clone(),
                    method,
                    takes_concurrent,
                    workers,
                    run,
                    opts,
                }));
                println!(
                    "Done: {method} | workers: {workers} | run: {run} | Time: {} | Throughput: {}",
                    row.exec_time, row.throughput
                );
                rows.push(row);
            }
        }
    }

    println!("\n==== Benchmark Results ====");
    println!("{}", Table::new(&rows));
    Ok(())
}

struct CellSpec<'a> {
    exe: PathBuf,
    method: &'static str,
    takes_concurrent: bool,
    workers: usize,
    run: u32,
    opts: &'a BenchOptions,
}

/// Execute one child run and scrape its metrics
async fn run_cell(spec: CellSpec<'_>) -> BenchRow {
    let out_file = format!("output_MIX_{}_{}_{}.csv", spec.method, spec.workers, spec.run);
    let mut command = tokio::process::Command::new(&spec.exe);
    command
        .arg(spec.method)
        .arg("--start")
        .arg(spec.opts.start.to_string())
        .arg("--end")
        .arg(spec.opts.end.to_string())
        .arg("--out")
        .arg(&out_file)
        .arg("--workers")
        .arg(spec.workers.to_string())
        .arg("--clean")
        .kill_on_drop(true);
    if spec.takes_concurrent {
        command.arg("--concurrent").arg(spec.workers.to_string());
    }

    let started = Instant::now();
    let outcome = tokio::time::timeout(
        Duration::from_secs(spec.opts.timeout_secs),
        command.output(),
    )
    .await;
    let wall = started.elapsed();

    let (exec_time, throughput) = match outcome {
        Ok(Ok(output)) => {
            let text = format!(
                "{}{}",
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
            let elapsed = scrape_metric(&text, "Time elapsed:")
                .unwrap_or_else(|| (wall.as_secs_f64() * 100.0).round() / 100.0);
            let throughput = scrape_metric(&text, "Average throughput:");
            (Some(elapsed), throughput)
        }
        Ok(Err(e)) => {
            tracing::warn!(method = spec.method, workers = spec.workers, error = %e, "child run failed");
            (None, None)
        }
        Err(_) => {
            tracing::warn!(
                method = spec.method,
                workers = spec.workers,
                timeout_secs = spec.opts.timeout_secs,
                "child run timed out"
            );
            (None, None)
        }
    };

    BenchRow {
        method: spec.method.to_string(),
        workers: spec.workers,
        run: spec.run,
        exec_time: exec_time.map_or_else(|| "-".to_string(), |t| format!("{t:.2}")),
        throughput: throughput.map_or_else(|| "-".to_string(), |t| format!("{t:.2}")),
    }
}

/// Find `marker` in any output line and parse the first token after it
fn scrape_metric(output: &str, marker: &str) -> Option<f64> {
    output.lines().find_map(|line| {
        let (_, rest) = line.split_once(marker)?;
        rest.split_whitespace().next()?.parse().ok()
    })
}
