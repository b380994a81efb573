//! CLI for moex-harvest: one subcommand per concurrency strategy plus the
//! benchmark sweep.

use clap::{Args, Parser, Subcommand};
use moex_harvest::bench::{self, BenchOptions};
use moex_harvest::strategy::{bounded, pool, ranks, StrategyOptions};
use moex_harvest::{DateKey, EndpointConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Worker counts a strategy run accepts
const ALLOWED_WORKERS: [usize; 7] = [1, 2, 4, 8, 10, 12, 14];

#[derive(Debug, Parser)]
#[command(
    name = "moex-harvest",
    version = env!("CARGO_PKG_VERSION"),
    about = "Concurrent per-day harvester for MOEX derivatives open-positions data",
    propagate_version = true
)]
struct App {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Shared-queue worker pool strategy
    Pool(RunArgs),
    /// Rank-group strategy: round-robin slices, gather to a single writer
    Ranks(RunArgs),
    /// Bounded-async strategy: capped in-flight requests, parse/merge pool
    Bounded(BoundedArgs),
    /// Sweep every strategy over worker counts and tabulate the results
    Bench(BenchArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Range start, YYYYMMDD
    #[arg(long)]
    start: DateKey,

    /// Range end (inclusive), YYYYMMDD
    #[arg(long)]
    end: DateKey,

    /// Output CSV file
    #[arg(long, default_value = "output_MIX.csv")]
    out: PathBuf,

    /// Worker count
    #[arg(long, default_value_t = 4, value_parser = parse_workers)]
    workers: usize,

    /// Delete all CSV files next to the output before the run
    #[arg(long)]
    clean: bool,
}

#[derive(Debug, Args)]
struct BoundedArgs {
    #[command(flatten)]
    common: RunArgs,

    /// Maximum concurrent in-flight requests
    #[arg(long, default_value_t = 8)]
    concurrent: usize,
}

#[derive(Debug, Args)]
struct BenchArgs {
    /// Range start, YYYYMMDD
    #[arg(long)]
    start: DateKey,

    /// Range end (inclusive), YYYYMMDD
    #[arg(long)]
    end: DateKey,

    /// Worker counts to sweep, comma separated
    #[arg(long, value_delimiter = ',', default_values_t = [1, 2, 4, 8], value_parser = parse_workers)]
    workers: Vec<usize>,

    /// Repeats per cell
    #[arg(long, default_value_t = 3)]
    repeats: u32,

    /// Per-child timeout in seconds
    #[arg(long, default_value_t = 3600)]
    timeout: u64,
}

fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s.parse().map_err(|_| format!("{s:?} is not a number"))?;
    if ALLOWED_WORKERS.contains(&n) {
        Ok(n)
    } else {
        Err(format!("worker count must be one of {ALLOWED_WORKERS:?}"))
    }
}

impl RunArgs {
    fn into_options(self, concurrent: usize) -> StrategyOptions {
        StrategyOptions {
            start: self.start,
            end: self.end,
            output: self.out,
            workers: self.workers,
            concurrent,
            clean: self.clean,
            endpoint: EndpointConfig::default(),
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = run(App::parse()) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(app: App) -> moex_harvest::Result<()> {
    match app.cmd {
        Commands::Pool(args) => {
            let workers = args.workers;
            pool::run(&args.into_options(workers))?;
        }
        Commands::Ranks(args) => {
            let workers = args.workers;
            ranks::run(&args.into_options(workers))?;
        }
        Commands::Bounded(args) => {
            let concurrent = args.concurrent;
            bounded::run(&args.common.into_options(concurrent))?;
        }
        Commands::Bench(args) => {
            bench::run(&BenchOptions {
                start: args.start,
                end: args.end,
                workers: args.workers,
                repeats: args.repeats,
                timeout_secs: args.timeout,
            })?;
        }
    }
    Ok(())
}
