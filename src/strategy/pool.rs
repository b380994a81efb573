//! Shared-queue worker pool strategy
//!
//! A fixed set of OS worker threads pulls date keys off one shared queue until
//! it runs dry, so a slow date never idles the rest of the pool. Every worker
//! owns its own HTTP client and parser; the only shared mutable state is the
//! queue and the store's file lock, which serializes the check-then-append of
//! every commit.

use crate::dates::DateKey;
use crate::error::{Error, Result};
use crate::fetch::BlockingFetcher;
use crate::parse::{OpenPositionsParser, ParseAdapter};
use crate::store::{self, MergeStore};
use crate::strategy::{print_report, CpuSampler, RunReport, StrategyOptions};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Run the full range through a pool of `opts.workers` threads
///
/// # Errors
///
/// Fails on an invalid range, a store failure, or a lost worker thread.
/// Per-date fetch and parse failures are dropped, not errors.
pub fn run(opts: &StrategyOptions) -> Result<RunReport> {
    let dates = opts.dates()?;
    if opts.clean {
        store::clean_outputs(opts.output_dir())?;
    }

    tracing::info!(
        start = %opts.start,
        end = %opts.end,
        days = dates.len(),
        workers = opts.workers,
        "worker pool dispatch"
    );

    let store = MergeStore::new(&opts.output);
    let queue: Arc<Mutex<VecDeque<DateKey>>> = Arc::new(Mutex::new(dates.iter().copied().collect()));

    let mut cpu = CpuSampler::new();
    let cpu_before = cpu.sample();
    let started = Instant::now();

    let mut handles = Vec::with_capacity(opts.workers);
    for worker in 0..opts.workers {
        let queue = Arc::clone(&queue);
        let store = store.clone();
        let endpoint = opts.endpoint.clone();
        let handle = std::thread::Builder::new()
            .name(format!("harvest-worker-{worker}"))
            .spawn(move || worker_loop(&queue, &store, endpoint))?;
        handles.push(handle);
    }

    let mut committed_rows = 0;
    for handle in handles {
        let written = handle
            .join()
            .map_err(|_| Error::WorkerLost("pool worker panicked".to_string()))??;
        committed_rows += written;
    }

    let report = RunReport {
        requested: dates.len(),
        committed_rows,
        elapsed: started.elapsed(),
    };
    print_report(&report, &opts.output, cpu_before, cpu.sample());
    Ok(report)
}

/// One worker: pull a date, fetch, parse, commit, repeat until the queue is
/// empty. Returns the rows this worker wrote.
fn worker_loop(
    queue: &Mutex<VecDeque<DateKey>>,
    store: &MergeStore,
    endpoint: crate::config::EndpointConfig,
) -> Result<usize> {
    let fetcher = BlockingFetcher::new(endpoint)?;
    let parser = OpenPositionsParser;
    let mut written = 0;

    loop {
        let date = {
            let mut queue = queue
                .lock()
                .map_err(|_| Error::WorkerLost("work queue poisoned".to_string()))?;
            queue.pop_front()
        };
        let Some(date) = date else {
            break;
        };

        let Some(raw) = fetcher.fetch(date) else {
            continue;
        };
        match parser.parse(&raw) {
            Some(record) => written += store.commit(&record)?,
            None => tracing::debug!(date = %date, "parse miss, dropping date"),
        }
    }
    Ok(written)
}
