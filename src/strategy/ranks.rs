//! Rank-group strategy: independent peers, one gather, a single writer
//!
//! A fixed group of peer ranks shares no mutable state. Each rank derives its
//! slice of the range deterministically from `(rank, group size)` — the keys
//! at positions `rank, rank + size, rank + 2*size, …` — so dispatch needs no
//! coordination at all. Ranks fetch and parse locally, then ship their
//! results through one gather channel to rank 0, which alone commits to the
//! store. With a single writer there is no lock contention; the coordinator
//! dedups overlapping trade dates (a weekend key and the following Monday can
//! resolve to the same Friday on different ranks) with the store's own
//! already-present check.
//!
//! The calling thread acts as rank 0; ranks `1..size` run on spawned threads.
//! When `--clean` is set, rank 0 sweeps old outputs and every rank passes a
//! barrier before dispatch, so no peer can start writing a file another peer
//! is about to delete.

use crate::dates::DateKey;
use crate::error::{Error, Result};
use crate::fetch::BlockingFetcher;
use crate::parse::{OpenPositionsParser, ParseAdapter, ParsedRecord};
use crate::store::{self, MergeStore};
use crate::strategy::{print_report, CpuSampler, RunReport, StrategyOptions};
use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::time::Instant;

/// Run the range across `opts.workers` ranks and merge on rank 0
///
/// # Errors
///
/// Fails on an invalid range, a store failure, or a peer rank that panicked
/// or died before delivering its gather message.
pub fn run(opts: &StrategyOptions) -> Result<RunReport> {
    let dates = opts.dates()?;
    let size = opts.workers.max(1);

    tracing::info!(
        start = %opts.start,
        end = %opts.end,
        days = dates.len(),
        ranks = size,
        "rank group dispatch"
    );

    let barrier = Arc::new(Barrier::new(size));
    let (tx, rx) = mpsc::channel::<Result<Vec<ParsedRecord>>>();

    let mut handles = Vec::with_capacity(size - 1);
    for rank in 1..size {
        let dates = dates.clone();
        let endpoint = opts.endpoint.clone();
        let barrier = Arc::clone(&barrier);
        let clean = opts.clean;
        let tx = tx.clone();
        let handle = std::thread::Builder::new()
            .name(format!("harvest-rank-{rank}"))
            .spawn(move || {
                if clean {
                    // wait out rank 0's cleanup
                    barrier.wait();
                }
                let _ = tx.send(rank_fetch(rank, size, &dates, endpoint));
            })?;
        handles.push(handle);
    }
    drop(tx);

    // rank 0: cleanup, then release the group
    if opts.clean {
        store::clean_outputs(opts.output_dir())?;
        barrier.wait();
    }

    let mut cpu = CpuSampler::new();
    let cpu_before = cpu.sample();
    let started = Instant::now();

    let local = rank_fetch(0, size, &dates, opts.endpoint.clone())?;

    // collective gather: one message per peer rank
    let mut gathered: Vec<Vec<ParsedRecord>> = vec![local];
    for _ in 1..size {
        let records = rx
            .recv()
            .map_err(|_| Error::WorkerLost("peer rank died before gather".to_string()))??;
        gathered.push(records);
    }
    for handle in handles {
        handle
            .join()
            .map_err(|_| Error::WorkerLost("peer rank panicked".to_string()))?;
    }

    // single writer: rank 0 commits serially; commit's already-present check
    // dedups trade dates that multiple ranks resolved independently
    let store = MergeStore::new(&opts.output);
    let mut committed_rows = 0;
    for records in gathered {
        for record in records {
            committed_rows += store.commit(&record)?;
        }
    }

    let report = RunReport {
        requested: dates.len(),
        committed_rows,
        elapsed: started.elapsed(),
    };
    print_report(&report, &opts.output, cpu_before, cpu.sample());
    Ok(report)
}

/// Fetch and parse this rank's round-robin slice of the range
fn rank_fetch(
    rank: usize,
    size: usize,
    dates: &[DateKey],
    endpoint: crate::config::EndpointConfig,
) -> Result<Vec<ParsedRecord>> {
    let fetcher = BlockingFetcher::new(endpoint)?;
    let parser = OpenPositionsParser;
    let mut results = Vec::new();

    for &date in dates.iter().skip(rank).step_by(size) {
        let Some(raw) = fetcher.fetch(date) else {
            continue;
        };
        match parser.parse(&raw) {
            Some(record) => results.push(record),
            None => tracing::debug!(date = %date, rank, "parse miss, dropping date"),
        }
    }
    tracing::debug!(rank, resolved = results.len(), "rank slice complete");
    Ok(results)
}
