//! Bounded-async strategy: cooperative fetch phase, parallel parse/merge phase
//!
//! Every date in the range is dispatched at once on a single-threaded-style
//! cooperative scheduler; a counting semaphore caps how many requests are in
//! flight so the remote endpoint and the local socket table are never
//! overwhelmed. The network phase needs no OS parallelism — tasks suspend at
//! the I/O boundary — so all raw payloads are collected first, then handed to
//! a parse/merge pool of blocking workers committing under the same store
//! lock discipline as the worker-pool model.

use crate::dates::DateKey;
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::parse::{OpenPositionsParser, ParseAdapter};
use crate::store::{self, MergeStore};
use crate::strategy::{print_report, CpuSampler, RunReport, StrategyOptions};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

/// Run the range with at most `opts.concurrent` in-flight requests, then
/// parse and merge on `opts.workers` blocking workers
///
/// # Errors
///
/// Fails on an invalid range, a store failure, or a task that could not be
/// joined. Per-date fetch and parse failures are dropped, not errors.
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
        concurrent = opts.concurrent,
        "bounded async dispatch"
    );

    let mut cpu = CpuSampler::new();
    let cpu_before = cpu.sample();
    let started = Instant::now();

    let runtime = tokio::runtime::Runtime::new()?;
    let committed_rows = runtime.block_on(harvest(opts, &dates))?;

    let report = RunReport {
        requested: dates.len(),
        committed_rows,
        elapsed: started.elapsed(),
    };
    print_report(&report, &opts.output, cpu_before, cpu.sample());
    Ok(report)
}

async fn harvest(opts: &StrategyOptions, dates: &[DateKey]) -> Result<usize> {
    let fetcher = Arc::new(Fetcher::new(opts.endpoint.clone())?);
    let gate = Arc::new(Semaphore::new(opts.concurrent.max(1)));

    // FETCH: every date dispatched up front, gated by the semaphore
    let mut fetches = Vec::with_capacity(dates.len());
    for &date in dates {
        let fetcher = Arc::clone(&fetcher);
        let gate = Arc::clone(&gate);
        fetches.push(tokio::spawn(async move {
            let Ok(_permit) = gate.acquire_owned().await else {
                return (date, None);
            };
            (date, fetcher.fetch(date).await)
        }));
    }

    let mut payloads = Vec::new();
    for joined in join_all(fetches).await {
        let (date, payload) = joined?;
        if let Some(raw) = payload {
            payloads.push((date, raw));
        }
    }

    // PARSE+MERGE: blocking pool sized to the worker count, shared store lock
    let store = MergeStore::new(&opts.output);
    let pool_gate = Arc::new(Semaphore::new(opts.workers.max(1)));
    let mut merges = Vec::with_capacity(payloads.len());
    for (date, raw) in payloads {
        let store = store.clone();
        let pool_gate = Arc::clone(&pool_gate);
        merges.push(tokio::spawn(async move {
            let Ok(_permit) = pool_gate.acquire_owned().await else {
                return Ok(0);
            };
            tokio::task::spawn_blocking(move || match OpenPositionsParser.parse(&raw) {
                Some(record) => store.commit(&record),
                None => {
                    tracing::debug!(date = %date, "parse miss, dropping date");
                    Ok(0)
                }
            })
            .await?
        }));
    }

    let mut committed_rows = 0;
    for joined in join_all(merges).await {
        committed_rows += joined??;
    }
    Ok(committed_rows)
}
