//! Concurrency strategies driving the harvest pipeline
//!
//! Three interchangeable execution models run the same logical phases —
//! INIT → DISPATCH → FETCH → PARSE+MERGE → REPORT — and must converge on the
//! same store contents:
//!
//! - [`pool`] — fixed set of OS worker threads pulling date keys from a shared
//!   queue; commits serialized by the store lock.
//! - [`ranks`] — fixed peer group with no shared mutable state; each rank owns
//!   a deterministic round-robin slice and ships results through one gather to
//!   the coordinator, the only writer.
//! - [`bounded`] — every fetch issued on one cooperative scheduler under a
//!   semaphore cap, then a parallel parse/merge pool with the same lock
//!   discipline as [`pool`].
//!
//! A fetch that fails is dropped for the run; the report's throughput is
//! computed over the *requested* range regardless of how many dates actually
//! landed.

use crate::config::EndpointConfig;
use crate::dates::{DateKey, DateRange};
use crate::error::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sysinfo::System;

pub mod bounded;
pub mod pool;
pub mod ranks;

/// Options shared by every strategy run
#[derive(Debug, Clone)]
pub struct StrategyOptions {
    /// Inclusive range start
    pub start: DateKey,
    /// Inclusive range end
    pub end: DateKey,
    /// Store file the run commits into
    pub output: PathBuf,
    /// Worker count (pool/rank size, parse-pool size for the async model)
    pub workers: usize,
    /// In-flight request cap for the bounded-async model
    pub concurrent: usize,
    /// Delete `*.csv` files next to the output before the run
    pub clean: bool,
    /// Remote endpoint settings
    pub endpoint: EndpointConfig,
}

impl StrategyOptions {
    /// Materialize the requested date keys, validating the range first
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidRange`] before any network activity if
    /// `start > end`.
    pub fn dates(&self) -> Result<Vec<DateKey>> {
        Ok(DateRange::new(self.start, self.end)?.collect())
    }

    /// Directory the `--clean` flag sweeps: wherever the output file lives
    pub fn output_dir(&self) -> &Path {
        match self.output.parent() {
            Some(parent) if parent != Path::new("") => parent,
            _ => Path::new("."),
        }
    }
}

/// Outcome of one strategy run
#[derive(Debug, Clone, Copy)]
pub struct RunReport {
    /// Number of dates in the requested range
    pub requested: usize,
    /// Rows actually written across all commits
    pub committed_rows: usize,
    /// Wall-clock time of the FETCH through MERGE phases
    pub elapsed: Duration,
}

impl RunReport {
    /// Requested dates per second, over the full requested range
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.requested as f64 / secs
        } else {
            0.0
        }
    }
}

/// Global CPU usage sampler for the before/after report lines
///
/// The first reading after construction is meaningless (there is no prior
/// measurement window), matching the usual two-sample discipline.
pub struct CpuSampler {
    sys: System,
}

impl CpuSampler {
    /// Create a sampler and take the priming measurement
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        Self { sys }
    }

    /// Current global CPU usage in percent
    pub fn sample(&mut self) -> f32 {
        self.sys.refresh_cpu_usage();
        self.sys.global_cpu_usage()
    }
}

impl Default for CpuSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Render the textual report the benchmark driver scrapes
///
/// The `Time elapsed:` and `Average throughput:` markers are a contract: the
/// driver finds them by scanning output lines, so their wording and units are
/// fixed.
pub fn render_report(report: &RunReport, output: &Path, cpu_before: f32, cpu_after: f32) -> String {
    format!(
        "\n==== Results ====\n\
         Time elapsed: {:.2} sec\n\
         Average throughput: {:.2} days/sec\n\
         CPU usage (before): {cpu_before:.1}%, CPU usage (after): {cpu_after:.1}%\n\
         Result file: {}",
        report.elapsed.as_secs_f64(),
        report.throughput(),
        output.display()
    )
}

/// Print the report to stdout; the coordinator context calls this once per run
pub fn print_report(report: &RunReport, output: &Path, cpu_before: f32, cpu_after: f32) {
    println!("{}", render_report(report, output, cpu_before, cpu_after));
}
