//! # moex-harvest
//!
//! Concurrent per-day harvester for the MOEX derivatives open-positions
//! dataset, built to compare three concurrency strategies on the same
//! workload.
//!
//! One unit of work is one calendar date: a single HTTP POST, a parse of the
//! response table into `(trade_date, rows)`, and one idempotent commit into a
//! shared date-keyed CSV store. Three strategies drive that unit over a full
//! date range:
//!
//! - **pool** — OS worker threads pulling dates from a shared queue
//! - **ranks** — isolated peer ranks with one gather to a single-writer
//!   coordinator
//! - **bounded** — semaphore-capped async fetching plus a parallel
//!   parse/merge pool
//!
//! All three converge on identical store contents: the store's advisory file
//! lock makes the check-then-append of every commit atomic, so a trade date
//! is written at most once per run no matter which requested dates resolve to
//! it or how many workers race.
//!
//! ## Quick Start
//!
//! ```no_run
//! use moex_harvest::strategy::{pool, StrategyOptions};
//! use moex_harvest::{DateKey, EndpointConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let opts = StrategyOptions {
//!         start: DateKey::parse("20250408")?,
//!         end: DateKey::parse("20250501")?,
//!         output: "output_MIX.csv".into(),
//!         workers: 4,
//!         concurrent: 8,
//!         clean: false,
//!         endpoint: EndpointConfig::default(),
//!     };
//!     let report = pool::run(&opts)?;
//!     println!("{} rows in {:?}", report.committed_rows, report.elapsed);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Benchmark sweep driver
pub mod bench;
/// Endpoint configuration
pub mod config;
/// Date keys and range generation
pub mod dates;
/// Error types
pub mod error;
/// HTTP fetch unit
pub mod fetch;
/// Response parsing boundary
pub mod parse;
/// Date-keyed merge store
pub mod store;
/// Concurrency strategies
pub mod strategy;

// Re-export commonly used types
pub use config::EndpointConfig;
pub use dates::{DateKey, DateRange};
pub use error::{Error, Result, StoreError};
pub use fetch::{BlockingFetcher, Fetcher};
pub use parse::{OpenPositionsParser, ParseAdapter, ParsedRecord};
pub use store::{clean_outputs, MergeStore};
pub use strategy::{RunReport, StrategyOptions};
