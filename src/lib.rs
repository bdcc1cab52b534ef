//! # faasbench
//!
//! A benchmarking harness for serverless platforms and container runtimes.
//! It replays a workload file against OpenWhisk (through its wrapper script)
//! or Docker (through `docker container`), times every invocation and records
//! one CSV row per command.
//!
//! ## Features
//!
//! - **Batch scheduling**: workload entries run batch by batch in ascending
//!   order, with a barrier between batches
//! - **Worker pool**: a configurable number of concurrent workers
//!   (the *concurrency factor*) drain a bounded command queue
//! - **Lifecycle validation**: Docker commands are checked against a
//!   lifecycle graph loaded from YAML, per container
//! - **Async invocations**: OpenWhisk activations can be fired without waiting
//!   and collected by a background poller
//! - **Rate limiting** and a **run-forever** mode for soak tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use faasbench::core::{DriverKind, RunConfig, Workload};
//! use faasbench::drivers::{OpenWhiskDriver, Provisioning};
//! use faasbench::runtime::BenchmarkRun;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> faasbench::core::Result<()> {
//!     let workload = Workload::load(DriverKind::OpenWhisk, "invocations.csv").await?;
//!     let driver = OpenWhiskDriver::from_path("./openwhisk/ow-bench.sh", Provisioning::Lookup)?;
//!
//!     let config = RunConfig::builder()
//!         .concurrency_factor(24)
//!         .rate_limit(100.0)
//!         .build()?;
//!
//!     let summary = BenchmarkRun::new(Arc::new(driver), config)
//!         .execute(&workload)
//!         .await?;
//!     println!("{} executions in {:?}", summary.executions, summary.elapsed);
//!     Ok(())
//! }
//! ```
//!
//! ## Workload formats
//!
//! Docker: `seq,container,command[,parameter]`
//!
//! OpenWhisk: `time,user,function[,parameter],repeat`
//!
//! ## Feature Flags
//!
//! - `cli` (default): the `faasbench` binary, its file configuration and
//!   console output

pub mod core;
pub mod drivers;
pub mod runtime;

#[cfg(feature = "cli")]
pub mod cli;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::core::{Error, Result, RunConfig, Workload};
pub use crate::runtime::{BenchmarkRun, RunSummary};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
