//! Batch execution engine
//!
//! This module contains everything that runs while a benchmark is in
//! progress:
//!
//! - **Process execution**: [`CommandExecutor`] and its real implementation
//!   [`ShellExecutor`]
//! - **Decoding** of the OpenWhisk wrapper's answers
//! - **Scheduling**: [`BatchScheduler`] submitting to a [`WorkerPool`] with a
//!   [`CompletionBarrier`] between batches
//! - **Async polling** of accepted invocations
//! - **Recording** of result rows by a dedicated writer task
//!
//! [`BenchmarkRun`] wires them together for one workload and one [`Driver`].

pub mod barrier;
pub mod context;
pub mod decoder;
pub mod driver;
pub mod fanout;
pub mod network;
pub mod poller;
pub mod pool;
pub mod process;
pub mod recorder;
pub mod runner;
pub mod scheduler;
pub mod tracker;


pub use barrier::{CompletionBarrier, FatalSlot};
pub use context::RunContext;
pub use driver::Driver;
pub use fanout::FanOut;
pub use poller::{AsyncPoller, PendingActivation, PendingRegistry};
pub use pool::WorkerPool;
pub use process::{CommandExecutor, ShellExecutor};
pub use recorder::{RecorderHandle, ResultRecorder};
pub use runner::BenchmarkRun;
pub use scheduler::{BatchHook, BatchReport, BatchScheduler, RunSummary};
pub use tracker::RateTracker;
