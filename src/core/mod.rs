//! Data model and configuration shared by the runtime and the CLI
//!
//! This module has no knowledge of how commands are executed; it covers:
//! - the crate error type
//! - run configuration
//! - workload parsing
//! - the container lifecycle graph
//! - the records flowing between scheduler, workers and recorder

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod types;
pub mod workload;

pub use config::{OutputTarget, RunConfig, RunConfigBuilder};
pub use error::{Error, Result};
pub use lifecycle::{LifecycleGraph, LifecycleNode};
pub use types::{unix_nanos, Column, CommandRecord, DriverKind, Outcome, ScheduledCommand};
pub use workload::{Workload, WorkloadEntry};
