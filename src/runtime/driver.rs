//! The capability a platform plugs into the batch engine
//!
//! The scheduler, worker pool and poller are generic over [`Driver`]; the
//! Docker and OpenWhisk variants live in `crate::drivers`.

use crate::core::{
    Column, DriverKind, LifecycleGraph, Outcome, Result, RunConfig, ScheduledCommand, Workload,
};
use crate::runtime::fanout::FanOut;
use crate::runtime::poller::PendingActivation;
use crate::runtime::tracker::RateTracker;
use async_trait::async_trait;

/// A platform the engine can drive
#[async_trait]
pub trait Driver: Send + Sync {
    fn kind(&self) -> DriverKind;

    /// CSV projection, in output order
    fn columns(&self) -> &'static [Column];

    /// Graph commands are validated against, if this platform has lifecycles
    fn lifecycle(&self) -> Option<&LifecycleGraph> {
        None
    }

    /// Reject a workload before anything is provisioned or scheduled
    fn prepare(&self, workload: &Workload) -> Result<()> {
        if let Some(graph) = self.lifecycle() {
            graph.check_workload(workload)?;
        }
        Ok(())
    }

    /// Create or look up whatever the workload needs before the first batch
    async fn provision(
        &self,
        _workload: &Workload,
        _config: &RunConfig,
        _fan_out: &FanOut,
    ) -> Result<()> {
        Ok(())
    }

    /// Run one command and report what happened
    async fn execute(&self, cmd: &ScheduledCommand, config: &RunConfig) -> Result<Outcome>;

    /// Check on an asynchronous invocation; `Ok(None)` while it is still running
    async fn poll(&self, _pending: &PendingActivation) -> Result<Option<Outcome>> {
        Ok(None)
    }

    /// Release resources left behind by the run
    async fn teardown(&self, _tracker: &RateTracker, _fan_out: &FanOut) -> Result<()> {
        Ok(())
    }
}
