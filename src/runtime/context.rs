use crate::core::{CommandRecord, Error, RunConfig};
use crate::runtime::barrier::{CompletionBarrier, FatalSlot};
use crate::runtime::driver::Driver;
use crate::runtime::poller::PendingRegistry;
use crate::runtime::recorder::RecorderHandle;
use crate::runtime::tracker::RateTracker;
use std::sync::Arc;
use uuid::Uuid;

/// State shared by the scheduler, the workers and the async poller of one run
pub struct RunContext {
    pub run_id: Uuid,
    pub driver: Arc<dyn Driver>,
    pub config: Arc<RunConfig>,
    pub tracker: Arc<RateTracker>,
    pub barrier: CompletionBarrier,
    pub fatal: FatalSlot,
    pub pending: PendingRegistry,
    pub recorder: RecorderHandle,
}

impl RunContext {
    /// Count a finished execution, stamp the run-level columns and emit the row
    pub fn publish(&self, mut record: CommandRecord) {
        let snapshot = self.tracker.record_completion();
        record.since_start_ms = snapshot.since_start.as_millis();
        record.exec_rate = snapshot.rate;
        record.concurrency_factor = self.config.concurrency_factor;
        self.recorder.record(&record);
    }

    /// Store a fatal error and release the barrier unit of the failed command
    pub fn fail(&self, error: Error) {
        self.fatal.record(error);
        self.barrier.done();
    }
}
