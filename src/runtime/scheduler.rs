//! Batch scheduler
//!
//! Batches run in ascending order with a barrier between them: every command
//! of batch `k` completes (or is finalized by the poller) before anything from
//! batch `k + 1` is submitted.

use crate::core::{Result, ScheduledCommand, Workload, WorkloadEntry};
use crate::runtime::context::RunContext;
use crate::runtime::pool::WorkerPool;
use crate::runtime::tracker::compute_rate;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

/// Emitted after each batch's barrier is released
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// 0-based pass over the workload (only grows in run-forever mode)
    pub pass: u64,
    pub batch: i64,
    pub executions: u64,
    pub elapsed: Duration,
}

/// Totals of a run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id: Uuid,
    /// Commands submitted to the pool
    pub executions: u64,
    pub elapsed: Duration,
    pub rate: f64,
    /// Batch barriers passed
    pub batches: u64,
    /// The run was stopped from outside before the workload was exhausted
    pub interrupted: bool,
}

/// Callback invoked with every [`BatchReport`]
pub type BatchHook = Arc<dyn Fn(&BatchReport) + Send + Sync>;

pub struct BatchScheduler<'a> {
    ctx: Arc<RunContext>,
    pool: &'a WorkerPool,
    hook: Option<BatchHook>,
    submitted: AtomicU64,
    batches: AtomicU64,
}

impl<'a> BatchScheduler<'a> {
    pub fn new(ctx: Arc<RunContext>, pool: &'a WorkerPool, hook: Option<BatchHook>) -> Self {
        Self {
            ctx,
            pool,
            hook,
            submitted: AtomicU64::new(0),
            batches: AtomicU64::new(0),
        }
    }

    /// Drive the workload to completion, or until the first fatal error
    pub async fn run(&self, workload: &Workload) -> Result<RunSummary> {
        self.ctx.tracker.mark_start();
        let mut pass = 0u64;

        loop {
            for (batch, entries) in workload.batches() {
                self.run_batch(pass, batch, entries).await?;
            }
            pass += 1;

            if !self.ctx.config.run_forever || workload.entry_count() == 0 {
                break;
            }
            debug!("Starting pass {} over the workload", pass);
        }

        Ok(self.summary(false))
    }

    async fn run_batch(&self, pass: u64, batch: i64, entries: &[WorkloadEntry]) -> Result<()> {
        let started = Instant::now();
        let mut executions = 0u64;

        for entry in entries {
            for _ in 0..entry.repeat {
                self.ctx.fatal.check()?;
                self.throttle().await;
                self.submit(batch, entry).await?;
                executions += 1;
            }
        }

        self.ctx.barrier.wait().await;
        self.ctx.fatal.check()?;

        let report = BatchReport {
            pass,
            batch,
            executions,
            elapsed: started.elapsed(),
        };
        self.batches.fetch_add(1, Ordering::SeqCst);
        debug!(
            "Batch #{} completed {} executions in {} ms",
            report.batch,
            report.executions,
            report.elapsed.as_millis()
        );
        if let Some(hook) = &self.hook {
            hook(&report);
        }
        Ok(())
    }

    async fn submit(&self, batch: i64, entry: &WorkloadEntry) -> Result<()> {
        let turn = self
            .ctx
            .driver
            .lifecycle()
            .map(|_| self.ctx.tracker.reserve_turn(&entry.resource));
        let cmd = ScheduledCommand {
            batch,
            seq: self.submitted.fetch_add(1, Ordering::SeqCst),
            resource: entry.resource.clone(),
            verb: entry.verb.clone(),
            parameter: entry.parameter.clone(),
            owner: entry.owner.clone(),
            turn,
        };

        self.ctx.barrier.add(1);
        if let Err(e) = self.pool.submit(cmd).await {
            self.ctx.barrier.done();
            return Err(e);
        }
        Ok(())
    }

    /// Pause once when the run is above its rate limit
    async fn throttle(&self) {
        let Some(limit) = self.ctx.config.rate_limit else {
            return;
        };
        let rate = self.ctx.tracker.current_rate();
        if rate > limit {
            debug!("Rate {:.2} above limit {:.2}, pausing", rate, limit);
            tokio::time::sleep(self.ctx.config.throttle_pause).await;
        }
    }

    /// Totals so far
    pub fn summary(&self, interrupted: bool) -> RunSummary {
        let executions = self.submitted.load(Ordering::SeqCst);
        let elapsed = self.ctx.tracker.since_start();
        RunSummary {
            run_id: self.ctx.run_id,
            executions,
            elapsed,
            rate: compute_rate(executions, elapsed),
            batches: self.batches.load(Ordering::SeqCst),
            interrupted,
        }
    }
}
