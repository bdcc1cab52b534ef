//! Run orchestration
//!
//! Ties provisioning, the recorder, the worker pool, the poller and the
//! scheduler together, and guarantees teardown runs whatever the outcome.

use crate::core::{Result, RunConfig, Workload};
use crate::runtime::barrier::{CompletionBarrier, FatalSlot};
use crate::runtime::context::RunContext;
use crate::runtime::driver::Driver;
use crate::runtime::fanout::FanOut;
use crate::runtime::poller::{AsyncPoller, PendingRegistry};
use crate::runtime::pool::WorkerPool;
use crate::runtime::recorder::ResultRecorder;
use crate::runtime::scheduler::{BatchHook, BatchReport, BatchScheduler, RunSummary};
use crate::runtime::tracker::RateTracker;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// One benchmark run of a workload against a driver
///
/// # Example
///
/// ```rust,no_run
/// use faasbench::core::{DriverKind, RunConfig, Workload};
/// use faasbench::drivers::DockerDriver;
/// use faasbench::runtime::BenchmarkRun;
/// use std::sync::Arc;
///
/// # async fn example() -> faasbench::core::Result<()> {
/// let workload = Workload::load(DriverKind::Docker, "containers.csv").await?;
/// let driver = Arc::new(DockerDriver::from_path("docker", "graph.yaml")?);
/// let config = RunConfig::builder().concurrency_factor(4).build()?;
///
/// let summary = BenchmarkRun::new(driver, config).execute(&workload).await?;
/// println!("{} executions at {:.2}/s", summary.executions, summary.rate);
/// # Ok(())
/// # }
/// ```
pub struct BenchmarkRun {
    driver: Arc<dyn Driver>,
    config: RunConfig,
    hook: Option<BatchHook>,
}

impl BenchmarkRun {
    pub fn new(driver: Arc<dyn Driver>, config: RunConfig) -> Self {
        Self {
            driver,
            config,
            hook: None,
        }
    }

    /// Observe each batch as its barrier is released
    pub fn with_batch_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&BatchReport) + Send + Sync + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Execute the workload; teardown always runs and never masks the run's
    /// own error
    pub async fn execute(self, workload: &Workload) -> Result<RunSummary> {
        self.config.validate()?;
        self.driver.prepare(workload)?;

        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id, driver = %self.driver.kind());

        async move {
            info!(
                "Starting {} batches ({} executions) across {} workers",
                workload.batch_count(),
                workload.execution_count(),
                self.config.concurrency_factor
            );

            let tracker = Arc::new(RateTracker::new());
            let fan_out = FanOut::new(self.config.concurrency_factor);

            let outcome = self.drive(run_id, workload, &tracker, &fan_out).await;

            info!("Cleaning up resources created during the run");
            if let Err(e) = self.driver.teardown(&tracker, &fan_out).await {
                warn!("Cleanup failed: {}", e);
            }

            if let Ok(summary) = &outcome {
                debug!(
                    "Total time: {} ms, total executions: {}, execution rate: {:.2}",
                    summary.elapsed.as_millis(),
                    summary.executions,
                    summary.rate
                );
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        run_id: Uuid,
        workload: &Workload,
        tracker: &Arc<RateTracker>,
        fan_out: &FanOut,
    ) -> Result<RunSummary> {
        self.driver
            .provision(workload, &self.config, fan_out)
            .await?;

        let (recorder, handle) = ResultRecorder::start(
            &self.config.output,
            self.config.echo,
            self.driver.columns(),
            self.config.concurrency_factor,
        )
        .await?;

        let ctx = Arc::new(RunContext {
            run_id,
            driver: Arc::clone(&self.driver),
            config: Arc::new(self.config.clone()),
            tracker: Arc::clone(tracker),
            barrier: CompletionBarrier::new(),
            fatal: FatalSlot::new(),
            pending: PendingRegistry::new(),
            recorder: handle,
        });

        let pool = WorkerPool::spawn(Arc::clone(&ctx));
        debug!("Spawned {} workers", pool.width());
        let poller = self
            .config
            .async_invocations
            .then(|| AsyncPoller::spawn(Arc::clone(&ctx)));

        let scheduler = BatchScheduler::new(Arc::clone(&ctx), &pool, self.hook.clone());
        let result = tokio::select! {
            result = scheduler.run(workload) => result,
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, letting in-flight commands finish");
                ctx.fatal.trip();
                Ok(scheduler.summary(true))
            }
        };
        drop(scheduler);

        let joined = pool.join().await;
        if let Some(poller) = poller {
            poller.stop().await;
        }
        let abandoned = ctx.pending.len();
        if abandoned > 0 {
            warn!("{} asynchronous activations never finished", abandoned);
        }
        let written = recorder.finish().await;

        let summary = result?;
        joined?;
        let rows = written?;
        info!("Recorded {} rows", rows);

        // an error raised after the last checkpoint still fails the run
        match ctx.fatal.take() {
            Some(error) if !summary.interrupted => Err(error),
            _ => Ok(summary),
        }
    }
}
