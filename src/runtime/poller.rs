//! Async activation poller
//!
//! Asynchronous invocations leave the worker pool as soon as the platform
//! accepts them. Their partially filled records are parked here, and one
//! background task keeps asking the platform for results until each one
//! finishes, releasing its barrier unit at that point.

use crate::core::{unix_nanos, CommandRecord, Outcome};
use crate::runtime::context::RunContext;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// An accepted asynchronous invocation waiting for its result
#[derive(Debug, Clone)]
pub struct PendingActivation {
    pub record: CommandRecord,
    /// Activation id returned by the platform
    pub handle: String,
    /// When the worker submitted the invocation
    pub submitted: Instant,
}

/// Activations still waiting for a result
#[derive(Debug, Clone, Default)]
pub struct PendingRegistry {
    inner: Arc<Mutex<Vec<PendingActivation>>>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, activation: PendingActivation) {
        self.inner.lock().push(activation);
    }

    /// Take every parked activation, leaving the registry empty
    pub fn take_all(&self) -> Vec<PendingActivation> {
        std::mem::take(&mut *self.inner.lock())
    }

    /// Put back activations that are still running
    pub fn restore(&self, activations: Vec<PendingActivation>) {
        if !activations.is_empty() {
            self.inner.lock().extend(activations);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// One pass over the parked activations. Returns how many were finalized.
pub async fn poll_once(ctx: &RunContext) -> usize {
    let mut parked = ctx.pending.take_all();
    let mut finalized = 0;

    // walk backwards so swap_remove never moves an unvisited entry
    for idx in (0..parked.len()).rev() {
        match ctx.driver.poll(&parked[idx]).await {
            Ok(Some(Outcome::Completed { status, result })) => {
                let activation = parked.swap_remove(idx);
                finalize(ctx, activation, status, result);
                finalized += 1;
            }
            Ok(Some(Outcome::Pending { .. })) | Ok(None) => {}
            Err(e) => {
                let activation = parked.swap_remove(idx);
                debug!("Polling {} failed", activation.handle);
                ctx.fail(e);
            }
        }
    }

    ctx.pending.restore(parked);
    finalized
}

fn finalize(
    ctx: &RunContext,
    activation: PendingActivation,
    status: Option<String>,
    result: String,
) {
    let PendingActivation {
        mut record,
        submitted,
        ..
    } = activation;
    record.elapsed_ms = submitted.elapsed().as_millis();
    record.ended_at_ns = unix_nanos();
    record.result = Some(result);
    if status.is_some() {
        record.status = status;
    }
    ctx.publish(record);
    ctx.barrier.done();
}

/// Background task running [`poll_once`] every poll interval
pub struct AsyncPoller {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl AsyncPoller {
    pub fn spawn(ctx: Arc<RunContext>) -> Self {
        let (shutdown, mut stop) = watch::channel(false);
        let interval = ctx.config.poll_interval;

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.changed() => break,
                    _ = tokio::time::sleep(interval) => {
                        let finalized = poll_once(&ctx).await;
                        if finalized > 0 {
                            debug!(
                                "Poller finalized {} activations, {} still pending",
                                finalized,
                                ctx.pending.len()
                            );
                        }
                    }
                }
            }
        });

        Self { shutdown, task }
    }

    /// Signal the task and wait for its current pass to end
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!("Async poller ended abnormally: {}", e);
        }
    }
}
