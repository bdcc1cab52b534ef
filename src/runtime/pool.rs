//! Fixed-size worker pool draining the command queue

use crate::core::{unix_nanos, CommandRecord, Error, Outcome, Result, ScheduledCommand};
use crate::runtime::context::RunContext;
use crate::runtime::network::{self, NetworkCounters};
use crate::runtime::poller::PendingActivation;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn, Instrument};

/// Workers sharing one bounded queue
///
/// The queue holds as many commands as there are workers, so submission
/// blocks once every worker is busy and one command waits per worker.
pub struct WorkerPool {
    queue: mpsc::Sender<ScheduledCommand>,
    workers: Vec<JoinHandle<()>>,
}

enum Step {
    Finished(CommandRecord),
    Parked(PendingActivation),
}

impl WorkerPool {
    pub fn spawn(ctx: Arc<RunContext>) -> Self {
        let width = ctx.config.concurrency_factor.max(1);
        let (queue, rx) = mpsc::channel(width);
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..width)
            .map(|id| {
                let ctx = Arc::clone(&ctx);
                let rx = Arc::clone(&rx);
                tokio::spawn(worker_loop(id, ctx, rx))
            })
            .collect();

        Self { queue, workers }
    }

    pub fn width(&self) -> usize {
        self.workers.len()
    }

    /// Enqueue a command, waiting while the queue is full
    pub async fn submit(&self, cmd: ScheduledCommand) -> Result<()> {
        self.queue
            .send(cmd)
            .await
            .map_err(|_| Error::Aborted("worker pool is closed".to_string()))
    }

    /// Close the queue and wait for every worker to drain it
    pub async fn join(self) -> Result<()> {
        drop(self.queue);
        for worker in self.workers {
            worker.await?;
        }
        Ok(())
    }
}

async fn worker_loop(
    id: usize,
    ctx: Arc<RunContext>,
    rx: Arc<Mutex<mpsc::Receiver<ScheduledCommand>>>,
) {
    loop {
        let next = { rx.lock().await.recv().await };
        let Some(cmd) = next else {
            break;
        };
        let span = tracing::debug_span!("command", worker = id, seq = cmd.seq, batch = cmd.batch);
        handle(&ctx, cmd).instrument(span).await;
    }
    debug!("Worker {} exiting", id);
}

async fn handle(ctx: &RunContext, cmd: ScheduledCommand) {
    if let Some(ticket) = cmd.turn {
        ctx.tracker.wait_turn(&cmd.resource, ticket).await;
    }

    if ctx.fatal.is_tripped() {
        debug!("Skipping {} {} after fatal error", cmd.verb, cmd.resource);
        close_turn(ctx, &cmd, false);
        ctx.barrier.done();
        return;
    }

    match run_command(ctx, &cmd).await {
        Ok(Step::Finished(record)) => {
            close_turn(ctx, &cmd, true);
            ctx.publish(record);
            ctx.barrier.done();
        }
        Ok(Step::Parked(activation)) => {
            close_turn(ctx, &cmd, true);
            debug!("Parked activation {}", activation.handle);
            ctx.pending.push(activation);
        }
        Err(e) => {
            close_turn(ctx, &cmd, false);
            ctx.fail(e);
        }
    }
}

fn close_turn(ctx: &RunContext, cmd: &ScheduledCommand, succeeded: bool) {
    if cmd.turn.is_some() {
        let applied = succeeded.then_some(cmd.verb.as_str());
        ctx.tracker.finish_turn(&cmd.resource, applied);
    }
}

async fn run_command(ctx: &RunContext, cmd: &ScheduledCommand) -> Result<Step> {
    if let Some(graph) = ctx.driver.lifecycle() {
        ctx.tracker.authorize(&cmd.resource, &cmd.verb, graph)?;
    }

    let interface = ctx
        .config
        .network_interface
        .as_deref()
        .filter(|_| ctx.config.records_network_bytes());
    let before = match interface {
        Some(iface) => sample_counters(iface).await,
        None => None,
    };

    let mut record = CommandRecord::started(cmd, unix_nanos());
    let clock = Instant::now();
    let outcome = ctx.driver.execute(cmd, &ctx.config).await?;
    record.elapsed_ms = clock.elapsed().as_millis();
    record.ended_at_ns = unix_nanos();

    if let (Some(iface), Some(before)) = (interface, before) {
        if let Some(after) = sample_counters(iface).await {
            let delta = after.since(&before);
            record.bytes_received = Some(delta.received);
            record.bytes_transmitted = Some(delta.transmitted);
        }
    }

    Ok(match outcome {
        Outcome::Completed { status, result } => {
            record.status = status;
            record.result = Some(result);
            Step::Finished(record)
        }
        Outcome::Pending { status, handle } => {
            record.status = status;
            Step::Parked(PendingActivation {
                record,
                handle,
                submitted: clock,
            })
        }
    })
}

async fn sample_counters(interface: &str) -> Option<NetworkCounters> {
    match network::sample(interface).await {
        Ok(counters) => Some(counters),
        Err(e) => {
            warn!("Could not sample network counters: {}", e);
            None
        }
    }
}
