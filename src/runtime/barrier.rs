//! Synchronisation primitives for the batch engine

use crate::core::Error;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Counting completion barrier
///
/// The scheduler `add`s before submitting, every worker or poller that finishes
/// a unit calls `done`, and `wait` resolves once the count is back to zero.
#[derive(Debug, Clone)]
pub struct CompletionBarrier {
    outstanding: Arc<watch::Sender<usize>>,
}

impl Default for CompletionBarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionBarrier {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0usize);
        Self {
            outstanding: Arc::new(tx),
        }
    }

    pub fn add(&self, units: usize) {
        self.outstanding.send_modify(|n| *n += units);
    }

    /// Release one unit; extra releases saturate at zero
    pub fn done(&self) {
        self.outstanding.send_modify(|n| *n = n.saturating_sub(1));
    }

    pub fn outstanding(&self) -> usize {
        *self.outstanding.borrow()
    }

    /// Wait until every added unit has been released
    pub async fn wait(&self) {
        let mut rx = self.outstanding.subscribe();
        // the sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

/// Holds the first fatal error raised by a worker
///
/// Later errors are logged and dropped; the scheduler takes the stored error at
/// its next checkpoint. Once tripped the slot stays tripped, even after `take`,
/// so workers keep skipping whatever is still queued.
#[derive(Debug, Clone, Default)]
pub struct FatalSlot {
    slot: Arc<Mutex<Option<Error>>>,
    tripped: Arc<AtomicBool>,
}

impl FatalSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `error` unless an earlier one is already waiting
    pub fn record(&self, error: Error) {
        let mut slot = self.slot.lock();
        if !self.tripped.swap(true, Ordering::SeqCst) {
            tracing::error!("Fatal error recorded: {}", error);
            *slot = Some(error);
        } else {
            tracing::warn!("Additional fatal error ignored: {}", error);
        }
    }

    pub fn is_set(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Stop further work without recording an error
    pub fn trip(&self) {
        self.tripped.store(true, Ordering::SeqCst);
    }

    /// Whether any fatal error was ever recorded, or the slot was tripped
    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    /// Take the stored error, if any
    pub fn take(&self) -> Option<Error> {
        self.slot.lock().take()
    }

    /// `Err` with the stored error, leaving the slot empty
    pub fn check(&self) -> crate::core::Result<()> {
        match self.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_returns_immediately_when_empty() {
        let barrier = CompletionBarrier::new();
        tokio::time::timeout(Duration::from_millis(100), barrier.wait())
            .await
            .expect("empty barrier should not block");
    }

    #[tokio::test]
    async fn test_wait_blocks_until_all_done() {
        let barrier = CompletionBarrier::new();
        barrier.add(3);

        let workers: Vec<_> = (0..3)
            .map(|i| {
                let barrier = barrier.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(10 * (i + 1))).await;
                    barrier.done();
                })
            })
            .collect();

        assert_eq!(barrier.outstanding(), 3);
        tokio::time::timeout(Duration::from_secs(2), barrier.wait())
            .await
            .expect("barrier should release");
        assert_eq!(barrier.outstanding(), 0);
        for worker in workers {
            worker.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_wait_does_not_release_early() {
        let barrier = CompletionBarrier::new();
        barrier.add(2);
        barrier.done();
        let waited = tokio::time::timeout(Duration::from_millis(50), barrier.wait()).await;
        assert!(waited.is_err());
    }

    #[test]
    fn test_done_saturates() {
        let barrier = CompletionBarrier::new();
        barrier.done();
        assert_eq!(barrier.outstanding(), 0);
    }

    #[test]
    fn test_fatal_slot_keeps_first_error() {
        let slot = FatalSlot::new();
        assert!(slot.check().is_ok());

        slot.record(Error::Aborted("first".to_string()));
        slot.record(Error::Aborted("second".to_string()));
        assert!(slot.is_set());

        match slot.check() {
            Err(Error::Aborted(msg)) => assert_eq!(msg, "first"),
            other => panic!("Expected first error, got {other:?}"),
        }
        assert!(!slot.is_set());
        assert!(slot.is_tripped());

        // the slot never refills once tripped
        slot.record(Error::Aborted("third".to_string()));
        assert!(slot.check().is_ok());
    }
}
