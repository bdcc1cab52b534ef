//! Bounded fan-out used by provisioning and cleanup

use crate::core::Result;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::warn;

/// Runs a closure over many items with at most `width` in flight
#[derive(Debug, Clone)]
pub struct FanOut {
    permits: Arc<Semaphore>,
    width: usize,
}

impl FanOut {
    pub fn new(width: usize) -> Self {
        let width = width.max(1);
        Self {
            permits: Arc::new(Semaphore::new(width)),
            width,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Run `task` for every item and collect the results in input order.
    /// Every task runs to completion; the first error in input order is returned.
    pub async fn run<I, T, F, Fut>(&self, items: I, task: F) -> Result<Vec<T>>
    where
        I: IntoIterator,
        F: Fn(I::Item) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let futures = items.into_iter().map(|item| {
            let permits = Arc::clone(&self.permits);
            let fut = task(item);
            async move {
                // the semaphore is never closed
                let _permit = permits.acquire_owned().await.ok();
                fut.await
            }
        });
        join_all(futures).await.into_iter().collect()
    }

    /// Like [`FanOut::run`] but logs failures instead of returning them.
    /// Returns the number of failed items.
    pub async fn run_quiet<I, F, Fut>(&self, what: &str, items: I, task: F) -> usize
    where
        I: IntoIterator,
        F: Fn(I::Item) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let futures = items.into_iter().map(|item| {
            let permits = Arc::clone(&self.permits);
            let fut = task(item);
            async move {
                let _permit = permits.acquire_owned().await.ok();
                fut.await
            }
        });
        let mut failures = 0;
        for result in join_all(futures).await {
            if let Err(e) = result {
                warn!("{} failed: {}", what, e);
                failures += 1;
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Error;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_width_bounds_concurrency() {
        let fan_out = FanOut::new(3);
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let results = fan_out
            .run(0..12u64, |i| {
                let in_flight = &in_flight;
                let peak = &peak;
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(i * 2)
                }
            })
            .await
            .unwrap();

        assert_eq!(results, (0..12u64).map(|i| i * 2).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_first_error_is_returned() {
        let fan_out = FanOut::new(2);
        let result = fan_out
            .run(["a", "b", "c"], |name| async move {
                if name == "a" {
                    Ok(())
                } else {
                    Err(Error::Aborted(name.to_string()))
                }
            })
            .await;
        match result {
            Err(Error::Aborted(name)) => assert_eq!(name, "b"),
            other => panic!("Expected first error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_quiet_counts_failures() {
        let fan_out = FanOut::new(0);
        assert_eq!(fan_out.width(), 1);
        let failures = fan_out
            .run_quiet("cleanup", 0..5, |i| async move {
                if i % 2 == 0 {
                    Err(Error::Aborted(format!("item {i}")))
                } else {
                    Ok(())
                }
            })
            .await;
        assert_eq!(failures, 3);
    }

    proptest! {
        #[test]
        fn prop_results_keep_input_order(
            width in 0usize..8,
            items in prop::collection::vec(any::<i32>(), 0..40),
        ) {
            let fan_out = FanOut::new(width);
            let results = tokio_test::block_on(async {
                fan_out.run(items.clone(), |i| async move { Ok(i) }).await
            })
            .unwrap();
            prop_assert_eq!(results, items);
        }
    }
}
