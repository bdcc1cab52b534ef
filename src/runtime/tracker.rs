//! Execution counters and per-resource state
//!
//! A single mutex guards the execution count, the derived rate and every
//! resource's lifecycle state. Workloads driven by this tool are small enough
//! that one lock per run is not a bottleneck, and it keeps the lifecycle check
//! and the state update trivially consistent with each other.

use crate::core::{Error, LifecycleGraph, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// Executions per second for a given count and elapsed time
pub fn compute_rate(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}

/// Values observed when one execution was counted
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionSnapshot {
    pub executions: u64,
    pub rate: f64,
    pub since_start: Duration,
}

#[derive(Debug, Default, Clone)]
struct ResourceState {
    /// `None` means the resource is in the removed state
    last_command: Option<String>,
    issued: u64,
    finished: u64,
}

#[derive(Debug, Default)]
struct Counters {
    executions: u64,
    rate: f64,
    resources: HashMap<String, ResourceState>,
}

/// Thread-safe run statistics
#[derive(Debug)]
pub struct RateTracker {
    started: Mutex<Instant>,
    inner: Mutex<Counters>,
    turn_finished: Notify,
}

impl Default for RateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RateTracker {
    pub fn new() -> Self {
        Self {
            started: Mutex::new(Instant::now()),
            inner: Mutex::new(Counters::default()),
            turn_finished: Notify::new(),
        }
    }

    /// Reset the clock the rate is measured against
    pub fn mark_start(&self) {
        *self.started.lock() = Instant::now();
    }

    pub fn since_start(&self) -> Duration {
        self.started.lock().elapsed()
    }

    /// Count one execution and recompute the rate
    pub fn record_completion(&self) -> CompletionSnapshot {
        let since_start = self.since_start();
        let mut inner = self.inner.lock();
        inner.executions += 1;
        inner.rate = compute_rate(inner.executions, since_start);
        CompletionSnapshot {
            executions: inner.executions,
            rate: inner.rate,
            since_start,
        }
    }

    /// Rate as of the last completion
    pub fn current_rate(&self) -> f64 {
        self.inner.lock().rate
    }

    pub fn executions(&self) -> u64 {
        self.inner.lock().executions
    }

    /// Last command applied to a resource; `None` for removed/never seen
    pub fn last_command(&self, resource: &str) -> Option<String> {
        self.inner
            .lock()
            .resources
            .get(resource)
            .and_then(|state| state.last_command.clone())
    }

    /// Check `command` against the resource's last command under the lock
    pub fn authorize(&self, resource: &str, command: &str, graph: &LifecycleGraph) -> Result<()> {
        let inner = self.inner.lock();
        let previous = inner
            .resources
            .get(resource)
            .and_then(|state| state.last_command.as_deref());

        if graph.allowed(previous, command) {
            Ok(())
        } else {
            Err(Error::LifecycleViolation {
                resource: resource.to_string(),
                command: command.to_string(),
                previous: previous.unwrap_or(graph.initial_state()).to_string(),
            })
        }
    }

    /// Hand out the next dispatch ticket for a resource
    pub fn reserve_turn(&self, resource: &str) -> u64 {
        let mut inner = self.inner.lock();
        let state = inner.resources.entry(resource.to_string()).or_default();
        let ticket = state.issued;
        state.issued += 1;
        ticket
    }

    fn is_turn(&self, resource: &str, ticket: u64) -> bool {
        self.inner
            .lock()
            .resources
            .get(resource)
            .map(|state| state.finished >= ticket)
            .unwrap_or(ticket == 0)
    }

    /// Wait until every earlier ticket of the resource has finished
    pub async fn wait_turn(&self, resource: &str, ticket: u64) {
        loop {
            let notified = self.turn_finished.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_turn(resource, ticket) {
                return;
            }
            notified.await;
        }
    }

    /// Close a resource's current turn, recording `applied` as its new state
    /// when the command succeeded
    pub fn finish_turn(&self, resource: &str, applied: Option<&str>) {
        {
            let mut inner = self.inner.lock();
            let state = inner.resources.entry(resource.to_string()).or_default();
            if let Some(command) = applied {
                state.last_command = Some(command.to_string());
            }
            state.finished += 1;
        }
        self.turn_finished.notify_waiters();
    }

    /// Record a resource's state outside of the turn protocol
    pub fn set_state(&self, resource: &str, command: &str) {
        let mut inner = self.inner.lock();
        inner
            .resources
            .entry(resource.to_string())
            .or_default()
            .last_command = Some(command.to_string());
    }

    /// Resources whose last command is not `removed`, with that command
    pub fn live_resources(&self, removed: &str) -> Vec<(String, String)> {
        let inner = self.inner.lock();
        let mut live: Vec<(String, String)> = inner
            .resources
            .iter()
            .filter_map(|(name, state)| match state.last_command.as_deref() {
                Some(last) if last != removed => Some((name.clone(), last.to_string())),
                _ => None,
            })
            .collect();
        live.sort();
        live
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn graph() -> LifecycleGraph {
        LifecycleGraph::from_yaml_str(
            "rm: {id: 0, followers: [create]}\ncreate: {id: 1, followers: [start]}\nstart: {id: 2, followers: [rm]}\n",
        )
        .unwrap()
    }

    #[test]
    fn test_rate_is_count_over_elapsed() {
        assert_eq!(compute_rate(10, Duration::from_secs(2)), 5.0);
        assert_eq!(compute_rate(0, Duration::from_secs(2)), 0.0);
        assert_eq!(compute_rate(10, Duration::ZERO), 0.0);
    }

    #[test]
    fn test_record_completion_counts() {
        let tracker = RateTracker::new();
        let first = tracker.record_completion();
        let second = tracker.record_completion();
        assert_eq!(first.executions, 1);
        assert_eq!(second.executions, 2);
        assert_eq!(tracker.executions(), 2);
        assert_eq!(tracker.current_rate(), second.rate);
    }

    #[test]
    fn test_authorize_uses_removed_default() {
        let tracker = RateTracker::new();
        let graph = graph();
        assert!(tracker.authorize("contA", "create", &graph).is_ok());

        match tracker.authorize("contA", "start", &graph) {
            Err(Error::LifecycleViolation {
                resource,
                command,
                previous,
            }) => {
                assert_eq!(resource, "contA");
                assert_eq!(command, "start");
                assert_eq!(previous, "rm");
            }
            other => panic!("Expected LifecycleViolation, got {other:?}"),
        }

        tracker.set_state("contA", "create");
        assert!(tracker.authorize("contA", "start", &graph).is_ok());
        assert!(tracker.authorize("contA", "create", &graph).is_err());
    }

    #[test]
    fn test_live_resources_skip_removed() {
        let tracker = RateTracker::new();
        tracker.set_state("b", "start");
        tracker.set_state("a", "create");
        tracker.set_state("c", "rm");
        tracker.reserve_turn("d");
        assert_eq!(
            tracker.live_resources("rm"),
            vec![
                ("a".to_string(), "create".to_string()),
                ("b".to_string(), "start".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_turns_are_taken_in_ticket_order() {
        let tracker = Arc::new(RateTracker::new());
        let first = tracker.reserve_turn("contA");
        let second = tracker.reserve_turn("contA");
        assert_eq!((first, second), (0, 1));

        let waiter = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move {
                tracker.wait_turn("contA", second).await;
                tracker.last_command("contA")
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        tracker.wait_turn("contA", first).await;
        tracker.finish_turn("contA", Some("create"));

        let seen = waiter.await.unwrap();
        assert_eq!(seen.as_deref(), Some("create"));
    }

    #[test]
    fn test_failed_turn_keeps_state() {
        let tracker = RateTracker::new();
        tracker.reserve_turn("contA");
        tracker.finish_turn("contA", None);
        assert_eq!(tracker.last_command("contA"), None);
    }

    proptest! {
        #[test]
        fn prop_rate_is_idempotent(count in 0u64..1_000_000, millis in 1u64..10_000_000) {
            let elapsed = Duration::from_millis(millis);
            prop_assert_eq!(compute_rate(count, elapsed), compute_rate(count, elapsed));
            let expected = count as f64 / elapsed.as_secs_f64();
            prop_assert!((compute_rate(count, elapsed) - expected).abs() < 1e-9);
        }
    }
}
