//! Test doubles for the external tools
//!
//! [`ScriptedExecutor`] stands in for the docker CLI and the OpenWhisk wrapper:
//! it answers through a closure, records every argument list it receives and
//! can simulate slow commands.

use crate::core::{Error, Result};
use crate::runtime::process::CommandExecutor;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

type Handler = Box<dyn Fn(&[String]) -> Result<String> + Send + Sync>;

/// Scripted replacement for a real process
pub struct ScriptedExecutor {
    handler: Handler,
    calls: Mutex<Vec<Vec<String>>>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedExecutor {
    /// Answer every call with `handler`
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&[String]) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Answer every call with the same output
    pub fn with_output(output: &str) -> Self {
        let output = output.to_string();
        Self::new(move |_| Ok(output.clone()))
    }

    /// Answer calls in order; calls past the end of the script fail
    pub fn sequence(answers: Vec<Result<String>>) -> Self {
        let answers = Mutex::new(VecDeque::from(answers));
        Self::new(move |args| {
            answers.lock().pop_front().unwrap_or_else(|| {
                Err(Error::Aborted(format!("unscripted call: {}", args.join(" "))))
            })
        })
    }

    /// Sleep this long inside every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every argument list received so far, in call order
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Highest number of calls that were running at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn run(&self, args: &[String]) -> Result<String> {
        self.calls.lock().push(args.to_vec());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let answer = (self.handler)(args);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        answer
    }
}
