use crate::core::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Default number of concurrent workers
pub const DEFAULT_CONCURRENCY_FACTOR: usize = 24;

/// Interval between two passes of the async poller
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Pause applied before a submission while the run is over its rate limit
pub const DEFAULT_THROTTLE_PAUSE: Duration = Duration::from_millis(500);

/// Total attempts for user creation/lookup while the platform keeps timing out
pub const DEFAULT_USER_ATTEMPTS: u32 = 10;

/// Total attempts for function creation while the platform keeps timing out
pub const DEFAULT_FUNCTION_ATTEMPTS: u32 = 5;

/// Where result rows go
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputTarget {
    /// Rows are printed on standard output
    #[default]
    Stdout,
    /// Rows are appended to a file opened once per run
    File(PathBuf),
}

/// Settings for one benchmark run
///
/// Build it through [`RunConfig::builder`], which validates the values:
///
/// ```rust
/// use faasbench::core::RunConfig;
///
/// let config = RunConfig::builder()
///     .concurrency_factor(8)
///     .rate_limit(50.0)
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency_factor, 8);
/// ```
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Number of workers draining the command queue
    pub concurrency_factor: usize,
    /// Executions per second above which submission is paused
    pub rate_limit: Option<f64>,
    /// Invoke asynchronously and poll for completion later
    pub async_invocations: bool,
    /// Repeat the whole batch sequence until the process is stopped
    pub run_forever: bool,
    /// Async poller tick
    pub poll_interval: Duration,
    /// Fixed sleep applied by the throttle
    pub throttle_pause: Duration,
    /// Attempts for user provisioning calls that time out
    pub user_attempts: u32,
    /// Attempts for function provisioning calls that time out
    pub function_attempts: u32,
    /// Result sink
    pub output: OutputTarget,
    /// Echo rows to stdout in addition to a file sink
    pub echo: bool,
    /// Interface whose byte counters are sampled around each command
    pub network_interface: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency_factor: DEFAULT_CONCURRENCY_FACTOR,
            rate_limit: None,
            async_invocations: false,
            run_forever: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            throttle_pause: DEFAULT_THROTTLE_PAUSE,
            user_attempts: DEFAULT_USER_ATTEMPTS,
            function_attempts: DEFAULT_FUNCTION_ATTEMPTS,
            output: OutputTarget::Stdout,
            echo: false,
            network_interface: None,
        }
    }
}

impl RunConfig {
    /// Create a builder starting from the defaults
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder::default()
    }

    /// Network byte columns are only meaningful with a single worker
    pub fn records_network_bytes(&self) -> bool {
        self.concurrency_factor == 1
    }

    /// Check the invariants the engine relies on
    pub fn validate(&self) -> Result<()> {
        if self.concurrency_factor == 0 {
            return Err(Error::configuration(
                "concurrency factor must be at least 1",
            ));
        }
        if let Some(limit) = self.rate_limit {
            if !limit.is_finite() || limit <= 0.0 {
                return Err(Error::configuration(format!(
                    "rate limit must be a positive number, got {limit}"
                )));
            }
        }
        if self.poll_interval.is_zero() {
            return Err(Error::configuration("poll interval must be non-zero"));
        }
        if self.user_attempts == 0 || self.function_attempts == 0 {
            return Err(Error::configuration(
                "provisioning attempts must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Fluent builder for [`RunConfig`]
#[derive(Debug, Default)]
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    pub fn concurrency_factor(mut self, workers: usize) -> Self {
        self.config.concurrency_factor = workers;
        self
    }

    /// A zero limit means "no limit", matching the CLI default
    pub fn rate_limit(mut self, limit: f64) -> Self {
        self.config.rate_limit = if limit == 0.0 { None } else { Some(limit) };
        self
    }

    pub fn async_invocations(mut self, enabled: bool) -> Self {
        self.config.async_invocations = enabled;
        self
    }

    pub fn run_forever(mut self, enabled: bool) -> Self {
        self.config.run_forever = enabled;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn throttle_pause(mut self, pause: Duration) -> Self {
        self.config.throttle_pause = pause;
        self
    }

    pub fn user_attempts(mut self, attempts: u32) -> Self {
        self.config.user_attempts = attempts;
        self
    }

    pub fn function_attempts(mut self, attempts: u32) -> Self {
        self.config.function_attempts = attempts;
        self
    }

    pub fn output(mut self, output: OutputTarget) -> Self {
        self.config.output = output;
        self
    }

    pub fn echo(mut self, echo: bool) -> Self {
        self.config.echo = echo;
        self
    }

    pub fn network_interface(mut self, interface: impl Into<String>) -> Self {
        self.config.network_interface = Some(interface.into());
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> Result<RunConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
