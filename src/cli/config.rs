use crate::cli::error::{CliError, Result};
use crate::core::config::{DEFAULT_CONCURRENCY_FACTOR, DEFAULT_POLL_INTERVAL};
use crate::drivers::openwhisk::DEFAULT_ACTION_FILE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration file of the faasbench CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Default number of workers
    #[serde(default = "default_concurrency_factor")]
    pub concurrency_factor: usize,

    /// Default rate limit; 0 disables throttling
    #[serde(default)]
    pub rate_limit: f64,

    /// Kill external commands running longer than this; 0 waits forever
    #[serde(default)]
    pub timeout_secs: u64,

    /// Docker driver settings
    #[serde(default)]
    pub docker: DockerDefaults,

    /// OpenWhisk driver settings
    #[serde(default)]
    pub openwhisk: OpenWhiskDefaults,

    /// Output settings
    #[serde(default)]
    pub output: OutputDefaults,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockerDefaults {
    /// Docker executable, looked up on `PATH` when not absolute
    #[serde(default = "default_docker_binary")]
    pub binary: String,

    /// Container lifecycle graph
    #[serde(default = "default_lifecycle")]
    pub lifecycle: PathBuf,

    /// Interface sampled for byte counters when running a single worker
    pub network_interface: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenWhiskDefaults {
    /// Wrapper script answering in `{"status", "output"}` JSON
    #[serde(default = "default_wrapper")]
    pub wrapper: String,

    /// Action deployed for every function with `--create`
    #[serde(default = "default_action_file")]
    pub action_file: PathBuf,

    /// Seconds between two polls of pending async activations
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDefaults {
    /// Directory output files are created in
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,

    /// Echo rows to stdout while writing them to a file
    #[serde(default = "default_true")]
    pub echo: bool,

    /// Colored console messages
    #[serde(default = "default_true")]
    pub color: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency_factor: default_concurrency_factor(),
            rate_limit: 0.0,
            timeout_secs: 0,
            docker: DockerDefaults::default(),
            openwhisk: OpenWhiskDefaults::default(),
            output: OutputDefaults::default(),
        }
    }
}

impl Default for DockerDefaults {
    fn default() -> Self {
        Self {
            binary: default_docker_binary(),
            lifecycle: default_lifecycle(),
            network_interface: None,
        }
    }
}

impl Default for OpenWhiskDefaults {
    fn default() -> Self {
        Self {
            wrapper: default_wrapper(),
            action_file: default_action_file(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl Default for OutputDefaults {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            echo: default_true(),
            color: default_true(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating it with defaults when missing
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            let config = Self::default();
            config.save_to_file(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            CliError::configuration(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| {
            CliError::configuration(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        crate::cli::default_config_dir().join("config.toml")
    }

    /// Load the file named on the command line, or the default one
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Self::load_from_file(Self::default_path()),
        }
    }

    /// Merge with command-line arguments, giving priority to CLI args
    pub fn merge_with_cli_args(mut self, cli_args: &crate::cli::app::Cli) -> Self {
        if let Some(cf) = cli_args.concurrency_factor {
            self.concurrency_factor = cf;
        }
        if let Some(limit) = cli_args.rate_limit {
            self.rate_limit = limit;
        }
        if let Some(timeout) = cli_args.timeout {
            self.timeout_secs = timeout;
        }
        if cli_args.verbose {
            self.output.echo = true;
        }
        if cli_args.quiet {
            self.output.echo = false;
        }

        self
    }
}

// Helper functions for default values
fn default_concurrency_factor() -> usize {
    DEFAULT_CONCURRENCY_FACTOR
}

fn default_docker_binary() -> String {
    "docker".to_string()
}

fn default_lifecycle() -> PathBuf {
    PathBuf::from("docker/docker-life-cycle.yaml")
}

fn default_wrapper() -> String {
    "./openwhisk/ow-bench.sh".to_string()
}

fn default_action_file() -> PathBuf {
    PathBuf::from(DEFAULT_ACTION_FILE)
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL.as_secs()
}

fn default_output_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}
