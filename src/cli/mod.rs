//! Command line front-end of faasbench
//!
//! ## Usage
//!
//! ```bash
//! # Run a Docker workload with 8 workers, writing rows to a timestamped file
//! faasbench --cf 8 --write-to-file execDockerFile containers.csv
//!
//! # Create users and functions, then invoke them asynchronously
//! faasbench --async execOWFile invocations.csv --create
//!
//! # Single command through the OpenWhisk wrapper
//! faasbench execOWCmd createUser alice
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod output;

pub use app::{Cli, Commands};
pub use config::Config;
pub use error::{CliError, Result};

/// Version information for the CLI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Directory holding the CLI configuration file
pub fn default_config_dir() -> std::path::PathBuf {
    directories::ProjectDirs::from("", "", "faasbench")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| std::path::PathBuf::from("."))
                .join(".faasbench")
        })
}
