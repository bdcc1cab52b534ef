use crate::core::Error;
use thiserror::Error;

/// Exit status for an unknown subcommand
pub const EXIT_UNKNOWN_COMMAND: i32 = 127;

/// Exit status for every fatal condition of a run
pub const EXIT_FAILURE: i32 = 1;

/// Error type for the faasbench command line
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Command not found: {0}")]
    UnknownCommand(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    Benchmark(#[from] Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UnknownCommand(_) => EXIT_UNKNOWN_COMMAND,
            _ => EXIT_FAILURE,
        }
    }

    /// Get user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            Self::UnknownCommand(cmd) => {
                format!("Command '{}' not found. Run 'faasbench --help' to see available commands.", cmd)
            }
            Self::Benchmark(Error::WorkloadParse { line, reason }) => format!(
                "Workload line {}: {}. Docker lines are 'seq,container,command[,parameter]', \
                 OpenWhisk lines are 'time,user,function[,parameter],repeat'.",
                line, reason
            ),
            Self::Benchmark(err @ Error::LifecycleViolation { .. }) => format!(
                "{}. Check the workload against the lifecycle graph (--lifecycle).",
                err
            ),
            Self::Benchmark(Error::BinaryNotFound(what)) => format!(
                "Executable not found: {}. Install it or point the config file at it.",
                what
            ),
            Self::Benchmark(err @ Error::RetriesExhausted { .. }) => format!(
                "{}. The platform may be overloaded; try a lower --cf.",
                err
            ),
            Self::Benchmark(Error::Timeout { command, secs }) => format!(
                "`{}` timed out after {} seconds. Try using --timeout flag with a larger value.",
                command, secs
            ),
            _ => self.to_string(),
        }
    }
}

/// Convenient result type for the command line
pub type Result<T> = std::result::Result<T, CliError>;
