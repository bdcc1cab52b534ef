use thiserror::Error;

/// Error type shared by the workload parser, the drivers and the batch engine
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid workload line {line}: {reason}")]
    WorkloadParse { line: usize, reason: String },

    #[error("Invalid lifecycle graph: {0}")]
    LifecycleGraph(String),

    #[error(
        "Lifecycle violation: cannot run '{command}' on '{resource}' as its previous command is '{previous}'"
    )]
    LifecycleViolation {
        resource: String,
        command: String,
        previous: String,
    },

    #[error("Command `{command}` failed ({status}): {output}")]
    CommandFailed {
        command: String,
        status: String,
        output: String,
    },

    #[error("Error during execution of `{command}`: {output}")]
    ExecutionReported { command: String, output: String },

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("`{command}` still timing out after {attempts} attempts: {output}")]
    RetriesExhausted {
        command: String,
        attempts: u32,
        output: String,
    },

    #[error("Executable not found: {0}")]
    BinaryNotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Command `{command}` timed out after {secs} seconds")]
    Timeout { command: String, secs: u64 },

    #[error("Run aborted: {0}")]
    Aborted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Async task error: {0}")]
    AsyncTask(#[from] tokio::task::JoinError),
}

impl Error {
    /// Create a workload parse error for a 1-based line number
    pub fn workload<S: Into<String>>(line: usize, reason: S) -> Self {
        Self::WorkloadParse {
            line,
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Whether the failure is one the external tools are known to recover from
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::CommandFailed { output, .. } => crate::runtime::decoder::is_benign(output),
            _ => false,
        }
    }

}

/// Convenient result type used across the crate
pub type Result<T> = std::result::Result<T, Error>;
