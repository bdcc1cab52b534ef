//! External command execution

use crate::core::{Error, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Runs one external command and returns its combined output
///
/// Implementations must be safe to call from many workers at once.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run the command with `args` appended and wait for it to exit
    async fn run(&self, args: &[String]) -> Result<String>;

    /// Human-readable command line for logs and error messages
    fn describe(&self, args: &[String]) -> String {
        args.join(" ")
    }
}

/// Executor spawning a real process per call
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    program: PathBuf,
    leading_args: Vec<String>,
    timeout: Option<Duration>,
}

impl ShellExecutor {
    /// Locate `program` on `PATH` (or accept a path) and build an executor
    pub fn locate(program: &str) -> Result<Self> {
        let resolved = which::which(program)
            .map_err(|e| Error::BinaryNotFound(format!("{program}: {e}")))?;
        Ok(Self::new(resolved))
    }

    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            timeout: None,
        }
    }

    /// Arguments placed before every call's own arguments
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn run(&self, args: &[String]) -> Result<String> {
        let command_line = self.describe(args);
        debug!("Executing command: {}", command_line);

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args).args(args).kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| Error::Timeout {
                    command: command_line.clone(),
                    secs: limit.as_secs(),
                })??,
            None => cmd.output().await?,
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let combined = combined.trim_matches(|c| c == ' ' || c == '\n').to_string();

        debug!("Command completed with status: {}", output.status);
        if !output.status.success() {
            return Err(Error::CommandFailed {
                command: command_line,
                status: output.status.to_string(),
                output: combined,
            });
        }
        Ok(combined)
    }

    fn describe(&self, args: &[String]) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.leading_args.iter().cloned());
        parts.extend(args.iter().cloned());
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> (ShellExecutor, Vec<String>) {
        (
            ShellExecutor::new("/bin/sh").with_leading_args(["-c"]),
            vec![script.to_string()],
        )
    }

    #[tokio::test]
    async fn test_combined_output_is_trimmed() {
        let (executor, args) = sh("echo out; echo err 1>&2");
        let output = executor.run(&args).await.unwrap();
        assert!(output.starts_with("out"));
        assert!(output.ends_with("err"));
    }

    #[tokio::test]
    async fn test_failure_carries_output() {
        let (executor, args) = sh("echo 'Error: resource already exists' 1>&2; exit 3");
        match executor.run(&args).await {
            Err(Error::CommandFailed { output, status, .. }) => {
                assert_eq!(output, "Error: resource already exists");
                assert!(status.contains('3'));
            }
            other => panic!("Expected CommandFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout() {
        let (executor, args) = sh("sleep 5");
        let executor = executor.with_timeout(Some(Duration::from_millis(50)));
        assert!(matches!(
            executor.run(&args).await,
            Err(Error::Timeout { .. })
        ));
    }

    #[test]
    fn test_describe_includes_leading_args() {
        let executor = ShellExecutor::new("docker").with_leading_args(["container"]);
        let line = executor.describe(&["stop".to_string(), "c1".to_string()]);
        assert_eq!(line, "docker container stop c1");
    }

    #[test]
    fn test_locate_missing_binary() {
        assert!(matches!(
            ShellExecutor::locate("definitely-not-a-real-binary-xyz"),
            Err(Error::BinaryNotFound(_))
        ));
    }
}
