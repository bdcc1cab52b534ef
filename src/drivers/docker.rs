//! Docker container lifecycle driver
//!
//! Every command is `docker container <verb> ...`. Commands are validated
//! against a lifecycle graph, and containers left running are stopped and
//! removed when the run ends.

use crate::core::lifecycle::REMOVED;
use crate::core::{
    Column, DriverKind, Error, LifecycleGraph, Outcome, Result, RunConfig, ScheduledCommand,
};
use crate::runtime::fanout::FanOut;
use crate::runtime::process::{CommandExecutor, ShellExecutor};
use crate::runtime::tracker::RateTracker;
use crate::runtime::Driver;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Status recorded for commands whose failure is known to be harmless
pub const SKIPPED: &str = "SKIPPED";

const NAMED_VERBS: &[&str] = &["create", "run"];

const COLUMNS: &[Column] = &[
    Column::Batch,
    Column::Seq,
    Column::ContainerName,
    Column::DockerCmd,
    Column::ElapsedTime,
    Column::ElapsedTimeSinceStart,
    Column::StartTime,
    Column::EndTime,
    Column::ExecRate,
    Column::ConcurrencyFactor,
    Column::Parameter,
    Column::BytesReceived,
    Column::BytesTransmitted,
];

pub struct DockerDriver {
    executor: Arc<dyn CommandExecutor>,
    graph: LifecycleGraph,
}

impl DockerDriver {
    pub fn new(executor: Arc<dyn CommandExecutor>, graph: LifecycleGraph) -> Self {
        Self { executor, graph }
    }

    /// Locate the docker binary and load the lifecycle graph from a YAML file
    pub fn from_path(binary: &str, graph: impl AsRef<Path>) -> Result<Self> {
        let executor = ShellExecutor::locate(binary)?.with_leading_args(["container"]);
        Ok(Self::new(Arc::new(executor), LifecycleGraph::load(graph)?))
    }

    /// Arguments following `docker container` for one command
    ///
    /// `create` and `run` name the new container with `--name=`; every other
    /// verb takes the container name as its first operand.
    pub fn command_args(cmd: &ScheduledCommand) -> Vec<String> {
        let mut args = vec![cmd.verb.clone()];
        if NAMED_VERBS.contains(&cmd.verb.as_str()) {
            args.push(format!("--name={}", cmd.resource));
        } else {
            args.push(cmd.resource.clone());
        }
        if let Some(parameter) = &cmd.parameter {
            args.extend(parameter.split_whitespace().map(str::to_string));
        }
        args
    }

    async fn quietly(&self, args: [&str; 2]) -> Result<()> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.executor.run(&args).await.map(|_| ())
    }
}

#[async_trait]
impl Driver for DockerDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Docker
    }

    fn columns(&self) -> &'static [Column] {
        COLUMNS
    }

    fn lifecycle(&self) -> Option<&LifecycleGraph> {
        Some(&self.graph)
    }

    async fn execute(&self, cmd: &ScheduledCommand, _config: &RunConfig) -> Result<Outcome> {
        let args = Self::command_args(cmd);
        debug!("docker container {}", args.join(" "));

        match self.executor.run(&args).await {
            Ok(output) if output.starts_with("error") => Err(Error::ExecutionReported {
                command: self.executor.describe(&args),
                output,
            }),
            Ok(output) => Ok(Outcome::Completed {
                status: None,
                result: output,
            }),
            Err(e) if e.is_transient() => {
                warn!("Ignoring benign failure of {} {}: {}", cmd.verb, cmd.resource, e);
                Ok(Outcome::Completed {
                    status: Some(SKIPPED.to_string()),
                    result: e.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn teardown(&self, tracker: &RateTracker, fan_out: &FanOut) -> Result<()> {
        let live = tracker.live_resources(REMOVED);
        if live.is_empty() {
            return Ok(());
        }
        info!("Stopping and removing {} containers", live.len());

        let failures = fan_out
            .run_quiet("container cleanup", live, |(name, last)| async move {
                debug!(
                    "Cleaning up {} (last command: {}, state {:?})",
                    name,
                    last,
                    self.graph.status_of(&last)
                );
                if let Err(e) = self.quietly(["stop", name.as_str()]).await {
                    debug!("stop {} failed: {}", name, e);
                }
                self.quietly([REMOVED, name.as_str()]).await
            })
            .await;

        if failures > 0 {
            warn!("{} containers could not be removed", failures);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedExecutor;

    fn command(verb: &str, parameter: Option<&str>) -> ScheduledCommand {
        ScheduledCommand {
            batch: 0,
            seq: 0,
            resource: "contA".to_string(),
            verb: verb.to_string(),
            parameter: parameter.map(str::to_string),
            owner: None,
            turn: None,
        }
    }

    fn graph() -> LifecycleGraph {
        LifecycleGraph::from_yaml_str(
            "rm: {id: 0, followers: [create, run]}\ncreate: {id: 1, followers: [start, rm]}\nrun: {id: 2, followers: [stop]}\nstart: {id: 3, followers: [stop]}\nstop: {id: 4, followers: [start, rm]}\n",
        )
        .unwrap()
    }

    #[test]
    fn test_create_and_run_use_name_flag() {
        assert_eq!(
            DockerDriver::command_args(&command("create", Some("alpine sleep 60"))),
            vec!["create", "--name=contA", "alpine", "sleep", "60"]
        );
        assert_eq!(
            DockerDriver::command_args(&command("run", Some("-d nginx"))),
            vec!["run", "--name=contA", "-d", "nginx"]
        );
        assert_eq!(
            DockerDriver::command_args(&command("stop", None)),
            vec!["stop", "contA"]
        );
    }

    #[tokio::test]
    async fn test_error_prefix_is_fatal() {
        let executor = Arc::new(ScriptedExecutor::with_output("error: daemon not reachable"));
        let driver = DockerDriver::new(executor, graph());
        let result = driver
            .execute(&command("start", None), &RunConfig::default())
            .await;
        assert!(matches!(result, Err(Error::ExecutionReported { .. })));
    }

    #[tokio::test]
    async fn test_output_becomes_result() {
        let executor = Arc::new(ScriptedExecutor::with_output("3f2a9c"));
        let driver = DockerDriver::new(executor.clone(), graph());
        let outcome = driver
            .execute(&command("create", Some("alpine")), &RunConfig::default())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Completed {
                status: None,
                result: "3f2a9c".to_string()
            }
        );
        assert_eq!(executor.calls()[0], vec!["create", "--name=contA", "alpine"]);
    }

    #[tokio::test]
    async fn test_teardown_stops_and_removes_live_containers() {
        let executor = Arc::new(ScriptedExecutor::with_output(""));
        let driver = DockerDriver::new(executor.clone(), graph());
        let tracker = RateTracker::new();
        tracker.set_state("contA", "start");
        tracker.set_state("contB", "rm");
        tracker.set_state("contC", "create");

        driver.teardown(&tracker, &FanOut::new(4)).await.unwrap();

        let mut calls = executor.calls();
        calls.sort();
        assert_eq!(
            calls,
            vec![
                vec!["rm", "contA"],
                vec!["rm", "contC"],
                vec!["stop", "contA"],
                vec!["stop", "contC"],
            ]
        );
    }

    #[tokio::test]
    async fn test_teardown_suppresses_failures() {
        let executor = Arc::new(ScriptedExecutor::new(|args| {
            Err(Error::CommandFailed {
                command: args.join(" "),
                status: "exit status: 1".to_string(),
                output: "No such container".to_string(),
            })
        }));
        let driver = DockerDriver::new(executor, graph());
        let tracker = RateTracker::new();
        tracker.set_state("contA", "start");
        assert!(driver.teardown(&tracker, &FanOut::new(2)).await.is_ok());
    }
}
