//! Records exchanged between the scheduler, the workers and the recorder

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which external platform a run drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Docker container lifecycle commands
    Docker,
    /// OpenWhisk function invocations through the wrapper script
    OpenWhisk,
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Docker => write!(f, "docker"),
            Self::OpenWhisk => write!(f, "openwhisk"),
        }
    }
}

impl FromStr for DriverKind {
    type Err = crate::core::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "openwhisk" | "ow" => Ok(Self::OpenWhisk),
            other => Err(crate::core::Error::configuration(format!(
                "unknown driver '{other}'"
            ))),
        }
    }
}

/// One unit of work handed to the worker pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledCommand {
    /// Batch the command belongs to
    pub batch: i64,
    /// Globally unique, monotonic sequence number within the run
    pub seq: u64,
    /// Container name or function id
    pub resource: String,
    /// Command verb (`create`, `run`, `invoke`, ...)
    pub verb: String,
    /// Optional parameter payload forwarded to the tool
    pub parameter: Option<String>,
    /// Owning user for FaaS invocations
    pub owner: Option<String>,
    /// Per-resource dispatch ticket, set when the driver validates lifecycles
    pub turn: Option<u64>,
}

/// What a driver observed after executing one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The command finished; `result` is the tool's answer
    Completed {
        status: Option<String>,
        result: String,
    },
    /// The command was accepted asynchronously and must be polled later
    Pending {
        status: Option<String>,
        handle: String,
    },
}

/// A completed (or in-flight, for async invocations) result row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub batch: i64,
    pub seq: u64,
    pub resource: String,
    pub verb: String,
    pub owner: Option<String>,
    pub parameter: Option<String>,
    pub status: Option<String>,
    pub result: Option<String>,
    pub elapsed_ms: u128,
    pub since_start_ms: u128,
    pub started_at_ns: i64,
    pub ended_at_ns: i64,
    pub exec_rate: f64,
    pub concurrency_factor: usize,
    pub bytes_received: Option<u64>,
    pub bytes_transmitted: Option<u64>,
}

impl CommandRecord {
    /// Start a record for a command that was just dequeued
    pub fn started(cmd: &ScheduledCommand, started_at_ns: i64) -> Self {
        Self {
            batch: cmd.batch,
            seq: cmd.seq,
            resource: cmd.resource.clone(),
            verb: cmd.verb.clone(),
            owner: cmd.owner.clone(),
            parameter: cmd.parameter.clone(),
            started_at_ns,
            ..Self::default()
        }
    }
}

/// Output column; the order of a driver's column list is the CSV projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Batch,
    Seq,
    ContainerName,
    DockerCmd,
    UserId,
    FunctionId,
    CmdResult,
    ElapsedTime,
    ElapsedTimeSinceStart,
    StartTime,
    EndTime,
    ExecRate,
    CmdStatus,
    ConcurrencyFactor,
    Parameter,
    BytesReceived,
    BytesTransmitted,
}

impl Column {
    /// Header text as it appears in the CSV output
    pub fn header(&self) -> &'static str {
        match self {
            Self::Batch => "Batch",
            Self::Seq => "Seq",
            Self::ContainerName => "ContainerName",
            Self::DockerCmd => "DockerCmd",
            Self::UserId => "UserID",
            Self::FunctionId => "FunctionID",
            Self::CmdResult => "ActivationId, WaitTime, InitTime, RunTime",
            Self::ElapsedTime => "ElapsedTime",
            Self::ElapsedTimeSinceStart => "ElapsedTimeSinceStart",
            Self::StartTime => "StartTime",
            Self::EndTime => "EndTime",
            Self::ExecRate => "ExecRate",
            Self::CmdStatus => "CmdStatus",
            Self::ConcurrencyFactor => "ConcurrencyFactor",
            Self::Parameter => "Parameter",
            Self::BytesReceived => "BytesReceived",
            Self::BytesTransmitted => "BytesTransmitted",
        }
    }

    /// Network byte deltas are per-process and only attributable to a single
    /// request when exactly one worker runs
    pub fn is_network_bytes(&self) -> bool {
        matches!(self, Self::BytesReceived | Self::BytesTransmitted)
    }

    /// Render this column's value for a record
    pub fn value(&self, record: &CommandRecord) -> String {
        fn opt(value: &Option<String>) -> String {
            value.clone().unwrap_or_default()
        }
        fn opt_num(value: Option<u64>) -> String {
            value.map(|v| v.to_string()).unwrap_or_default()
        }

        match self {
            Self::Batch => record.batch.to_string(),
            Self::Seq => record.seq.to_string(),
            Self::ContainerName | Self::FunctionId => record.resource.clone(),
            Self::DockerCmd => record.verb.clone(),
            Self::UserId => opt(&record.owner),
            Self::CmdResult => opt(&record.result),
            Self::ElapsedTime => record.elapsed_ms.to_string(),
            Self::ElapsedTimeSinceStart => record.since_start_ms.to_string(),
            Self::StartTime => record.started_at_ns.to_string(),
            Self::EndTime => record.ended_at_ns.to_string(),
            Self::ExecRate => format!("{:.2}", record.exec_rate),
            Self::CmdStatus => opt(&record.status),
            Self::ConcurrencyFactor => record.concurrency_factor.to_string(),
            Self::Parameter => opt(&record.parameter),
            Self::BytesReceived => opt_num(record.bytes_received),
            Self::BytesTransmitted => opt_num(record.bytes_transmitted),
        }
    }
}

/// Nanoseconds since the unix epoch, used for the StartTime/EndTime columns
pub fn unix_nanos() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_command() -> ScheduledCommand {
        ScheduledCommand {
            batch: 2,
            seq: 17,
            resource: "contA".to_string(),
            verb: "run".to_string(),
            parameter: Some("-d alpine".to_string()),
            owner: None,
            turn: Some(1),
        }
    }

    #[test]
    fn test_record_starts_from_command() {
        let record = CommandRecord::started(&sample_command(), 42);
        assert_eq!(record.batch, 2);
        assert_eq!(record.seq, 17);
        assert_eq!(record.resource, "contA");
        assert_eq!(record.verb, "run");
        assert_eq!(record.parameter.as_deref(), Some("-d alpine"));
        assert_eq!(record.started_at_ns, 42);
        assert!(record.result.is_none());
    }

    #[test]
    fn test_column_values() {
        let mut record = CommandRecord::started(&sample_command(), 1);
        record.exec_rate = 3.14159;
        record.elapsed_ms = 120;
        record.bytes_received = Some(2048);

        assert_eq!(Column::ExecRate.value(&record), "3.14");
        assert_eq!(Column::ElapsedTime.value(&record), "120");
        assert_eq!(Column::ContainerName.value(&record), "contA");
        assert_eq!(Column::DockerCmd.value(&record), "run");
        assert_eq!(Column::BytesReceived.value(&record), "2048");
        assert_eq!(Column::BytesTransmitted.value(&record), "");
        assert_eq!(Column::UserId.value(&record), "");
    }

    #[test]
    fn test_network_columns() {
        assert!(Column::BytesReceived.is_network_bytes());
        assert!(Column::BytesTransmitted.is_network_bytes());
        assert!(!Column::ElapsedTime.is_network_bytes());
    }

    #[test]
    fn test_driver_kind_parsing() {
        assert_eq!("docker".parse::<DriverKind>().unwrap(), DriverKind::Docker);
        assert_eq!("OpenWhisk".parse::<DriverKind>().unwrap(), DriverKind::OpenWhisk);
        assert_eq!("ow".parse::<DriverKind>().unwrap(), DriverKind::OpenWhisk);
        assert!("lambda".parse::<DriverKind>().is_err());
        assert_eq!(DriverKind::OpenWhisk.to_string(), "openwhisk");
    }
}
