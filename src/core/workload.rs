//! Workload files
//!
//! Two line formats are supported, one per driver:
//!
//! ```text
//! # docker: seq,container,command[,parameter]
//! 0,cont_0,create,
//! 0,cont_0,start
//! 1,cont_0,stop
//!
//! # openwhisk: time,user,function[,parameter],repeat
//! 0,7,3,5
//! 1,alice,4,-p n 10,2
//! ```

use crate::core::error::{Error, Result};
use crate::core::types::DriverKind;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Verb used for every FaaS workload entry
pub const INVOKE_VERB: &str = "invoke";

/// One parsed workload line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadEntry {
    pub batch: i64,
    /// User owning the function (FaaS only)
    pub owner: Option<String>,
    pub resource: String,
    pub verb: String,
    pub parameter: Option<String>,
    /// How many times the entry is executed inside its batch
    pub repeat: u32,
}

/// Parsed workload, grouped by batch in ascending order
#[derive(Debug, Clone, Default)]
pub struct Workload {
    batches: BTreeMap<i64, Vec<WorkloadEntry>>,
    owners: BTreeSet<String>,
    owner_functions: BTreeMap<String, BTreeSet<String>>,
}

impl Workload {
    /// Parse a workload from text
    pub fn parse(kind: DriverKind, content: &str) -> Result<Self> {
        let mut workload = Self::default();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry = match kind {
                DriverKind::Docker => parse_container_line(idx + 1, line)?,
                DriverKind::OpenWhisk => parse_function_line(idx + 1, line)?,
            };
            workload.push(entry);
        }
        Ok(workload)
    }

    /// Read and parse a workload file
    pub async fn load(kind: DriverKind, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::configuration(format!("cannot read workload {}: {e}", path.display()))
        })?;
        let workload = Self::parse(kind, &content)?;
        tracing::debug!(
            path = %path.display(),
            batches = workload.batch_count(),
            entries = workload.entry_count(),
            "Parsed workload"
        );
        Ok(workload)
    }

    /// Add an entry to its batch
    pub fn push(&mut self, entry: WorkloadEntry) {
        if let Some(owner) = &entry.owner {
            self.owners.insert(owner.clone());
            self.owner_functions
                .entry(owner.clone())
                .or_default()
                .insert(entry.resource.clone());
        }
        self.batches.entry(entry.batch).or_default().push(entry);
    }

    /// Batches in ascending numeric order
    pub fn batches(&self) -> impl Iterator<Item = (i64, &[WorkloadEntry])> {
        self.batches.iter().map(|(id, entries)| (*id, entries.as_slice()))
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn entry_count(&self) -> usize {
        self.batches.values().map(Vec::len).sum()
    }

    /// Total number of executions one pass over the workload produces
    pub fn execution_count(&self) -> u64 {
        self.batches
            .values()
            .flatten()
            .map(|entry| u64::from(entry.repeat))
            .sum()
    }

    /// Distinct users discovered while parsing
    pub fn owners(&self) -> impl Iterator<Item = &str> {
        self.owners.iter().map(String::as_str)
    }

    /// Distinct (user, function) pairs discovered while parsing
    pub fn owner_functions(&self) -> impl Iterator<Item = (&str, &str)> {
        self.owner_functions.iter().flat_map(|(owner, functions)| {
            functions
                .iter()
                .map(move |function| (owner.as_str(), function.as_str()))
        })
    }

    /// Every verb issued by the workload
    pub fn verbs(&self) -> BTreeSet<&str> {
        self.batches
            .values()
            .flatten()
            .map(|entry| entry.verb.as_str())
            .collect()
    }
}

fn parse_int<T: std::str::FromStr>(line: usize, field: &str, what: &str) -> Result<T> {
    field
        .trim()
        .parse()
        .map_err(|_| Error::workload(line, format!("{what} '{field}' is not an integer")))
}

fn non_empty(field: &str) -> Option<String> {
    if field.is_empty() {
        None
    } else {
        Some(field.to_string())
    }
}

/// Parse `seq,container,command[,parameter]`
pub fn parse_container_line(line: usize, text: &str) -> Result<WorkloadEntry> {
    let parts: Vec<&str> = text.split(',').collect();
    if parts.len() != 3 && parts.len() != 4 {
        return Err(Error::workload(
            line,
            format!("expected 3 or 4 fields, found {}", parts.len()),
        ));
    }

    Ok(WorkloadEntry {
        batch: parse_int(line, parts[0], "sequence")?,
        owner: None,
        resource: parts[1].to_string(),
        verb: parts[2].to_string(),
        parameter: parts.get(3).and_then(|p| non_empty(p)),
        repeat: 1,
    })
}

/// Parse `time,user,function[,parameter],repeat`
pub fn parse_function_line(line: usize, text: &str) -> Result<WorkloadEntry> {
    let parts: Vec<&str> = text.split(',').collect();
    if parts.len() != 4 && parts.len() != 5 {
        return Err(Error::workload(
            line,
            format!("expected 4 or 5 fields, found {}", parts.len()),
        ));
    }

    let owner = if parts[1].parse::<i64>().is_ok() {
        format!("user_{}", parts[1])
    } else {
        parts[1].to_string()
    };
    let function: u64 = parse_int(line, parts[2], "function id")?;
    let (parameter, repeat) = if parts.len() == 5 {
        (non_empty(parts[3]), parts[4])
    } else {
        (None, parts[3])
    };

    Ok(WorkloadEntry {
        batch: parse_int(line, parts[0], "time")?,
        owner: Some(owner),
        resource: function.to_string(),
        verb: INVOKE_VERB.to_string(),
        parameter,
        repeat: parse_int(line, repeat, "repeat count")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_container_lines() {
        let entry = parse_container_line(1, "0,contA,create,").unwrap();
        assert_eq!(entry.batch, 0);
        assert_eq!(entry.resource, "contA");
        assert_eq!(entry.verb, "create");
        assert_eq!(entry.parameter, None);
        assert_eq!(entry.repeat, 1);

        let entry = parse_container_line(2, "0,contA,run,-d image").unwrap();
        assert_eq!(entry.parameter.as_deref(), Some("-d image"));

        let entry = parse_container_line(3, "1,contA,stop").unwrap();
        assert_eq!(entry.batch, 1);
        assert_eq!(entry.parameter, None);
    }

    #[test]
    fn test_container_line_field_count() {
        match parse_container_line(4, "0,contA") {
            Err(Error::WorkloadParse { line, reason }) => {
                assert_eq!(line, 4);
                assert!(reason.contains("found 2"));
            }
            other => panic!("Expected WorkloadParse, got {other:?}"),
        }
        assert!(parse_container_line(1, "0,a,b,c,d").is_err());
        assert!(parse_container_line(1, "x,contA,create").is_err());
    }

    #[test]
    fn test_function_lines() {
        let entry = parse_function_line(1, "0,7,3,5").unwrap();
        assert_eq!(entry.owner.as_deref(), Some("user_7"));
        assert_eq!(entry.resource, "3");
        assert_eq!(entry.verb, INVOKE_VERB);
        assert_eq!(entry.parameter, None);
        assert_eq!(entry.repeat, 5);

        let entry = parse_function_line(2, "4,alice,9,-p n 10,2").unwrap();
        assert_eq!(entry.batch, 4);
        assert_eq!(entry.owner.as_deref(), Some("alice"));
        assert_eq!(entry.parameter.as_deref(), Some("-p n 10"));
        assert_eq!(entry.repeat, 2);
    }

    #[test]
    fn test_function_line_errors() {
        assert!(parse_function_line(1, "0,7,3").is_err());
        assert!(parse_function_line(1, "0,7,f,1").is_err());
        assert!(parse_function_line(1, "0,7,3,p,many").is_err());
    }

    #[test]
    fn test_batches_are_ascending_regardless_of_input_order() {
        let workload = Workload::parse(
            DriverKind::Docker,
            "5,c1,create\n0,c2,create\n\n3,c3,create\n0,c2,start\n",
        )
        .unwrap();
        let ids: Vec<i64> = workload.batches().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![0, 3, 5]);
        assert_eq!(workload.entry_count(), 4);

        let (_, first) = workload.batches().next().unwrap();
        assert_eq!(first[0].verb, "create");
        assert_eq!(first[1].verb, "start");
    }

    #[test]
    fn test_owners_and_functions_are_distinct() {
        let workload = Workload::parse(
            DriverKind::OpenWhisk,
            "0,1,1,3\n0,1,1,2\n1,1,2,1\n1,bob,1,4\n",
        )
        .unwrap();
        let owners: Vec<&str> = workload.owners().collect();
        assert_eq!(owners, vec!["bob", "user_1"]);

        let pairs: Vec<(&str, &str)> = workload.owner_functions().collect();
        assert_eq!(pairs, vec![("bob", "1"), ("user_1", "1"), ("user_1", "2")]);
        assert_eq!(workload.execution_count(), 10);
    }

    #[test]
    fn test_parse_error_carries_line_number() {
        let err = Workload::parse(DriverKind::Docker, "0,c1,create\n0,c1\n").unwrap_err();
        match err {
            Error::WorkloadParse { line, .. } => assert_eq!(line, 2),
            other => panic!("Expected WorkloadParse, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cmds.txt");
        std::fs::write(&path, "0,c1,create\n1,c1,rm\n").unwrap();

        let workload = Workload::load(DriverKind::Docker, &path).await.unwrap();
        assert_eq!(workload.batch_count(), 2);
        assert!(workload.verbs().contains("rm"));

        let missing = Workload::load(DriverKind::Docker, dir.path().join("nope")).await;
        assert!(matches!(missing, Err(Error::Configuration(_))));
    }

    proptest! {
        #[test]
        fn prop_container_lines_round_trip_fields(
            seq in 0i64..10_000,
            name in "[a-z][a-z0-9_]{0,12}",
            verb in "(create|run|start|stop|rm|pause|unpause)",
        ) {
            let entry = parse_container_line(1, &format!("{seq},{name},{verb}")).unwrap();
            prop_assert_eq!(entry.batch, seq);
            prop_assert_eq!(entry.resource, name);
            prop_assert_eq!(entry.verb, verb);
        }

        #[test]
        fn prop_execution_count_sums_repeats(repeats in prop::collection::vec(1u32..50, 1..20)) {
            let text: String = repeats
                .iter()
                .enumerate()
                .map(|(i, r)| format!("{},u,{},{}\n", i % 3, i, r))
                .collect();
            let workload = Workload::parse(DriverKind::OpenWhisk, &text).unwrap();
            let expected: u64 = repeats.iter().map(|r| u64::from(*r)).sum();
            prop_assert_eq!(workload.execution_count(), expected);
        }
    }
}
