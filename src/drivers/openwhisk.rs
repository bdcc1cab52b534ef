//! OpenWhisk driver
//!
//! Talks to the platform through its benchmarking wrapper script, which
//! answers every call with a `{"status", "output"}` JSON document. Users and
//! functions are created (or their credentials looked up) before the first
//! batch; invocations then run with the owner's credential.

use crate::core::{
    Column, DriverKind, Error, Outcome, Result, RunConfig, ScheduledCommand, Workload,
};
use crate::runtime::decoder::{self, ActivationResult, Response, TIMED_OUT};
use crate::runtime::fanout::FanOut;
use crate::runtime::poller::PendingActivation;
use crate::runtime::process::{CommandExecutor, ShellExecutor};
use crate::runtime::Driver;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Action deployed for every function when users are created
pub const DEFAULT_ACTION_FILE: &str = "openwhisk/funcs/spin.js";

const COLUMNS: &[Column] = &[
    Column::Batch,
    Column::UserId,
    Column::FunctionId,
    Column::Seq,
    Column::CmdResult,
    Column::ElapsedTime,
    Column::ElapsedTimeSinceStart,
    Column::StartTime,
    Column::EndTime,
    Column::ExecRate,
    Column::CmdStatus,
    Column::ConcurrencyFactor,
    Column::Parameter,
    Column::BytesReceived,
    Column::BytesTransmitted,
];

/// How users and functions are made available before the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provisioning {
    /// Users and functions already exist; only credentials are looked up
    Lookup,
    /// Create every user, then deploy `action_file` for each of its functions
    Create { action_file: PathBuf },
}

pub struct OpenWhiskDriver {
    executor: Arc<dyn CommandExecutor>,
    provisioning: Provisioning,
    credentials: RwLock<HashMap<String, String>>,
}

impl OpenWhiskDriver {
    pub fn new(executor: Arc<dyn CommandExecutor>, provisioning: Provisioning) -> Self {
        Self {
            executor,
            provisioning,
            credentials: RwLock::new(HashMap::new()),
        }
    }

    /// Locate the wrapper script and build a driver around it
    pub fn from_path(wrapper: &str, provisioning: Provisioning) -> Result<Self> {
        let executor = ShellExecutor::locate(wrapper)?;
        Ok(Self::new(Arc::new(executor), provisioning))
    }

    /// Register a credential without going through provisioning
    pub fn insert_credential(&self, user: impl Into<String>, auth: impl Into<String>) {
        self.credentials.write().insert(user.into(), auth.into());
    }

    pub fn credential(&self, user: &str) -> Result<String> {
        self.credentials
            .read()
            .get(user)
            .cloned()
            .ok_or_else(|| {
                Error::configuration(format!("no credential loaded for user '{user}'"))
            })
    }

    fn owner_credential(&self, owner: Option<&str>) -> Result<String> {
        let owner =
            owner.ok_or_else(|| Error::configuration("function invocation without an owner"))?;
        self.credential(owner)
    }

    /// Arguments of one invocation
    pub fn invocation_args(
        cmd: &ScheduledCommand,
        auth: &str,
        async_invocation: bool,
    ) -> Vec<String> {
        let mut args = if async_invocation {
            vec!["invokeFunctionWithAuthAsync".to_string()]
        } else {
            vec!["invokeFunctionWithAuth".to_string(), "false".to_string()]
        };
        args.push(auth.to_string());
        args.push(cmd.resource.clone());
        if let Some(parameter) = &cmd.parameter {
            args.push("--param".to_string());
            args.extend(parameter.split_whitespace().map(str::to_string));
        }
        args
    }

    async fn call(&self, args: &[String]) -> Result<Response> {
        let raw = self.executor.run(args).await?;
        decoder::decode(&raw)
    }

    /// Call the wrapper until it stops timing out, at most `attempts` times
    async fn call_with_retry(&self, args: Vec<String>, attempts: u32) -> Result<Response> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = self.call(&args).await;
            let last_output = match &outcome {
                Ok(response) if response.output.contains(TIMED_OUT) => response.output.clone(),
                Err(e) if e.is_transient() => e.to_string(),
                _ => return outcome,
            };

            if attempt >= attempts {
                return Err(Error::RetriesExhausted {
                    command: self.executor.describe(&args),
                    attempts,
                    output: last_output,
                });
            }
            warn!(
                "{} timed out (attempt {}/{}), retrying",
                args[0], attempt, attempts
            );
        }
    }

    async fn create_users(
        &self,
        workload: &Workload,
        config: &RunConfig,
        fan_out: &FanOut,
    ) -> Result<()> {
        let started = Instant::now();
        let users = fan_out
            .run(workload.owners(), |user| async move {
                let args = vec!["createUser".to_string(), user.to_string()];
                let response = self.call_with_retry(args, config.user_attempts).await?;
                let auth = response.output.split(' ').nth(1).ok_or_else(|| {
                    Error::decode(format!(
                        "no credential in createUser answer: {}",
                        response.output
                    ))
                })?;
                Ok((user.to_string(), auth.to_string()))
            })
            .await?;

        let count = users.len();
        self.credentials.write().extend(users);
        info!("{} users created in {:?}", count, started.elapsed());
        Ok(())
    }

    async fn create_functions(
        &self,
        workload: &Workload,
        config: &RunConfig,
        fan_out: &FanOut,
        action_file: &str,
    ) -> Result<()> {
        let started = Instant::now();
        let created = fan_out
            .run(workload.owner_functions(), |(user, function)| async move {
                debug!("Creating function {} for {}", function, user);
                self.call_with_retry(
                    vec![
                        "createFunction".to_string(),
                        user.to_string(),
                        function.to_string(),
                        action_file.to_string(),
                    ],
                    config.function_attempts,
                )
                .await
            })
            .await?;
        info!("{} functions created in {:?}", created.len(), started.elapsed());
        Ok(())
    }

    async fn lookup_users(
        &self,
        workload: &Workload,
        config: &RunConfig,
        fan_out: &FanOut,
    ) -> Result<()> {
        let started = Instant::now();
        let users = fan_out
            .run(workload.owners(), |user| async move {
                let args = vec!["getUserAuth".to_string(), user.to_string()];
                let response = self.call_with_retry(args, config.user_attempts).await?;
                Ok((user.to_string(), response.output))
            })
            .await?;

        let count = users.len();
        self.credentials.write().extend(users);
        info!(
            "{} users loaded with their credentials in {:?}",
            count,
            started.elapsed()
        );
        Ok(())
    }
}

#[async_trait]
impl Driver for OpenWhiskDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::OpenWhisk
    }

    fn columns(&self) -> &'static [Column] {
        COLUMNS
    }

    async fn provision(
        &self,
        workload: &Workload,
        config: &RunConfig,
        fan_out: &FanOut,
    ) -> Result<()> {
        match &self.provisioning {
            Provisioning::Create { action_file } => {
                info!("Creating users and functions");
                self.create_users(workload, config, fan_out).await?;
                let action_file = action_file.to_string_lossy();
                self.create_functions(workload, config, fan_out, &action_file).await
            }
            Provisioning::Lookup => self.lookup_users(workload, config, fan_out).await,
        }
    }

    async fn execute(&self, cmd: &ScheduledCommand, config: &RunConfig) -> Result<Outcome> {
        let auth = self.owner_credential(cmd.owner.as_deref())?;
        let args = Self::invocation_args(cmd, &auth, config.async_invocations);
        let response = self.call(&args).await?;

        if response.output.starts_with("error") {
            return Err(Error::ExecutionReported {
                command: format!("{} {}", args[0], cmd.resource),
                output: response.output,
            });
        }
        if response.unfinished {
            debug!("Invocation of {} outlived the platform's wait", cmd.resource);
        }

        let status = Some(response.status);
        Ok(if config.async_invocations {
            Outcome::Pending {
                status,
                handle: response.output,
            }
        } else {
            Outcome::Completed {
                status,
                result: response.output,
            }
        })
    }

    async fn poll(&self, pending: &PendingActivation) -> Result<Option<Outcome>> {
        let auth = self.owner_credential(pending.record.owner.as_deref())?;
        let args = vec![
            "getResultFromActivation".to_string(),
            auth,
            pending.handle.clone(),
        ];
        let response = self.call(&args).await?;

        if response.unfinished || ActivationResult::parse(&response.output).is_none() {
            return Ok(None);
        }
        Ok(Some(Outcome::Completed {
            status: Some(response.status),
            result: response.output,
        }))
    }
}
