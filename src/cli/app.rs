use crate::cli::config::Config;
use crate::cli::error::{CliError, Result};
use crate::cli::output;
use crate::core::{DriverKind, LifecycleGraph, OutputTarget, RunConfig, Workload};
use crate::drivers::{DockerDriver, OpenWhiskDriver, Provisioning};
use crate::runtime::recorder::default_file_name;
use crate::runtime::{BenchmarkRun, CommandExecutor, Driver, ShellExecutor};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Benchmark OpenWhisk and Docker through their command-line tools
#[derive(Parser, Debug)]
#[command(name = "faasbench", author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Concurrency factor: number of workers running commands in parallel
    #[arg(long = "cf", global = true)]
    pub concurrency_factor: Option<usize>,

    /// Pause submission while the execution rate is above this value (0 = off)
    #[arg(long, global = true)]
    pub rate_limit: Option<f64>,

    /// Invoke functions asynchronously and poll for their results
    #[arg(long = "async", global = true)]
    pub async_invocations: bool,

    /// Repeat the workload until interrupted
    #[arg(long, global = true)]
    pub forever: bool,

    /// Write rows to a file instead of stdout
    #[arg(long, global = true)]
    pub write_to_file: bool,

    /// Output file name (defaults to a timestamped name)
    #[arg(long, global = true, requires = "write_to_file")]
    pub file_name: Option<String>,

    /// Echo rows on stdout while writing to a file
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Debug output
    #[arg(long, global = true)]
    pub debug: bool,

    /// Quiet output (data only; overrides verbose and debug)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Kill external commands after this many seconds (0 = never)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Configuration file
    #[arg(long, global = true, env = "FAASBENCH_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one command through a driver's tool and print its output
    #[command(name = "execCmd")]
    ExecCmd {
        #[arg(long)]
        driver: DriverKind,

        #[command(flatten)]
        command: RawCommand,
    },

    /// Run a workload file through a driver
    #[command(name = "execFile")]
    ExecFile {
        #[arg(long)]
        driver: DriverKind,

        #[command(flatten)]
        run: FileRun,
    },

    /// Run one OpenWhisk wrapper command
    #[command(name = "execOWCmd")]
    ExecOwCmd(RawCommand),

    /// Run an OpenWhisk workload file
    #[command(name = "execOWFile")]
    ExecOwFile(FileRun),

    /// Run one `docker container` command
    #[command(name = "execDockerCmd")]
    ExecDockerCmd(RawCommand),

    /// Run a Docker workload file
    #[command(name = "execDockerFile")]
    ExecDockerFile(FileRun),

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completion for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
pub struct RawCommand {
    /// Arguments passed to the tool
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[derive(Args, Debug)]
pub struct FileRun {
    /// Workload file
    pub file: PathBuf,

    /// Create users and functions before the run (OpenWhisk)
    #[arg(long)]
    pub create: bool,

    /// Action deployed for created functions (OpenWhisk)
    #[arg(long)]
    pub action_file: Option<PathBuf>,

    /// Container lifecycle graph (Docker)
    #[arg(long)]
    pub lifecycle: Option<PathBuf>,
}

impl Cli {
    /// Log filter for the tracing subscriber
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            "warn"
        } else if self.debug {
            "debug"
        } else {
            "info"
        }
    }

    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?.merge_with_cli_args(&self);
        output::set_color(config.output.color);

        match &self.command {
            Commands::ExecCmd { driver, command } => {
                self.exec_cmd(*driver, command, &config).await
            }
            Commands::ExecFile { driver, run } => self.exec_file(*driver, run, &config).await,
            Commands::ExecOwCmd(command) => {
                self.exec_cmd(DriverKind::OpenWhisk, command, &config).await
            }
            Commands::ExecOwFile(run) => {
                self.exec_file(DriverKind::OpenWhisk, run, &config).await
            }
            Commands::ExecDockerCmd(command) => {
                self.exec_cmd(DriverKind::Docker, command, &config).await
            }
            Commands::ExecDockerFile(run) => {
                self.exec_file(DriverKind::Docker, run, &config).await
            }
            Commands::Completion { shell } => {
                generate_completion(*shell);
                Ok(())
            }
        }
    }

    async fn exec_cmd(&self, kind: DriverKind, command: &RawCommand, config: &Config) -> Result<()> {
        let executor = executor(kind, config)?;
        info!("Command: {}", executor.describe(&command.args));
        let output = executor.run(&command.args).await?;
        println!("{output}");
        Ok(())
    }

    async fn exec_file(&self, kind: DriverKind, run: &FileRun, config: &Config) -> Result<()> {
        info!("Parsing file: {}", run.file.display());
        let workload = Workload::load(kind, &run.file).await?;
        let driver = build_driver(kind, run, config)?;
        let run_config = self.run_config(config)?;

        let quiet = self.quiet;
        if !quiet {
            output::print_run_header(kind, &run_config, &workload);
        }

        let summary = BenchmarkRun::new(driver, run_config)
            .with_batch_hook(move |report| {
                if !quiet {
                    output::print_batch(report);
                }
            })
            .execute(&workload)
            .await?;

        if !quiet {
            output::print_summary(&summary);
        }
        Ok(())
    }

    /// Engine settings from the merged configuration and the run flags
    pub fn run_config(&self, config: &Config) -> Result<RunConfig> {
        let output = if self.write_to_file {
            let name = self.file_name.clone().unwrap_or_else(default_file_name);
            OutputTarget::File(config.output.directory.join(name))
        } else {
            OutputTarget::Stdout
        };

        let mut builder = RunConfig::builder()
            .concurrency_factor(config.concurrency_factor)
            .rate_limit(config.rate_limit)
            .async_invocations(self.async_invocations)
            .run_forever(self.forever)
            .poll_interval(Duration::from_secs(config.openwhisk.poll_interval_secs))
            .output(output)
            .echo(config.output.echo);
        if let Some(interface) = &config.docker.network_interface {
            builder = builder.network_interface(interface.clone());
        }

        builder
            .build()
            .map_err(|e| CliError::invalid_input(e.to_string()))
    }
}

fn timeout(config: &Config) -> Option<Duration> {
    (config.timeout_secs > 0).then(|| Duration::from_secs(config.timeout_secs))
}

fn executor(kind: DriverKind, config: &Config) -> Result<ShellExecutor> {
    let executor = match kind {
        DriverKind::Docker => {
            ShellExecutor::locate(&config.docker.binary)?.with_leading_args(["container"])
        }
        DriverKind::OpenWhisk => ShellExecutor::locate(&config.openwhisk.wrapper)?,
    };
    Ok(executor.with_timeout(timeout(config)))
}

fn build_driver(kind: DriverKind, run: &FileRun, config: &Config) -> Result<Arc<dyn Driver>> {
    let executor: Arc<dyn CommandExecutor> = Arc::new(executor(kind, config)?);
    let driver: Arc<dyn Driver> = match kind {
        DriverKind::Docker => {
            let path = run.lifecycle.as_ref().unwrap_or(&config.docker.lifecycle);
            Arc::new(DockerDriver::new(executor, LifecycleGraph::load(path)?))
        }
        DriverKind::OpenWhisk => {
            let provisioning = if run.create {
                Provisioning::Create {
                    action_file: run
                        .action_file
                        .clone()
                        .unwrap_or_else(|| config.openwhisk.action_file.clone()),
                }
            } else {
                Provisioning::Lookup
            };
            Arc::new(OpenWhiskDriver::new(executor, provisioning))
        }
    };
    Ok(driver)
}

/// Generate shell completion script
fn generate_completion(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut std::io::stdout());
}
