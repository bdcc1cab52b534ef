use anyhow::Result;
use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::Parser;
use faasbench::cli::{Cli, CliError};
use tracing::{debug, error};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.kind() == ErrorKind::InvalidSubcommand => {
            let name = match e.get(ContextKind::InvalidSubcommand) {
                Some(ContextValue::String(name)) => name.clone(),
                _ => String::new(),
            };
            let err = CliError::UnknownCommand(name);
            eprintln!("Error: {}", err.user_message());
            std::process::exit(err.exit_code());
        }
        Err(e) => e.exit(),
    };

    // Rows own stdout; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_level())),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    debug!("Starting faasbench {}", faasbench::VERSION);

    if let Err(e) = cli.execute().await {
        error!("Command execution failed: {:?}", e);
        eprintln!("Error: {}", e.user_message());
        std::process::exit(e.exit_code());
    }

    Ok(())
}
