use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

use commands::{ConfigSchemaArgs, ProvisionArgs, ValidateArgs};

#[derive(Parser)]
#[command(name = "cx-cli", version, about = "Traceability notification service utilities")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register the notification offer with the data-space connector
    Provision(ProvisionArgs),
    /// Check a payload file against the notification contract
    Validate(ValidateArgs),
    /// Print or write the JSON schema of the config file
    ConfigSchema(ConfigSchemaArgs),
}

/// Exit code: 0 on success, 1 when a payload is not valid or a command fails.
async fn dispatch(command: Commands) -> Result<i32> {
    match command {
        Commands::Provision(args) => {
            let report = commands::provision::run(args).await?;
            if !report.all_accepted() {
                eprintln!(
                    "connector rejected {} of {} requests",
                    report.rejected().count(),
                    report.steps.len()
                );
            }
            Ok(0)
        }
        Commands::Validate(args) => {
            let result = commands::validate::run(args).await?;
            Ok(if result.is_valid() { 0 } else { 1 })
        }
        Commands::ConfigSchema(args) => {
            commands::schema::run(args)?;
            Ok(0)
        }
    }
}

#[tokio::main]
async fn main() {
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    match dispatch(cli.command).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}
