use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use cx_contract::{ValidationEngine, ValidationResult};
use cx_core::{Config, NotificationEndpoint};

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Notification endpoint whose contract applies (receive|update)
    #[arg(long)]
    pub endpoint: NotificationEndpoint,
    /// JSON payload to check
    #[arg(long)]
    pub file: PathBuf,
    /// Contract locator; defaults to contract.openapi_url from the config
    #[arg(long)]
    pub contract: Option<String>,
    /// Config file (defaults to CX_CONFIG or config/cx.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Emit the result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Validates the payload offline and prints the outcome.
pub async fn run(args: ValidateArgs) -> Result<ValidationResult> {
    let locator = match args.contract.clone() {
        Some(locator) => locator,
        None => Config::load_from(args.config.as_deref())?
            .openapi_url()?
            .to_string(),
    };
    let raw = std::fs::read(&args.file)
        .with_context(|| format!("read payload {}", args.file.display()))?;
    let client = reqwest::Client::new();
    let engine = ValidationEngine::load(&client, &locator)
        .await
        .with_context(|| format!("load contract {locator}"))?;
    let result = engine.validate_endpoint(args.endpoint, &raw);

    if args.json {
        let value = serde_json::to_value(&result).context("serialize validation result")?;
        super::print_json(&value, true);
    } else if result.is_valid() {
        println!("{}: valid", args.file.display());
    } else {
        print!("{}", result.error_summary());
        if !result.error_summary().ends_with('\n') {
            println!();
        }
    }
    Ok(result)
}
