use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use cx_core::Config;
use cx_edc::{EdcProvisioner, ProvisionReport};
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct ProvisionArgs {
    /// Config file (defaults to CX_CONFIG or config/cx.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Registers assets, policy and contract definitions with the connector.
pub async fn run(args: ProvisionArgs) -> Result<ProvisionReport> {
    let config = Config::load_from(args.config.as_deref())?;
    let client = reqwest::Client::builder()
        .user_agent(concat!("cx-cli/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("build http client")?;
    let provisioner = EdcProvisioner::from_config(client, &config)?;
    let report = provisioner
        .setup_traceability_offer()
        .await
        .with_context(|| format!("provision {}", provisioner.management_url()))?;
    info!(
        target: "cx::cli",
        url = %provisioner.management_url(),
        steps = report.steps.len(),
        "provisioning finished"
    );
    for step in report.rejected() {
        warn!(
            target: "cx::cli",
            kind = step.kind.as_str(),
            id = %step.id,
            status = step.status,
            "connector rejected request"
        );
    }

    if args.json {
        let value = serde_json::to_value(&report).context("serialize report")?;
        super::print_json(&value, true);
    } else {
        for step in &report.steps {
            println!("{:<20} {:<45} {}", step.kind.as_str(), step.id, step.status);
        }
    }
    Ok(report)
}
