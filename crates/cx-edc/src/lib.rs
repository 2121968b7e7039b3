//! Registers the notification endpoints with a data-space connector.
//!
//! [`EdcProvisioner::setup_traceability_offer`] creates four assets, one
//! usage policy and four contract definitions through the connector's
//! management API. Rejections are logged and the sequence carries on; a
//! transport failure stops it.

mod error;
pub mod templates;

use cx_core::Config;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

pub use error::EdcError;
use templates::{
    asset_body, contract_definition_body, policy_definition_body, ASSETS_PATH,
    CONTRACT_DEFINITIONS_PATH, NOTIFICATION_ASSETS, POLICY_DEFINITIONS_PATH, POLICY_ID,
};

pub const API_KEY_HEADER: &str = "X-API-KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Asset,
    PolicyDefinition,
    ContractDefinition,
}

impl StepKind {
    fn path(self) -> &'static str {
        match self {
            StepKind::Asset => ASSETS_PATH,
            StepKind::PolicyDefinition => POLICY_DEFINITIONS_PATH,
            StepKind::ContractDefinition => CONTRACT_DEFINITIONS_PATH,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::Asset => "asset",
            StepKind::PolicyDefinition => "policy_definition",
            StepKind::ContractDefinition => "contract_definition",
        }
    }
}

/// A management API call that got an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionStep {
    pub kind: StepKind,
    pub id: String,
    pub status: u16,
}

impl ProvisionStep {
    pub fn accepted(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
    pub steps: Vec<ProvisionStep>,
}

impl ProvisionReport {
    pub fn all_accepted(&self) -> bool {
        self.steps.iter().all(ProvisionStep::accepted)
    }

    pub fn rejected(&self) -> impl Iterator<Item = &ProvisionStep> {
        self.steps.iter().filter(|step| !step.accepted())
    }
}

struct PlannedStep {
    kind: StepKind,
    id: String,
    body: Value,
}

#[derive(Debug, Clone)]
pub struct EdcProvisioner {
    client: reqwest::Client,
    management_url: String,
    management_api_key: String,
    service_base_url: String,
    service_api_key: String,
}

impl EdcProvisioner {
    pub fn new(
        client: reqwest::Client,
        management_url: impl Into<String>,
        management_api_key: impl Into<String>,
        service_base_url: impl Into<String>,
        service_api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            management_url: management_url.into().trim_end_matches('/').to_string(),
            management_api_key: management_api_key.into(),
            service_base_url: service_base_url.into(),
            service_api_key: service_api_key.into(),
        }
    }

    /// Fails when the base URL, service API key or management API key is unset.
    pub fn from_config(client: reqwest::Client, config: &Config) -> Result<Self, EdcError> {
        config.validate_edc()?;
        Ok(Self::new(
            client,
            config.edc_management_url(),
            config.edc_management_api_key()?,
            config.base_url()?,
            config.api_key()?,
        ))
    }

    pub fn management_url(&self) -> &str {
        &self.management_url
    }

    fn plan(&self) -> Vec<PlannedStep> {
        let mut steps = Vec::with_capacity(NOTIFICATION_ASSETS.len() * 2 + 1);
        for asset in &NOTIFICATION_ASSETS {
            steps.push(PlannedStep {
                kind: StepKind::Asset,
                id: asset.asset_id.to_string(),
                body: asset_body(asset, &self.service_base_url, &self.service_api_key),
            });
        }
        steps.push(PlannedStep {
            kind: StepKind::PolicyDefinition,
            id: POLICY_ID.to_string(),
            body: policy_definition_body(),
        });
        for asset in &NOTIFICATION_ASSETS {
            steps.push(PlannedStep {
                kind: StepKind::ContractDefinition,
                id: asset.contract_id.to_string(),
                body: contract_definition_body(asset),
            });
        }
        steps
    }

    /// Issues the nine management calls in order.
    pub async fn setup_traceability_offer(&self) -> Result<ProvisionReport, EdcError> {
        info!(target: "cx::edc", management_url = %self.management_url, "setting up traceability offer");
        let mut report = ProvisionReport::default();
        for step in self.plan() {
            match self.send(&step).await {
                Ok(status) => report.steps.push(ProvisionStep {
                    kind: step.kind,
                    id: step.id,
                    status,
                }),
                Err(err) => {
                    error!(
                        target: "cx::edc",
                        kind = step.kind.as_str(),
                        id = %step.id,
                        error = %err,
                        completed = report.steps.len(),
                        "provisioning aborted"
                    );
                    return Err(err);
                }
            }
        }
        info!(
            target: "cx::edc",
            steps = report.steps.len(),
            rejected = report.rejected().count(),
            "traceability offer provisioned"
        );
        Ok(report)
    }

    async fn send(&self, step: &PlannedStep) -> Result<u16, EdcError> {
        let url = format!("{}{}", self.management_url, step.kind.path());
        let transport = |source: reqwest::Error| EdcError::Transport {
            step: format!("{} {}", step.kind.as_str(), step.id),
            url: url.clone(),
            source,
        };
        info!(target: "cx::edc", %url, kind = step.kind.as_str(), id = %step.id, "sending management request");
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, &self.management_api_key)
            .json(&step.body)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        info!(
            target: "cx::edc",
            kind = step.kind.as_str(),
            id = %step.id,
            status = status.as_u16(),
            accepted = status.is_success(),
            %body,
            "management response"
        );
        Ok(status.as_u16())
    }
}
