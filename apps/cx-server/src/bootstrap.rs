use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use cx_contract::ValidationEngine;
use cx_core::Config;
use cx_edc::EdcProvisioner;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use utoipa::OpenApi;

use crate::{access_log, app_state::AppState, router::build_router};

pub(crate) struct BootstrapOutput {
    pub router: axum::Router<AppState>,
    pub state: AppState,
    pub provisioning: Option<JoinHandle<()>>,
}

/// Loads the contract and assembles routes and state.
///
/// Fails when the service settings are incomplete or the contract cannot be
/// loaded; the caller must not start serving in that case.
pub(crate) async fn build(
    config: &Config,
    client: reqwest::Client,
) -> anyhow::Result<BootstrapOutput> {
    config
        .validate_service()
        .context("incomplete service configuration")?;
    let locator = config.openapi_url()?;
    let engine = ValidationEngine::load(&client, locator)
        .await
        .with_context(|| format!("failed to initialize validator from {locator}"))?;

    let (router, endpoints) = build_router();
    for endpoint in &endpoints {
        debug!(target: "cx::http", %endpoint, "route registered");
    }
    let state = AppState::new(Arc::new(engine)).with_endpoints(Arc::new(endpoints));

    let provisioning = if config.edc_setup_on_start() {
        Some(spawn_provisioning(client, config)?)
    } else {
        None
    };

    Ok(BootstrapOutput {
        router,
        state,
        provisioning,
    })
}

fn spawn_provisioning(client: reqwest::Client, config: &Config) -> anyhow::Result<JoinHandle<()>> {
    let provisioner = EdcProvisioner::from_config(client, config)
        .context("edc.setup_on_start is set but the connector settings are incomplete")?;
    Ok(tokio::spawn(async move {
        match provisioner.setup_traceability_offer().await {
            Ok(report) if report.all_accepted() => {
                info!(target: "cx::edc", steps = report.steps.len(), "connector offer ready");
            }
            Ok(report) => {
                warn!(
                    target: "cx::edc",
                    rejected = report.rejected().count(),
                    "connector rejected part of the offer"
                );
            }
            Err(err) => {
                error!(target: "cx::edc", error = %err, "error setting up traceability offer");
            }
        }
    }))
}

pub(crate) fn attach_http_layers(
    router: axum::Router<()>,
    concurrency_limit: usize,
) -> axum::Router<()> {
    use tower::limit::ConcurrencyLimitLayer;
    use tower_http::trace::TraceLayer;

    router
        .layer(TraceLayer::new_for_http())
        .layer(ConcurrencyLimitLayer::new(concurrency_limit))
}

pub(crate) fn attach_global_layers(router: axum::Router<()>) -> axum::Router<()> {
    router.layer(axum::middleware::from_fn(access_log::access_log_mw))
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum HttpConfigError {
    #[error("invalid bind address {bind}:{port}")]
    InvalidBind { bind: String, port: u16 },
}

#[derive(Debug)]
pub(crate) struct HttpConfig {
    pub addr: SocketAddr,
    pub concurrency_limit: usize,
}

pub(crate) fn http_config(config: &Config) -> Result<HttpConfig, HttpConfigError> {
    let bind = config.bind();
    let port = config.port();
    let addr = format!("{}:{}", bind, port)
        .parse()
        .map_err(|_| HttpConfigError::InvalidBind {
            bind: bind.to_string(),
            port,
        })?;
    Ok(HttpConfig {
        addr,
        concurrency_limit: config.max_concurrency(),
    })
}

/// Writes the service's own OpenAPI document when `OPENAPI_OUT` is set.
pub(crate) fn ensure_openapi_export() -> Result<Option<String>, std::io::Error> {
    if let Ok(path) = std::env::var("OPENAPI_OUT") {
        export_openapi(&path)?;
        return Ok(Some(path));
    }
    Ok(None)
}

fn export_openapi(path: &str) -> Result<(), std::io::Error> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let yaml = crate::openapi::ApiDoc::openapi()
        .to_yaml()
        .map_err(std::io::Error::other)?;
    std::fs::write(path, yaml)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_config_uses_defaults() {
        let cfg = http_config(&Config::default()).unwrap();
        assert_eq!(cfg.addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(cfg.concurrency_limit, cx_core::DEFAULT_MAX_CONCURRENCY);
    }

    #[test]
    fn http_config_rejects_unparseable_bind() {
        let mut config = Config::default();
        config.service.bind = Some("not an address".into());
        let err = http_config(&config).unwrap_err();
        assert!(err.to_string().contains("not an address:8080"));
    }

    #[test]
    fn export_writes_yaml_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("openapi.yaml");
        export_openapi(path.to_str().unwrap()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("/api/traceability/qualitynotifications/receive"));
    }

    #[tokio::test]
    async fn build_fails_without_service_settings() {
        let err = build(&Config::default(), reqwest::Client::new())
            .await
            .err()
            .expect("missing settings");
        assert!(format!("{err:#}").contains("service.base_url"));
    }

    #[tokio::test]
    async fn build_loads_contract_and_records_routes() {
        let mut config = Config::default();
        config.service.base_url = Some("https://svc.example.com".into());
        config.service.api_key = Some("key".into());
        config.contract.openapi_url = Some(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../../spec/openapi/quality-notifications.yaml"
        )
        .into());
        let out = build(&config, reqwest::Client::new()).await.unwrap();
        assert!(out.provisioning.is_none());
        assert_eq!(out.state.endpoints().len(), 5);
        assert_eq!(out.state.engine().contract().version(), "3.0.3");
    }

    #[tokio::test]
    async fn build_fails_when_contract_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.service.base_url = Some("https://svc.example.com".into());
        config.service.api_key = Some("key".into());
        config.contract.openapi_url =
            Some(dir.path().join("absent.yaml").display().to_string());
        let err = build(&config, reqwest::Client::new())
            .await
            .err()
            .expect("contract missing");
        assert!(err.to_string().starts_with("failed to initialize validator"));
    }
}
