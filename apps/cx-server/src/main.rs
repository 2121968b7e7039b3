use std::net::SocketAddr;

use cx_core::Config;
use tracing::{error, info};

mod access_log;
mod api;
mod app_state;
mod bootstrap;
mod http_client;
mod openapi;
mod router;

pub(crate) use app_state::AppState;

#[tokio::main]
async fn main() {
    match bootstrap::ensure_openapi_export() {
        Ok(Some(_)) => return,
        Ok(None) => {}
        Err(err) => {
            eprintln!("error: failed to write generated OPENAPI_OUT: {err}");
            std::process::exit(2);
        }
    }

    cx_otel::init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            error!("invalid configuration: {err}");
            std::process::exit(2);
        }
    };
    let http_cfg = match bootstrap::http_config(&config) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!("{err}");
            std::process::exit(2);
        }
    };
    let client = match http_client::client() {
        Ok(client) => client,
        Err(err) => {
            error!("failed to build http client: {err}");
            std::process::exit(1);
        }
    };

    let bootstrap::BootstrapOutput {
        router,
        state,
        provisioning,
    } = match bootstrap::build(&config, client).await {
        Ok(out) => out,
        Err(err) => {
            error!("{err:#}");
            std::process::exit(1);
        }
    };

    let app = bootstrap::attach_global_layers(bootstrap::attach_http_layers(
        router.with_state::<()>(state),
        http_cfg.concurrency_limit,
    ));

    let listener = tokio::net::TcpListener::bind(http_cfg.addr)
        .await
        .expect("bind server socket");
    info!(addr = %http_cfg.addr, "listening");

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal());

    if let Err(err) = server.await {
        error!("http server exited with error: {err}");
    }

    if let Some(handle) = provisioning {
        if !handle.is_finished() {
            info!("abandoning connector provisioning still in flight");
            handle.abort();
        }
    }
}

async fn shutdown_signal() {
    info!("shutdown signal listener active");
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("shutdown signal received");
}

#[cfg(test)]
mod http_tests {
    use super::*;
    use crate::router::paths;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        Router,
    };
    use cx_contract::{ContractModel, ValidationEngine};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::util::ServiceExt;

    const CONTRACT: &str = include_str!("../../../spec/openapi/quality-notifications.yaml");

    fn app() -> Router {
        let engine = ValidationEngine::new(ContractModel::parse(CONTRACT).expect("contract"));
        let (router, endpoints) = router::build_router();
        let state = AppState::new(Arc::new(engine)).with_endpoints(Arc::new(endpoints));
        bootstrap::attach_global_layers(bootstrap::attach_http_layers(
            router.with_state::<()>(state),
            16,
        ))
    }

    fn header() -> Value {
        json!({
            "messageId": "6f3c8d71-6c1b-4a3e-9a7b-3f0c2a1d9e10",
            "context": "QM-Alert",
            "sentDateTime": "2024-06-12T08:30:00Z",
            "senderBpn": "BPNL00000003AYRE",
            "receiverBpn": "BPNL00000003B2OM",
            "version": "2.0.0"
        })
    }

    fn receive_body() -> Value {
        json!({
            "header": header(),
            "content": {
                "notificationId": "urn:uuid:0d1e6b7a-3a3c-4c4f-8f57-5b0a0e7a9c11",
                "information": "Housing crack on batch 42",
                "listOfAffectedItems": [{"catenaXId": "urn:uuid:5b0a0e7a-0000-4000-8000-000000000042"}]
            }
        })
    }

    fn update_body() -> Value {
        json!({
            "header": header(),
            "content": {
                "notificationId": "urn:uuid:0d1e6b7a-3a3c-4c4f-8f57-5b0a0e7a9c11",
                "status": "ACCEPTED"
            }
        })
    }

    async fn post(app: Router, path: &str, body: impl Into<Body>, json: bool) -> (StatusCode, Vec<u8>) {
        let mut req = Request::builder().method("POST").uri(path);
        if json {
            req = req.header(header::CONTENT_TYPE, "application/json");
        }
        let resp = app
            .oneshot(req.body(body.into()).expect("request"))
            .await
            .expect("response");
        let status = resp.status();
        let bytes = resp.into_body().collect().await.expect("body").to_bytes();
        (status, bytes.to_vec())
    }

    async fn get_json(app: Router, path: &str) -> (StatusCode, Value) {
        let resp = app
            .oneshot(Request::builder().uri(path).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let status = resp.status();
        let bytes = resp.into_body().collect().await.expect("body").to_bytes();
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn receive_accepts_valid_notification_with_201() {
        let (status, body) = post(
            app(),
            paths::NOTIFICATIONS_RECEIVE,
            receive_body().to_string(),
            true,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn large_bodies_are_read_and_oversized_ones_rejected_with_400() {
        use crate::api::notifications::MAX_NOTIFICATION_BYTES;

        let padded = format!("{}{}", " ".repeat(3 * 1024 * 1024), receive_body());
        let (status, _) = post(app(), paths::NOTIFICATIONS_RECEIVE, padded, true).await;
        assert_eq!(status, StatusCode::CREATED);

        let oversized = " ".repeat(MAX_NOTIFICATION_BYTES + 1);
        let (status, _) = post(app(), paths::NOTIFICATIONS_UPDATE, oversized, true).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_accepts_valid_update_with_200() {
        let (status, body) = post(
            app(),
            paths::NOTIFICATIONS_UPDATE,
            update_body().to_string(),
            true,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn invalid_payloads_get_empty_400() {
        for (path, payload) in [
            (paths::NOTIFICATIONS_RECEIVE, json!({})),
            (paths::NOTIFICATIONS_UPDATE, json!({})),
            (paths::NOTIFICATIONS_UPDATE, receive_body()),
        ] {
            let (status, body) = post(app(), path, payload.to_string(), true).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{path}");
            assert!(body.is_empty());
        }
    }

    #[tokio::test]
    async fn malformed_and_missing_bodies_get_400() {
        let (status, _) = post(app(), paths::NOTIFICATIONS_RECEIVE, "{\"header\":", true).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = post(app(), paths::NOTIFICATIONS_RECEIVE, Body::empty(), true).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = post(app(), paths::NOTIFICATIONS_UPDATE, "null", true).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn content_type_is_not_required() {
        let (status, _) = post(
            app(),
            paths::NOTIFICATIONS_RECEIVE,
            receive_body().to_string(),
            false,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let (status, body) = get_json(app(), paths::HEALTHZ).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true}));
    }

    #[tokio::test]
    async fn about_lists_routes_and_contract_operations() {
        let (status, body) = get_json(app(), paths::ABOUT).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "cx-server");
        let endpoints: Vec<&str> = body["endpoints"]
            .as_array()
            .expect("endpoints")
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert!(endpoints.contains(&"POST /api/traceability/qualitynotifications/receive"));
        let operations = body["contract"]["operations"].as_array().expect("operations");
        assert!(operations.contains(&json!("POST /qualitynotifications/update")));
        assert_eq!(body["contract"]["openapi"], "3.0.3");
    }

    #[tokio::test]
    async fn openapi_json_describes_notification_routes() {
        let (status, body) = get_json(app(), paths::OPENAPI_JSON).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"][paths::NOTIFICATIONS_UPDATE]["post"].is_object());
    }
}
