use utoipa::{OpenApi, ToSchema};

#[allow(dead_code)]
#[derive(ToSchema)]
pub struct HealthOk {
    pub ok: bool,
}

#[allow(dead_code)]
#[derive(ToSchema)]
pub struct ContractInfo {
    #[schema(nullable, value_type = Option<String>)]
    pub source: Option<String>,
    pub title: String,
    pub openapi: String,
    #[schema(example = json!(["POST /qualitynotifications/receive"]))]
    pub operations: Vec<String>,
}

#[allow(dead_code)]
#[derive(ToSchema)]
pub struct AboutResponse {
    pub service: String,
    pub version: String,
    #[schema(example = json!(["GET /healthz", "GET /about"]))]
    pub endpoints: Vec<String>,
    pub contract: ContractInfo,
    pub validators_compiled: u64,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::meta::healthz,
        crate::api::meta::about,
        crate::api::meta::openapi_json,
        crate::api::notifications::receive_notification,
        crate::api::notifications::update_notification,
    ),
    components(schemas(HealthOk, ContractInfo, AboutResponse)),
    tags(
        (name = "Meta", description = "Service metadata"),
        (name = "Notifications", description = "Quality notification intake")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let paths = doc["paths"].as_object().unwrap();
        for path in [
            crate::router::paths::HEALTHZ,
            crate::router::paths::ABOUT,
            crate::router::paths::OPENAPI_JSON,
            crate::router::paths::NOTIFICATIONS_RECEIVE,
            crate::router::paths::NOTIFICATIONS_UPDATE,
        ] {
            assert!(paths.contains_key(path), "{path} missing");
        }
        assert!(doc["paths"][crate::router::paths::NOTIFICATIONS_RECEIVE]["post"]["responses"]
            .get("201")
            .is_some());
    }
}
