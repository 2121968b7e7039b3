use std::mem;

use axum::{
    handler::Handler,
    routing::{get, post},
    Router,
};

use crate::{api, AppState};

/// Router that remembers every `METHOD path` it registers.
pub(crate) struct RouterBuilder {
    router: Router<AppState>,
    endpoints: Vec<String>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            endpoints: Vec::new(),
        }
    }

    fn record(&mut self, method: &str, path: &'static str) {
        self.endpoints.push(format!("{} {}", method, path));
    }

    pub fn route_get<H, T>(&mut self, path: &'static str, handler: H) -> &mut Self
    where
        H: Handler<T, AppState> + Clone + 'static,
        T: Send + 'static,
    {
        self.record("GET", path);
        let router = mem::take(&mut self.router);
        self.router = router.route(path, get(handler));
        self
    }

    pub fn route_post<H, T>(&mut self, path: &'static str, handler: H) -> &mut Self
    where
        H: Handler<T, AppState> + Clone + 'static,
        T: Send + 'static,
    {
        self.record("POST", path);
        let router = mem::take(&mut self.router);
        self.router = router.route(path, post(handler));
        self
    }

    pub fn build(self) -> (Router<AppState>, Vec<String>) {
        (self.router, self.endpoints)
    }
}

pub(crate) mod paths {
    pub const HEALTHZ: &str = "/healthz";
    pub const ABOUT: &str = "/about";
    pub const OPENAPI_JSON: &str = "/openapi.json";
    pub const NOTIFICATIONS_RECEIVE: &str = "/api/traceability/qualitynotifications/receive";
    pub const NOTIFICATIONS_UPDATE: &str = "/api/traceability/qualitynotifications/update";
}

pub(crate) fn build_router() -> (Router<AppState>, Vec<String>) {
    let mut builder = RouterBuilder::new();
    builder.route_get(paths::HEALTHZ, api::meta::healthz);
    builder.route_get(paths::ABOUT, api::meta::about);
    builder.route_get(paths::OPENAPI_JSON, api::meta::openapi_json);
    builder.route_post(
        paths::NOTIFICATIONS_RECEIVE,
        api::notifications::receive_notification,
    );
    builder.route_post(
        paths::NOTIFICATIONS_UPDATE,
        api::notifications::update_notification,
    );
    builder.build()
}
