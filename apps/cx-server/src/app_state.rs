use std::sync::Arc;

use cx_contract::ValidationEngine;

#[derive(Clone)]
pub(crate) struct AppState {
    engine: Arc<ValidationEngine>,
    endpoints: Arc<Vec<String>>,
}

impl AppState {
    pub fn new(engine: Arc<ValidationEngine>) -> Self {
        Self {
            engine,
            endpoints: Arc::new(Vec::new()),
        }
    }

    pub fn with_endpoints(mut self, endpoints: Arc<Vec<String>>) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn engine(&self) -> &ValidationEngine {
        &self.engine
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }
}
