//! Shared configuration and endpoint vocabulary for the traceability
//! notification service.

mod config;
pub mod endpoints;

pub use config::{
    config_schema_json, load_config, parse_config, write_schema_file, Config, ConfigError,
    ContractConfig, EdcConfig, ServiceConfig, DEFAULT_BIND, DEFAULT_CONFIG_PATH,
    DEFAULT_EDC_MANAGEMENT_URL, DEFAULT_MAX_CONCURRENCY, DEFAULT_PORT,
};
pub use endpoints::{HttpMethod, NotificationEndpoint, API_PREFIX};
