use std::path::{Path, PathBuf};

use jsonschema::{validator_for, Validator};
use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_CONFIG_PATH: &str = "config/cx.toml";
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_CONCURRENCY: usize = 1024;
pub const DEFAULT_EDC_MANAGEMENT_URL: &str = "https://cac-testbed-edc.int.catena-x.net/management";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("config does not match schema: {}", .0.join(", "))]
    Schema(Vec<String>),
    #[error("invalid {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
    #[error("missing required setting {0}")]
    Missing(&'static str),
}

/// Settings describing this service as seen by its callers.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Public base URL of this service, e.g. <https://traceability.example.com>
    #[serde(default)]
    pub base_url: Option<String>,
    /// API key callers present; also registered with the connector assets.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub bind: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    /// Upper bound of concurrently served requests.
    #[serde(default)]
    pub max_concurrency: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ContractConfig {
    /// Locator of the OpenAPI document: http(s) URL, file URL or path.
    #[serde(default)]
    pub openapi_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct EdcConfig {
    /// Management API root of the data-space connector.
    #[serde(default)]
    pub management_url: Option<String>,
    #[serde(default)]
    pub management_api_key: Option<String>,
    /// Register assets, policy and contracts when the server starts.
    #[serde(default)]
    pub setup_on_start: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub contract: ContractConfig,
    #[serde(default)]
    pub edc: EdcConfig,
}

static CONFIG_SCHEMA: Lazy<Validator> = Lazy::new(|| {
    let schema = schemars::schema_for!(Config);
    let schema_value = serde_json::to_value(&schema).expect("schema value");
    validator_for(&schema_value).expect("valid schema")
});

/// Returns the JSON schema describing the configuration file.
///
/// # Panics
///
/// Panics if schema generation fails; this indicates a programming error.
pub fn config_schema_json() -> serde_json::Value {
    let schema = schemars::schema_for!(Config);
    serde_json::to_value(&schema).expect("schema json")
}

pub fn write_schema_file(path: &Path) -> std::io::Result<()> {
    let schema_json = config_schema_json();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&schema_json)?)
}

pub fn parse_config(content: &str, origin: &Path) -> Result<Config, ConfigError> {
    let parse_err = |message: String| ConfigError::Parse {
        path: origin.to_path_buf(),
        message,
    };
    let raw: toml::Value = toml::from_str(content).map_err(|e| parse_err(e.to_string()))?;
    let json_value = serde_json::to_value(&raw).map_err(|e| parse_err(e.to_string()))?;
    let validation_errors: Vec<String> = CONFIG_SCHEMA
        .iter_errors(&json_value)
        .map(|e| e.to_string())
        .collect();
    if !validation_errors.is_empty() {
        return Err(ConfigError::Schema(validation_errors));
    }
    toml::from_str(content).map_err(|e| parse_err(e.to_string()))
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content, path)
}

impl Config {
    /// Loads the config file named by `CX_CONFIG` (or the default path when it
    /// exists) and applies environment overrides on top.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Like [`Config::load`], with an explicit file taking precedence over `CX_CONFIG`.
    pub fn load_from(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut cfg = match resolve_config_path(explicit) {
            Some(path) => {
                debug!(target: "cx::config", path = %path.display(), "loading config file");
                load_config(&path)?
            }
            None => Config::default(),
        };
        cfg.apply_env_overrides_with(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    /// Overrides file values with non-empty variables returned by `lookup`.
    pub fn apply_env_overrides_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get("CX_BASE_URL") {
            self.service.base_url = Some(v);
        }
        if let Some(v) = get("CX_API_KEY") {
            self.service.api_key = Some(v);
        }
        if let Some(v) = get("CX_BIND") {
            self.service.bind = Some(v);
        }
        if let Some(v) = get("CX_PORT") {
            let port = v.parse().map_err(|_| ConfigError::InvalidEnv {
                key: "CX_PORT",
                value: v.clone(),
            })?;
            self.service.port = Some(port);
        }
        if let Some(v) = get("CX_HTTP_MAX_CONC") {
            let limit = v.parse().map_err(|_| ConfigError::InvalidEnv {
                key: "CX_HTTP_MAX_CONC",
                value: v.clone(),
            })?;
            self.service.max_concurrency = Some(limit);
        }
        if let Some(v) = get("CX_OPENAPI_SPEC_URL") {
            self.contract.openapi_url = Some(v);
        }
        if let Some(v) = get("CX_EDC_MANAGEMENT_URL") {
            self.edc.management_url = Some(v);
        }
        if let Some(v) = get("CX_EDC_MANAGEMENT_API_KEY") {
            self.edc.management_api_key = Some(v);
        }
        if let Some(v) = get("CX_EDC_SETUP_ON_START") {
            self.edc.setup_on_start = Some(parse_flag(&v).ok_or(ConfigError::InvalidEnv {
                key: "CX_EDC_SETUP_ON_START",
                value: v.clone(),
            })?);
        }
        Ok(())
    }

    /// Checks the settings the HTTP service cannot start without.
    pub fn validate_service(&self) -> Result<(), ConfigError> {
        self.base_url()?;
        self.api_key()?;
        self.openapi_url()?;
        Ok(())
    }

    /// Checks the settings the provisioning routine needs.
    pub fn validate_edc(&self) -> Result<(), ConfigError> {
        self.base_url()?;
        self.api_key()?;
        self.edc_management_api_key()?;
        Ok(())
    }

    pub fn base_url(&self) -> Result<&str, ConfigError> {
        required(&self.service.base_url, "service.base_url (CX_BASE_URL)")
    }

    pub fn api_key(&self) -> Result<&str, ConfigError> {
        required(&self.service.api_key, "service.api_key (CX_API_KEY)")
    }

    pub fn openapi_url(&self) -> Result<&str, ConfigError> {
        required(
            &self.contract.openapi_url,
            "contract.openapi_url (CX_OPENAPI_SPEC_URL)",
        )
    }

    pub fn edc_management_api_key(&self) -> Result<&str, ConfigError> {
        required(
            &self.edc.management_api_key,
            "edc.management_api_key (CX_EDC_MANAGEMENT_API_KEY)",
        )
    }

    pub fn edc_management_url(&self) -> &str {
        self.edc
            .management_url
            .as_deref()
            .unwrap_or(DEFAULT_EDC_MANAGEMENT_URL)
    }

    pub fn edc_setup_on_start(&self) -> bool {
        self.edc.setup_on_start.unwrap_or(false)
    }

    pub fn bind(&self) -> &str {
        self.service.bind.as_deref().unwrap_or(DEFAULT_BIND)
    }

    pub fn port(&self) -> u16 {
        self.service.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn max_concurrency(&self) -> usize {
        self.service
            .max_concurrency
            .unwrap_or(DEFAULT_MAX_CONCURRENCY)
            .max(1)
    }
}

fn required<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = std::env::var("CX_CONFIG").ok().filter(|v| !v.trim().is_empty()) {
        return Some(PathBuf::from(path));
    }
    let default = PathBuf::from(DEFAULT_CONFIG_PATH);
    default.exists().then_some(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::env;
    use std::collections::HashMap;
    use std::io::Write as _;

    const SAMPLE: &str = r#"
[service]
base_url = "https://traceability.example.com"
api_key = "file-key"
port = 9000

[contract]
openapi_url = "spec/openapi/quality-notifications.yaml"

[edc]
management_api_key = "mgmt-key"
"#;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parses_file_and_fills_defaults() {
        let cfg = parse_config(SAMPLE, Path::new("inline.toml")).expect("parse");
        assert_eq!(cfg.base_url().unwrap(), "https://traceability.example.com");
        assert_eq!(cfg.port(), 9000);
        assert_eq!(cfg.bind(), DEFAULT_BIND);
        assert_eq!(cfg.edc_management_url(), DEFAULT_EDC_MANAGEMENT_URL);
        assert!(!cfg.edc_setup_on_start());
        cfg.validate_service().expect("service settings complete");
        cfg.validate_edc().expect("edc settings complete");
    }

    #[test]
    fn unknown_keys_fail_schema_check() {
        let err = parse_config("[service]\nbase_urll = \"x\"\n", Path::new("typo.toml"))
            .expect_err("typo must be rejected");
        assert!(matches!(err, ConfigError::Schema(_)), "got {err:?}");
    }

    #[test]
    fn env_overrides_win_over_file_values() {
        let mut cfg = parse_config(SAMPLE, Path::new("inline.toml")).unwrap();
        cfg.apply_env_overrides_with(lookup(&[
            ("CX_API_KEY", "env-key"),
            ("CX_PORT", "8181"),
            ("CX_EDC_SETUP_ON_START", "yes"),
            ("CX_BASE_URL", "   "),
        ]))
        .unwrap();
        assert_eq!(cfg.api_key().unwrap(), "env-key");
        assert_eq!(cfg.port(), 8181);
        assert!(cfg.edc_setup_on_start());
        // blank values leave the file setting in place
        assert_eq!(cfg.base_url().unwrap(), "https://traceability.example.com");
    }

    #[test]
    fn invalid_env_values_are_reported() {
        let mut cfg = Config::default();
        let err = cfg
            .apply_env_overrides_with(lookup(&[("CX_PORT", "eighty")]))
            .expect_err("port must be numeric");
        assert!(matches!(err, ConfigError::InvalidEnv { key: "CX_PORT", .. }));
    }

    #[test]
    fn missing_required_settings_are_named() {
        let cfg = Config::default();
        match cfg.validate_service() {
            Err(ConfigError::Missing(name)) => assert!(name.contains("base_url")),
            other => panic!("unexpected {other:?}"),
        }
        let mut cfg = parse_config(SAMPLE, Path::new("inline.toml")).unwrap();
        cfg.edc.management_api_key = None;
        match cfg.validate_edc() {
            Err(ConfigError::Missing(name)) => assert!(name.contains("management_api_key")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn load_reads_cx_config_and_environment() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let mut guard = env::guard();
        guard.set("CX_CONFIG", &file.path().display().to_string());
        guard.set("CX_OPENAPI_SPEC_URL", "https://contracts.example.com/notifications.yaml");
        guard.clear_keys(&["CX_API_KEY", "CX_PORT", "CX_BASE_URL", "CX_EDC_SETUP_ON_START"]);

        let cfg = Config::load().expect("load");
        assert_eq!(
            cfg.openapi_url().unwrap(),
            "https://contracts.example.com/notifications.yaml"
        );
        assert_eq!(cfg.api_key().unwrap(), "file-key");
    }

    #[test]
    fn schema_file_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schemas/config.json");
        write_schema_file(&path).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(written["properties"]["service"].is_object());
    }
}
