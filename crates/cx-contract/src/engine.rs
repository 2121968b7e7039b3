use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cx_core::{HttpMethod, NotificationEndpoint};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::contract::{escape_pointer_token, ContractModel};
use crate::error::ContractError;
use crate::result::{Diagnostic, ValidationResult};
use crate::schema::{BodySchema, JsonSchemaCompiler, SchemaCompiler};

/// Content type the synthetic request is validated under.
pub const REQUEST_CONTENT_TYPE: &str = "application/json";

/// Cache key: literal method and path pattern, no normalisation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationKey {
    pub method: HttpMethod,
    pub path: String,
}

impl OperationKey {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.method, self.path)
    }
}

enum BodyRule {
    Any,
    Schema {
        media_type: String,
        schema: Box<dyn BodySchema>,
    },
    UndeclaredContentType {
        declared: Vec<String>,
        content_pointer: String,
    },
}

/// Request-body validator compiled for one operation.
pub struct OperationValidator {
    key: OperationKey,
    body_required: bool,
    required_pointer: String,
    rule: BodyRule,
}

impl fmt::Debug for OperationValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationValidator")
            .field("key", &self.key)
            .field("body_required", &self.body_required)
            .field("media_type", &self.media_type())
            .finish()
    }
}

impl OperationValidator {
    pub fn key(&self) -> &OperationKey {
        &self.key
    }

    /// Media type whose schema is applied, if the operation declares one.
    pub fn media_type(&self) -> Option<&str> {
        match &self.rule {
            BodyRule::Schema { media_type, .. } => Some(media_type),
            _ => None,
        }
    }

    /// A `null` body fails a required request body outright; an optional one
    /// is still checked against the schema as the JSON value `null`.
    pub fn validate_body(&self, body: &Value) -> Vec<Diagnostic> {
        if body.is_null() && self.body_required {
            return vec![Diagnostic::new(
                "/",
                "request body is required",
                format!("#{}", self.required_pointer),
            )];
        }
        match &self.rule {
            BodyRule::Any => Vec::new(),
            BodyRule::Schema { schema, .. } => schema.violations(body),
            BodyRule::UndeclaredContentType {
                declared,
                content_pointer,
            } => vec![Diagnostic::new(
                "/",
                format!(
                    "content type '{REQUEST_CONTENT_TYPE}' is not declared for this operation (declared: {})",
                    declared.join(", ")
                ),
                format!("#{content_pointer}"),
            )],
        }
    }
}

/// Validates payloads against the request-body schemas of an OpenAPI contract.
///
/// Compiled validators are memoised per [`OperationKey`]; the contract never
/// changes, so entries are never evicted.
pub struct ValidationEngine {
    contract: Arc<ContractModel>,
    compiler: Arc<dyn SchemaCompiler>,
    cache: RwLock<HashMap<OperationKey, Arc<OperationValidator>>>,
    compiled: AtomicU64,
}

impl fmt::Debug for ValidationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationEngine")
            .field("contract", &self.contract.title())
            .field("cached", &self.cache.read().len())
            .finish()
    }
}

impl ValidationEngine {
    pub fn new(contract: ContractModel) -> Self {
        Self::with_compiler(contract, Arc::new(JsonSchemaCompiler))
    }

    pub fn with_compiler(contract: ContractModel, compiler: Arc<dyn SchemaCompiler>) -> Self {
        Self {
            contract: Arc::new(contract),
            compiler,
            cache: RwLock::new(HashMap::new()),
            compiled: AtomicU64::new(0),
        }
    }

    /// Loads the contract from `locator` and builds an engine over it.
    pub async fn load(client: &reqwest::Client, locator: &str) -> Result<Self, ContractError> {
        let contract = ContractModel::load(client, locator).await?;
        info!(target: "cx::contract", locator, "initialized validator with OpenAPI contract");
        Ok(Self::new(contract))
    }

    pub fn contract(&self) -> &ContractModel {
        &self.contract
    }

    /// Number of validators compiled so far (one per distinct key).
    pub fn compiled_validators(&self) -> u64 {
        self.compiled.load(Ordering::Relaxed)
    }

    pub fn validate(&self, path_pattern: &str, method: HttpMethod, body: &Value) -> ValidationResult {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.validator_for(path_pattern, method)
                .map(|validator| validator.validate_body(body))
        }));
        let result = match outcome {
            Ok(Ok(diagnostics)) if diagnostics.is_empty() => ValidationResult::Valid,
            Ok(Ok(diagnostics)) => ValidationResult::Invalid(diagnostics),
            Ok(Err(err)) => {
                error!(
                    target: "cx::contract",
                    %method,
                    path = path_pattern,
                    error = %err,
                    "unexpected validation error"
                );
                ValidationResult::Error(format!("validation error: {err}"))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(
                    target: "cx::contract",
                    %method,
                    path = path_pattern,
                    error = %message,
                    "schema engine fault during validation"
                );
                ValidationResult::Error(format!("validation error: {message}"))
            }
        };
        match &result {
            ValidationResult::Valid => {
                debug!(target: "cx::contract", %method, path = path_pattern, "validation successful")
            }
            ValidationResult::Invalid(diagnostics) => warn!(
                target: "cx::contract",
                %method,
                path = path_pattern,
                violations = diagnostics.len(),
                summary = %result.error_summary().trim_end(),
                "validation failed"
            ),
            ValidationResult::Error(_) => {}
        }
        result
    }

    /// Parses `raw` as JSON before validating; unparseable input yields `Error`.
    pub fn validate_bytes(&self, path_pattern: &str, method: HttpMethod, raw: &[u8]) -> ValidationResult {
        match serde_json::from_slice::<Value>(raw) {
            Ok(body) => self.validate(path_pattern, method, &body),
            Err(err) => {
                error!(
                    target: "cx::contract",
                    %method,
                    path = path_pattern,
                    error = %err,
                    "request body is not valid JSON"
                );
                ValidationResult::Error(format!("validation error: malformed JSON body: {err}"))
            }
        }
    }

    pub fn validate_receive(&self, body: &Value) -> ValidationResult {
        let endpoint = NotificationEndpoint::Receive;
        self.validate(endpoint.contract_path(), endpoint.method(), body)
    }

    pub fn validate_update(&self, body: &Value) -> ValidationResult {
        let endpoint = NotificationEndpoint::Update;
        self.validate(endpoint.contract_path(), endpoint.method(), body)
    }

    /// Raw-body variant bound to one of the service's notification endpoints.
    pub fn validate_endpoint(&self, endpoint: NotificationEndpoint, raw: &[u8]) -> ValidationResult {
        self.validate_bytes(endpoint.contract_path(), endpoint.method(), raw)
    }

    /// Returns the cached validator for the key, compiling it on first use.
    pub fn validator_for(
        &self,
        path_pattern: &str,
        method: HttpMethod,
    ) -> Result<Arc<OperationValidator>, ContractError> {
        let key = OperationKey::new(method, path_pattern);
        if let Some(hit) = self.cache.read().get(&key) {
            return Ok(Arc::clone(hit));
        }
        let mut cache = self.cache.write();
        if let Some(hit) = cache.get(&key) {
            return Ok(Arc::clone(hit));
        }
        let validator = Arc::new(self.compile(key.clone())?);
        self.compiled.fetch_add(1, Ordering::Relaxed);
        debug!(
            target: "cx::contract",
            key = %key,
            media_type = validator.media_type().unwrap_or("-"),
            "compiled operation validator"
        );
        cache.insert(key, Arc::clone(&validator));
        Ok(validator)
    }

    fn compile(&self, key: OperationKey) -> Result<OperationValidator, ContractError> {
        let Some(body) = self.contract.request_body(&key.path, key.method)? else {
            let required_pointer = format!(
                "/paths/{}/{}",
                escape_pointer_token(&key.path),
                key.method.openapi_key()
            );
            return Ok(OperationValidator {
                key,
                body_required: false,
                required_pointer,
                rule: BodyRule::Any,
            });
        };
        let body_required = body
            .value
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let required_pointer = format!("{}/required", body.pointer);
        let content_pointer = format!("{}/content", body.pointer);

        let rule = match body.value.get("content").and_then(Value::as_object) {
            None => BodyRule::Any,
            Some(content) if content.is_empty() => BodyRule::Any,
            Some(content) => match select_media_type(content) {
                None => BodyRule::UndeclaredContentType {
                    declared: content.keys().cloned().collect(),
                    content_pointer,
                },
                Some(media_type) => {
                    if content[media_type].get("schema").is_some() {
                        let pointer = format!(
                            "{content_pointer}/{}/schema",
                            escape_pointer_token(media_type)
                        );
                        let schema = self.compiler.compile(
                            self.contract.document(),
                            &pointer,
                            self.contract.dialect(),
                        )?;
                        BodyRule::Schema {
                            media_type: media_type.to_string(),
                            schema,
                        }
                    } else {
                        BodyRule::Any
                    }
                }
            },
        };

        Ok(OperationValidator {
            key,
            body_required,
            required_pointer,
            rule,
        })
    }
}

/// Picks the declared media type an `application/json` request matches.
fn select_media_type(content: &Map<String, Value>) -> Option<&str> {
    let rank = |key: &str| -> Option<u8> {
        let base = key
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if key == REQUEST_CONTENT_TYPE {
            Some(0)
        } else if base == REQUEST_CONTENT_TYPE {
            Some(1)
        } else if base.ends_with("+json") {
            Some(2)
        } else if base == "application/*" {
            Some(3)
        } else if base == "*/*" {
            Some(4)
        } else {
            None
        }
    };
    content
        .keys()
        .filter_map(|key| rank(key).map(|r| (r, key.as_str())))
        .min_by_key(|(r, _)| *r)
        .map(|(_, key)| key)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn content(keys: &[&str]) -> Map<String, Value> {
        keys.iter()
            .map(|k| (k.to_string(), json!({"schema": {}})))
            .collect()
    }

    #[test]
    fn media_type_preference_order() {
        assert_eq!(
            select_media_type(&content(&["*/*", "application/json"])),
            Some("application/json")
        );
        assert_eq!(
            select_media_type(&content(&["text/plain", "application/json; charset=utf-8"])),
            Some("application/json; charset=utf-8")
        );
        assert_eq!(
            select_media_type(&content(&["application/*", "application/ld+json"])),
            Some("application/ld+json")
        );
        assert_eq!(select_media_type(&content(&["*/*"])), Some("*/*"));
        assert_eq!(select_media_type(&content(&["text/plain", "application/xml"])), None);
    }

    #[test]
    fn panic_payloads_become_messages() {
        let caught = panic::catch_unwind(|| panic!("boom {}", 1)).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "boom 1");
        let caught = panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "static");
    }

    #[test]
    fn key_display_joins_method_and_path() {
        assert_eq!(
            OperationKey::new(HttpMethod::Post, "/qualitynotifications/receive").to_string(),
            "POST:/qualitynotifications/receive"
        );
    }
}
