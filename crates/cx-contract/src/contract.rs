use std::path::PathBuf;

use cx_core::HttpMethod;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::ContractError;

/// JSON-Schema dialect the contract's schema objects are written in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SchemaDialect {
    /// OpenAPI 3.0 schema objects (a Draft 4 superset).
    Draft4,
    /// OpenAPI 3.1 schema objects.
    Draft202012,
}

/// Parsed, immutable OpenAPI document.
#[derive(Debug, Clone)]
pub struct ContractModel {
    document: Value,
    version: String,
    dialect: SchemaDialect,
    source: Option<String>,
}

/// A request body resolved out of an operation, with the JSON pointer it lives at.
#[derive(Debug, Clone)]
pub struct RequestBody<'a> {
    pub pointer: String,
    pub value: &'a Value,
}

#[derive(Debug)]
enum Locator {
    Remote(url::Url),
    Local(PathBuf),
}

impl Locator {
    fn parse(raw: &str) -> Result<Self, ContractError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ContractError::InvalidLocator(raw.to_string()));
        }
        match url::Url::parse(trimmed) {
            Ok(url) => match url.scheme() {
                "http" | "https" => Ok(Locator::Remote(url)),
                "file" => url
                    .to_file_path()
                    .map(Locator::Local)
                    .map_err(|_| ContractError::InvalidLocator(raw.to_string())),
                // drive letters parse as one-letter schemes
                scheme if scheme.len() == 1 => Ok(Locator::Local(PathBuf::from(trimmed))),
                _ => Err(ContractError::InvalidLocator(raw.to_string())),
            },
            Err(_) => Ok(Locator::Local(PathBuf::from(trimmed))),
        }
    }
}

impl ContractModel {
    /// Fetches (http/https) or reads (file URL or path) the document and parses it.
    pub async fn load(client: &reqwest::Client, locator: &str) -> Result<Self, ContractError> {
        let raw = match Locator::parse(locator)? {
            Locator::Remote(url) => {
                debug!(target: "cx::contract", %url, "fetching OpenAPI contract");
                let fetch_err = |e: reqwest::Error| ContractError::Fetch {
                    locator: locator.to_string(),
                    message: e.to_string(),
                };
                let response = client.get(url).send().await.map_err(fetch_err)?;
                let status = response.status();
                if !status.is_success() {
                    return Err(ContractError::Status {
                        locator: locator.to_string(),
                        status: status.as_u16(),
                    });
                }
                response.text().await.map_err(fetch_err)?
            }
            Locator::Local(path) => {
                debug!(target: "cx::contract", path = %path.display(), "reading OpenAPI contract");
                tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|source| ContractError::Io { path, source })?
            }
        };
        let mut model = Self::parse(&raw)?;
        model.source = Some(locator.to_string());
        info!(
            target: "cx::contract",
            locator,
            version = %model.version,
            operations = model.operations().len(),
            "loaded OpenAPI contract"
        );
        Ok(model)
    }

    /// Parses JSON, falling back to YAML, and checks the document's structure.
    pub fn parse(raw: &str) -> Result<Self, ContractError> {
        let document = match serde_json::from_str::<Value>(raw) {
            Ok(value) => value,
            Err(_) => {
                let yaml: serde_yaml::Value =
                    serde_yaml::from_str(raw).map_err(|e| ContractError::Parse(e.to_string()))?;
                serde_json::to_value(yaml).map_err(|e| ContractError::Parse(e.to_string()))?
            }
        };
        Self::from_value(document)
    }

    pub fn from_value(mut document: Value) -> Result<Self, ContractError> {
        let issues = structural_issues(&document);
        if !issues.is_empty() {
            return Err(ContractError::Structure(issues));
        }
        let version = document["openapi"].as_str().unwrap_or_default().to_string();
        let dialect = if version.starts_with("3.0") {
            normalize_nullable(&mut document);
            SchemaDialect::Draft4
        } else {
            SchemaDialect::Draft202012
        };
        Ok(Self {
            document,
            version,
            dialect,
            source: None,
        })
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn dialect(&self) -> SchemaDialect {
        self.dialect
    }

    /// Locator the contract was loaded from, when it came through [`ContractModel::load`].
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn title(&self) -> &str {
        self.document["info"]["title"].as_str().unwrap_or_default()
    }

    /// Every declared operation, in document order of paths.
    pub fn operations(&self) -> Vec<(HttpMethod, String)> {
        let mut out = Vec::new();
        if let Some(paths) = self.document["paths"].as_object() {
            for (path, item) in paths {
                for method in HttpMethod::ALL {
                    if item.get(method.openapi_key()).is_some() {
                        out.push((method, path.clone()));
                    }
                }
            }
        }
        out
    }

    pub fn operation(&self, path: &str, method: HttpMethod) -> Result<&Value, ContractError> {
        let item = self.document["paths"]
            .get(path)
            .ok_or_else(|| ContractError::UnknownPath(path.to_string()))?;
        item.get(method.openapi_key())
            .ok_or_else(|| ContractError::UnknownOperation {
                method,
                path: path.to_string(),
            })
    }

    /// The operation's request body, following a local `$ref` if there is one.
    pub fn request_body(
        &self,
        path: &str,
        method: HttpMethod,
    ) -> Result<Option<RequestBody<'_>>, ContractError> {
        let operation = self.operation(path, method)?;
        let Some(body) = operation.get("requestBody") else {
            return Ok(None);
        };
        match body.get("$ref").and_then(Value::as_str) {
            Some(reference) => {
                let (pointer, value) = self.resolve_ref(reference)?;
                Ok(Some(RequestBody { pointer, value }))
            }
            None => {
                let pointer = format!(
                    "/paths/{}/{}/requestBody",
                    escape_pointer_token(path),
                    method.openapi_key()
                );
                Ok(Some(RequestBody {
                    pointer,
                    value: body,
                }))
            }
        }
    }

    fn resolve_ref(&self, reference: &str) -> Result<(String, &Value), ContractError> {
        let pointer = reference
            .strip_prefix('#')
            .ok_or_else(|| ContractError::UnresolvedRef(reference.to_string()))?;
        let target = self
            .document
            .pointer(pointer)
            .ok_or_else(|| ContractError::UnresolvedRef(reference.to_string()))?;
        Ok((pointer.to_string(), target))
    }
}

/// Escapes one JSON pointer reference token (RFC 6901).
pub fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn structural_issues(document: &Value) -> Vec<String> {
    let mut issues = Vec::new();
    let Some(root) = document.as_object() else {
        return vec!["document root must be an object".into()];
    };

    match root.get("openapi").and_then(Value::as_str) {
        Some(v) if v.starts_with("3.") => {}
        Some(v) => issues.push(format!("unsupported openapi version {v}")),
        None => issues.push("missing openapi version field".into()),
    }

    match root.get("info").and_then(Value::as_object) {
        Some(info) => {
            for field in ["title", "version"] {
                if !info.get(field).is_some_and(Value::is_string) {
                    issues.push(format!("info.{field} must be a string"));
                }
            }
        }
        None => issues.push("info must be an object".into()),
    }

    let Some(paths) = root.get("paths").and_then(Value::as_object) else {
        issues.push("paths must be an object".into());
        return issues;
    };
    for (path, item) in paths {
        if !path.starts_with('/') {
            issues.push(format!("path {path} must start with '/'"));
        }
        let Some(item) = item.as_object() else {
            issues.push(format!("path item {path} must be an object"));
            continue;
        };
        for method in HttpMethod::ALL {
            let Some(operation) = item.get(method.openapi_key()) else {
                continue;
            };
            let Some(operation) = operation.as_object() else {
                issues.push(format!("operation {method} {path} must be an object"));
                continue;
            };
            if let Some(body) = operation.get("requestBody") {
                issues.extend(request_body_issues(document, method, path, body));
            }
        }
    }
    issues
}

fn request_body_issues(document: &Value, method: HttpMethod, path: &str, body: &Value) -> Vec<String> {
    let mut issues = Vec::new();
    let resolved = match body.get("$ref").and_then(Value::as_str) {
        Some(reference) => match reference.strip_prefix('#').and_then(|p| document.pointer(p)) {
            Some(target) => target,
            None => {
                issues.push(format!(
                    "requestBody of {method} {path} references unknown {reference}"
                ));
                return issues;
            }
        },
        None => body,
    };
    match resolved.as_object() {
        Some(obj) => {
            if obj.get("content").is_some_and(|c| !c.is_object()) {
                issues.push(format!("requestBody.content of {method} {path} must be an object"));
            }
        }
        None => issues.push(format!("requestBody of {method} {path} must be an object")),
    }
    issues
}

/// Rewrites OpenAPI 3.0 `nullable: true` into a JSON-Schema type union.
fn normalize_nullable(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if map.get("nullable").and_then(Value::as_bool) == Some(true) {
                if let Some(Value::String(ty)) = map.get("type").cloned() {
                    map.insert("type".into(), json!([ty, "null"]));
                    if let Some(Value::Array(options)) = map.get_mut("enum") {
                        if !options.contains(&Value::Null) {
                            options.push(Value::Null);
                        }
                    }
                }
            }
            for child in map.values_mut() {
                normalize_nullable(child);
            }
        }
        Value::Array(items) => {
            for item in items {
                normalize_nullable(item);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Value {
        json!({
            "openapi": "3.0.3",
            "info": {"title": "t", "version": "1"},
            "paths": {
                "/things": {
                    "post": {
                        "requestBody": {
                            "content": {"application/json": {"schema": {
                                "type": "object",
                                "properties": {"note": {"type": "string", "nullable": true}}
                            }}}
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn accepts_minimal_document() {
        let model = ContractModel::from_value(minimal()).expect("valid");
        assert_eq!(model.version(), "3.0.3");
        assert_eq!(model.dialect(), SchemaDialect::Draft4);
        assert_eq!(model.operations(), vec![(HttpMethod::Post, "/things".to_string())]);
    }

    #[test]
    fn nullable_becomes_type_union() {
        let model = ContractModel::from_value(minimal()).unwrap();
        let note = model
            .document()
            .pointer("/paths/~1things/post/requestBody/content/application~1json/schema/properties/note/type")
            .unwrap();
        assert_eq!(note, &json!(["string", "null"]));
    }

    #[test]
    fn openapi_31_keeps_document_and_uses_2020_12() {
        let mut doc = minimal();
        doc["openapi"] = json!("3.1.0");
        let model = ContractModel::from_value(doc).unwrap();
        assert_eq!(model.dialect(), SchemaDialect::Draft202012);
        let note = model
            .document()
            .pointer("/paths/~1things/post/requestBody/content/application~1json/schema/properties/note/type")
            .unwrap();
        assert_eq!(note, &json!("string"));
    }

    #[test]
    fn collects_every_structural_issue() {
        let doc = json!({
            "openapi": "2.0",
            "info": {"title": 5},
            "paths": {
                "things": {},
                "/broken": {"post": "nope"},
                "/dangling": {"post": {"requestBody": {"$ref": "#/components/requestBodies/Missing"}}}
            }
        });
        let Err(ContractError::Structure(issues)) = ContractModel::from_value(doc) else {
            panic!("expected structure error");
        };
        let joined = issues.join("\n");
        assert!(joined.contains("unsupported openapi version 2.0"));
        assert!(joined.contains("info.title"));
        assert!(joined.contains("info.version"));
        assert!(joined.contains("path things must start with '/'"));
        assert!(joined.contains("operation POST /broken"));
        assert!(joined.contains("references unknown #/components/requestBodies/Missing"));
    }

    #[test]
    fn yaml_with_integer_response_keys_parses() {
        let raw = "openapi: 3.0.0\ninfo: {title: y, version: '1'}\npaths:\n  /a:\n    get:\n      responses:\n        200: {description: ok}\n";
        let model = ContractModel::parse(raw).expect("yaml parses");
        assert!(model.document()["paths"]["/a"]["get"]["responses"]["200"].is_object());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(
            ContractModel::parse("{ not: [valid"),
            Err(ContractError::Parse(_))
        ));
    }

    #[test]
    fn unknown_path_and_operation_are_distinguished() {
        let model = ContractModel::from_value(minimal()).unwrap();
        assert!(matches!(
            model.operation("/nothing", HttpMethod::Post),
            Err(ContractError::UnknownPath(_))
        ));
        assert!(matches!(
            model.operation("/things", HttpMethod::Get),
            Err(ContractError::UnknownOperation { .. })
        ));
    }

    #[test]
    fn locator_kinds() {
        assert!(matches!(
            Locator::parse("https://example.com/api.yaml").unwrap(),
            Locator::Remote(_)
        ));
        assert!(matches!(
            Locator::parse("spec/openapi/a.yaml").unwrap(),
            Locator::Local(_)
        ));
        assert!(matches!(Locator::parse("ftp://x/y").unwrap_err(), ContractError::InvalidLocator(_)));
        assert!(Locator::parse("  ").is_err());
    }
}
