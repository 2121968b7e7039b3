use jsonschema::{Draft, Validator};
use serde_json::Value;

use crate::contract::SchemaDialect;
use crate::error::ContractError;
use crate::result::Diagnostic;

/// A compiled request-body schema.
pub trait BodySchema: Send + Sync {
    fn violations(&self, body: &Value) -> Vec<Diagnostic>;
}

/// Turns the schema at `pointer` inside `document` into a [`BodySchema`].
pub trait SchemaCompiler: Send + Sync {
    fn compile(
        &self,
        document: &Value,
        pointer: &str,
        dialect: SchemaDialect,
    ) -> Result<Box<dyn BodySchema>, ContractError>;
}

/// [`SchemaCompiler`] backed by the `jsonschema` crate.
///
/// The whole contract document becomes the root schema with a `$ref` to the
/// operation's schema, so `#/components/...` references resolve against it.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSchemaCompiler;

struct JsonSchemaBody {
    validator: Validator,
    document: Value,
    pointer: String,
}

impl SchemaDialect {
    fn draft(self) -> Draft {
        match self {
            SchemaDialect::Draft4 => Draft::Draft4,
            SchemaDialect::Draft202012 => Draft::Draft202012,
        }
    }
}

impl SchemaCompiler for JsonSchemaCompiler {
    fn compile(
        &self,
        document: &Value,
        pointer: &str,
        dialect: SchemaDialect,
    ) -> Result<Box<dyn BodySchema>, ContractError> {
        let mut root = document.clone();
        let Value::Object(map) = &mut root else {
            return Err(ContractError::Compile {
                pointer: pointer.to_string(),
                message: "contract root is not an object".into(),
            });
        };
        map.insert(
            "$ref".into(),
            Value::String(format!("#{}", encode_fragment(pointer))),
        );
        let validator = jsonschema::options()
            .with_draft(dialect.draft())
            .build(&root)
            .map_err(|e| ContractError::Compile {
                pointer: pointer.to_string(),
                message: e.to_string(),
            })?;
        Ok(Box::new(JsonSchemaBody {
            validator,
            document: root,
            pointer: pointer.to_string(),
        }))
    }
}

impl BodySchema for JsonSchemaBody {
    fn violations(&self, body: &Value) -> Vec<Diagnostic> {
        self.validator
            .iter_errors(body)
            .map(|error| {
                let instance = error.instance_path.to_string();
                let location = if instance.is_empty() {
                    "/".to_string()
                } else {
                    instance
                };
                let schema_location = self.keyword_location(&error.schema_path.to_string());
                Diagnostic::new(location, error.to_string(), schema_location)
            })
            .collect()
    }
}

impl JsonSchemaBody {
    /// Maps an evaluation path onto the contract, following every local
    /// `$ref` it passes through.
    fn keyword_location(&self, schema_path: &str) -> String {
        let rest = schema_path.strip_prefix("/$ref").unwrap_or(schema_path);
        let mut base = self.pointer.clone();
        for token in rest.split('/').skip(1) {
            if token == "$ref" {
                if let Some(target) = self.local_ref_target(&base) {
                    base = target;
                    continue;
                }
            }
            base.push('/');
            base.push_str(token);
        }
        format!("#{base}")
    }

    fn local_ref_target(&self, pointer: &str) -> Option<String> {
        let reference = self.document.pointer(pointer)?.get("$ref")?.as_str()?;
        let target = decode_fragment(reference.strip_prefix('#')?);
        self.document.pointer(&target).map(|_| target)
    }
}

/// Percent-encodes characters a URI fragment cannot carry verbatim.
fn encode_fragment(pointer: &str) -> String {
    let mut out = String::with_capacity(pointer.len());
    for ch in pointer.chars() {
        match ch {
            'A'..='Z' | 'a'..='z' | '0'..='9' => out.push(ch),
            '-' | '.' | '_' | '~' | '/' | '!' | '$' | '&' | '\'' | '(' | ')' | '*' | '+' | ','
            | ';' | '=' | ':' | '@' => out.push(ch),
            other => {
                let mut buf = [0u8; 4];
                for byte in other.encode_utf8(&mut buf).bytes() {
                    out.push_str(&format!("%{byte:02X}"));
                }
            }
        }
    }
    out
}

fn decode_fragment(fragment: &str) -> String {
    let bytes = fragment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let Some(Ok(byte)) = fragment.get(i + 1..i + 3).map(|hex| u8::from_str_radix(hex, 16)) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
