//! OpenAPI contract model and request-body validation engine.
//!
//! A [`ContractModel`] is loaded once and never mutated; a
//! [`ValidationEngine`] compiles one validator per `(method, path)` on first
//! use and reports each payload as a [`ValidationResult`].

mod contract;
mod engine;
mod error;
mod result;
mod schema;

pub use contract::{escape_pointer_token, ContractModel, RequestBody, SchemaDialect};
pub use engine::{OperationKey, OperationValidator, ValidationEngine, REQUEST_CONTENT_TYPE};
pub use error::ContractError;
pub use result::{Diagnostic, ValidationFailure, ValidationResult};
pub use schema::{BodySchema, JsonSchemaCompiler, SchemaCompiler};
