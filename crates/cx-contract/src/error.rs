use std::path::PathBuf;

use cx_core::HttpMethod;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("invalid contract locator: {0}")]
    InvalidLocator(String),
    #[error("failed to fetch contract from {locator}: {message}")]
    Fetch { locator: String, message: String },
    #[error("contract request to {locator} returned status {status}")]
    Status { locator: String, status: u16 },
    #[error("failed to read contract {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("contract is neither JSON nor YAML: {0}")]
    Parse(String),
    #[error("contract is not a valid OpenAPI 3 document: {}", .0.join("; "))]
    Structure(Vec<String>),
    #[error("path not found in OpenAPI contract: {0}")]
    UnknownPath(String),
    #[error("operation not found for {method} {path}")]
    UnknownOperation { method: HttpMethod, path: String },
    #[error("unresolvable reference {0}")]
    UnresolvedRef(String),
    #[error("failed to compile schema at {pointer}: {message}")]
    Compile { pointer: String, message: String },
}
