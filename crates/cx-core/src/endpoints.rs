use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Prefix under which the service mounts its notification routes.
pub const API_PREFIX: &str = "/api/traceability";

/// HTTP methods an OpenAPI operation can be declared under.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 5] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Patch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }

    /// Key of the operation inside an OpenAPI path item.
    pub fn openapi_key(self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Delete => "delete",
            HttpMethod::Patch => "patch",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unsupported HTTP method: {0}")]
pub struct UnsupportedMethod(pub String);

impl FromStr for HttpMethod {
    type Err = UnsupportedMethod;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnsupportedMethod(raw.to_string()))
    }
}

/// The two notification operations the service exposes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NotificationEndpoint {
    Receive,
    Update,
}

impl NotificationEndpoint {
    pub const ALL: [NotificationEndpoint; 2] =
        [NotificationEndpoint::Receive, NotificationEndpoint::Update];

    /// Path as declared in the OpenAPI contract.
    pub fn contract_path(self) -> &'static str {
        match self {
            NotificationEndpoint::Receive => "/qualitynotifications/receive",
            NotificationEndpoint::Update => "/qualitynotifications/update",
        }
    }

    /// Path the HTTP service routes.
    pub fn route_path(self) -> &'static str {
        match self {
            NotificationEndpoint::Receive => "/api/traceability/qualitynotifications/receive",
            NotificationEndpoint::Update => "/api/traceability/qualitynotifications/update",
        }
    }

    pub fn method(self) -> HttpMethod {
        HttpMethod::Post
    }

    /// Status code answered for a valid payload.
    pub fn success_status(self) -> u16 {
        match self {
            NotificationEndpoint::Receive => 201,
            NotificationEndpoint::Update => 200,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NotificationEndpoint::Receive => "receive",
            NotificationEndpoint::Update => "update",
        }
    }
}

impl FromStr for NotificationEndpoint {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "receive" => Ok(NotificationEndpoint::Receive),
            "update" => Ok(NotificationEndpoint::Update),
            other => Err(format!("unknown notification endpoint: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parsing_is_case_insensitive() {
        assert_eq!("post".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
        assert_eq!(" Patch ".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        assert!("HEAD".parse::<HttpMethod>().is_err());
        assert!("OPTIONS".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn route_paths_extend_contract_paths() {
        for endpoint in NotificationEndpoint::ALL {
            assert_eq!(
                endpoint.route_path(),
                format!("{API_PREFIX}{}", endpoint.contract_path())
            );
            assert_eq!(endpoint.method(), HttpMethod::Post);
        }
        assert_eq!(NotificationEndpoint::Receive.success_status(), 201);
        assert_eq!(NotificationEndpoint::Update.success_status(), 200);
    }
}
