//! JSON-LD request bodies for the connector management API.

use cx_core::NotificationEndpoint;
use serde_json::{json, Value};

pub const ASSETS_PATH: &str = "/v3/assets";
pub const POLICY_DEFINITIONS_PATH: &str = "/v3/policydefinitions";
pub const CONTRACT_DEFINITIONS_PATH: &str = "/v3/contractdefinitions";

pub const POLICY_ID: &str = "traceability-policy";
pub const EDC_NAMESPACE: &str = "https://w3id.org/edc/v0.0.1/ns/";
pub const ASSET_ID_OPERAND: &str = "https://w3id.org/edc/v0.0.1/ns/id";

pub const FRAMEWORK_AGREEMENT: &str = "traceability:1.0";
pub const USAGE_PURPOSE: &str = "cx.core.industrycore:1";

/// One notification asset offered through the connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationAsset {
    pub asset_id: &'static str,
    pub dct_type: &'static str,
    pub contract_id: &'static str,
    pub endpoint: NotificationEndpoint,
}

/// Assets in registration order; contract definitions follow the same order.
pub const NOTIFICATION_ASSETS: [NotificationAsset; 4] = [
    NotificationAsset {
        asset_id: "qualityinvestigationnotification-receive",
        dct_type: "cx-taxo:ReceiveQualityInvestigationNotification",
        contract_id: "investigation-receive-contract-definition",
        endpoint: NotificationEndpoint::Receive,
    },
    NotificationAsset {
        asset_id: "qualityalertnotification-receipt",
        dct_type: "cx-taxo:ReceiveQualityAlertNotification",
        contract_id: "alert-receive-contract-definition",
        endpoint: NotificationEndpoint::Receive,
    },
    NotificationAsset {
        asset_id: "qualityinvestigationnotification-update",
        dct_type: "cx-taxo:UpdateQualityInvestigationNotification",
        contract_id: "investigation-update-contract-definition",
        endpoint: NotificationEndpoint::Update,
    },
    NotificationAsset {
        asset_id: "qualityalertnotification-update",
        dct_type: "cx-taxo:UpdateQualityAlertNotification",
        contract_id: "alert-update-contract-definition",
        endpoint: NotificationEndpoint::Update,
    },
];

/// Asset whose data address proxies POSTs to this service.
///
/// `api_key` lands in the private properties so the connector forwards it as
/// the `X-API-KEY` header.
pub fn asset_body(asset: &NotificationAsset, service_base_url: &str, api_key: &str) -> Value {
    let base_url = format!(
        "{}{}",
        service_base_url.trim_end_matches('/'),
        asset.endpoint.route_path()
    );
    json!({
        "@context": {
            "@vocab": EDC_NAMESPACE,
            "cx-common": "https://w3id.org/catenax/ontology/common#",
            "cx-taxo": "https://w3id.org/catenax/taxonomy#",
            "dct": "http://purl.org/dc/terms/"
        },
        "@type": "Asset",
        "@id": asset.asset_id,
        "dataAddress": {
            "@type": "DataAddress",
            "method": "POST",
            "type": "HttpData",
            "baseUrl": base_url,
            "proxyMethod": "true",
            "proxyBody": "true"
        },
        "properties": {
            "policy-id": POLICY_ID,
            "dct:type": { "@id": asset.dct_type },
            "description": "CAC test asset",
            "contenttype": "application/json",
            "cx-common:version": "1.2"
        },
        "privateProperties": {
            "header:X-API-KEY": api_key
        }
    })
}

fn odrl_eq(left: &str, right: &str) -> Value {
    json!({
        "odrl:leftOperand": left,
        "odrl:operator": { "@id": "odrl:eq" },
        "odrl:rightOperand": right
    })
}

pub fn policy_definition_body() -> Value {
    json!({
        "@context": {
            "@vocab": EDC_NAMESPACE,
            "odrl": "http://www.w3.org/ns/odrl/2/",
            "cx-policy": "https://w3id.org/catenax/policy/"
        },
        "@id": POLICY_ID,
        "policy": {
            "@type": "odrl:Set",
            "odrl:permission": {
                "odrl:action": {
                    "odrl:type": { "@id": "http://www.w3.org/ns/odrl/2/use" }
                },
                "odrl:constraint": {
                    "odrl:and": [
                        odrl_eq("cx-policy:FrameworkAgreement", FRAMEWORK_AGREEMENT),
                        odrl_eq("cx-policy:UsagePurpose", USAGE_PURPOSE)
                    ]
                }
            },
            "prohibition": [],
            "obligation": []
        }
    })
}

pub fn contract_definition_body(asset: &NotificationAsset) -> Value {
    json!({
        "@context": { "@vocab": EDC_NAMESPACE },
        "@id": asset.contract_id,
        "accessPolicyId": POLICY_ID,
        "contractPolicyId": POLICY_ID,
        "assetsSelector": {
            "@type": "CriterionDto",
            "operandLeft": ASSET_ID_OPERAND,
            "operator": "=",
            "operandRight": asset.asset_id
        }
    })
}
