//! Request and response shapes of the exposed address API

use crate::filter::Filter;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Address pool an address belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// Legacy pool, proxied without local tracking
    Standard,
    /// Managed pool, tracked locally and bindable to network interfaces
    Vpc,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Standard => "standard",
            Domain::Vpc => "vpc",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire representation of an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub public_ip: String,
    pub domain: Domain,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocation_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_ip_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_interface_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_interface_owner_id: Option<String>,
}

impl Address {
    /// An address of the legacy pool with no binding information
    pub fn standard(public_ip: impl Into<String>) -> Self {
        Self {
            public_ip: public_ip.into(),
            domain: Domain::Standard,
            allocation_id: None,
            private_ip_address: None,
            instance_id: None,
            association_id: None,
            network_interface_id: None,
            network_interface_owner_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociateAddressRequest {
    #[serde(default)]
    pub public_ip: Option<String>,
    #[serde(default)]
    pub allocation_id: Option<String>,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub network_interface_id: Option<String>,
    #[serde(default)]
    pub private_ip_address: Option<String>,
    #[serde(default)]
    pub allow_reassociation: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociateAddressResponse {
    #[serde(rename = "return")]
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisassociateAddressRequest {
    #[serde(default)]
    pub public_ip: Option<String>,
    #[serde(default)]
    pub association_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseAddressRequest {
    #[serde(default)]
    pub public_ip: Option<String>,
    #[serde(default)]
    pub allocation_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeAddressesRequest {
    #[serde(default)]
    pub public_ips: Vec<String>,
    #[serde(default)]
    pub allocation_ids: Vec<String>,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeAddressesResponse {
    pub addresses_set: Vec<Address>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_standard_address_wire_shape() {
        let value = serde_json::to_value(Address::standard("198.51.100.1")).unwrap();
        assert_eq!(value, json!({"publicIp": "198.51.100.1", "domain": "standard"}));
    }

    #[test]
    fn test_associate_response_wire_shape() {
        let response = AssociateAddressResponse {
            success: true,
            association_id: Some("eipassoc-00000001".to_string()),
        };
        assert_eq!(
            serde_json::to_value(response).unwrap(),
            json!({"return": true, "associationId": "eipassoc-00000001"})
        );
    }

    #[test]
    fn test_request_defaults() {
        let request: AssociateAddressRequest =
            serde_json::from_value(json!({"allocationId": "eipalloc-1", "instanceId": "i-1"}))
                .unwrap();
        assert!(!request.allow_reassociation);
        assert_eq!(request.public_ip, None);
    }
}
