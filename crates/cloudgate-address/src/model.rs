//! Locally tracked resource records

use cloudgate_cloud::{Record, Resource};
use serde::{Deserialize, Serialize};

/// An address allocated in the managed domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElasticIp {
    /// Backend floating IP id
    pub os_id: String,

    /// Public address, copied from the backend at allocation
    pub public_ip: String,

    /// Present iff the address is bound to a network interface
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association: Option<Association>,
}

impl ElasticIp {
    pub fn new(os_id: impl Into<String>, public_ip: impl Into<String>) -> Self {
        Self {
            os_id: os_id.into(),
            public_ip: public_ip.into(),
            association: None,
        }
    }

    pub fn is_associated(&self) -> bool {
        self.association.is_some()
    }
}

impl Resource for ElasticIp {
    const KIND: &'static str = "eipalloc";
}

/// Binding of an address to a network interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    /// Durable id of the bound network interface record
    pub network_interface_id: u64,

    /// Fixed address on that interface the floating IP targets
    pub private_ip_address: String,
}

/// A network interface tracked by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    /// Backend port id
    pub os_id: String,

    /// Durable id of the instance the interface is attached to
    #[serde(default)]
    pub instance_id: Option<u64>,

    pub private_ip_address: String,
}

impl Resource for NetworkInterface {
    const KIND: &'static str = "eni";
}

/// An instance tracked by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Backend server id
    pub os_id: String,
}

impl Resource for Instance {
    const KIND: &'static str = "i";
}

pub type AddressRecord = Record<ElasticIp>;
pub type NetworkInterfaceRecord = Record<NetworkInterface>;
pub type InstanceRecord = Record<Instance>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unassociated_serializes_without_association() {
        let address = ElasticIp::new("fip-1", "203.0.113.1");
        let value = serde_json::to_value(&address).unwrap();
        assert!(value.get("association").is_none());

        let back: ElasticIp = serde_json::from_value(value).unwrap();
        assert!(!back.is_associated());
    }

    #[test]
    fn test_association_pair_stored_together() {
        let mut address = ElasticIp::new("fip-1", "203.0.113.1");
        address.association = Some(Association {
            network_interface_id: 9,
            private_ip_address: "10.0.0.5".to_string(),
        });
        let value = serde_json::to_value(&address).unwrap();
        assert_eq!(value["association"]["network_interface_id"], 9);
        assert_eq!(value["association"]["private_ip_address"], "10.0.0.5");
    }
}
