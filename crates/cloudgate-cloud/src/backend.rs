//! Network backend trait definition

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Remote network backend abstraction
///
/// The gateway never talks to the backend SDK directly; every floating-IP,
/// network and port call goes through this trait so the lifecycle engine can
/// run against any implementation (CLI wrapper, HTTP client, test fake).
///
/// Implementations must report a missing object as
/// [`CloudError::ResourceNotFound`](crate::CloudError::ResourceNotFound).
#[async_trait]
pub trait NetworkBackend: Send + Sync {
    /// Returns the backend name (e.g., "openstack")
    fn name(&self) -> &str;

    /// Create a floating IP on the given external network
    async fn create_floating_ip(&self, network_id: &str) -> Result<FloatingIp>;

    /// Delete a floating IP. Fails with `ResourceNotFound` if already absent.
    async fn delete_floating_ip(&self, id: &str) -> Result<()>;

    /// Bind a floating IP to a port, or unbind it when `binding` is `None`
    async fn update_floating_ip_binding(&self, id: &str, binding: Option<&PortBinding>)
    -> Result<()>;

    /// Get a single floating IP
    async fn get_floating_ip(&self, id: &str) -> Result<FloatingIp>;

    /// List all floating IPs visible to the project
    async fn list_floating_ips(&self) -> Result<Vec<FloatingIp>>;

    /// List networks matching the filter
    async fn list_networks(&self, filter: &NetworkFilter) -> Result<Vec<Network>>;

    /// List all ports visible to the project
    async fn list_ports(&self) -> Result<Vec<Port>>;
}

/// Backend floating IP object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloatingIp {
    pub id: String,

    /// Public address owned by the backend
    pub floating_ip_address: String,

    /// Fixed address on the bound port, if any
    #[serde(default)]
    pub fixed_ip_address: Option<String>,

    /// Bound port, if any
    #[serde(default)]
    pub port_id: Option<String>,

    #[serde(default)]
    pub floating_network_id: Option<String>,
}

impl FloatingIp {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            floating_ip_address: address.into(),
            fixed_ip_address: None,
            port_id: None,
            floating_network_id: None,
        }
    }

    pub fn with_binding(mut self, binding: &PortBinding) -> Self {
        self.port_id = Some(binding.port_id.clone());
        self.fixed_ip_address = Some(binding.fixed_ip_address.clone());
        self
    }

    pub fn is_bound(&self) -> bool {
        self.port_id.is_some()
    }
}

/// Target of a floating IP binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    pub port_id: String,
    pub fixed_ip_address: String,
}

impl PortBinding {
    pub fn new(port_id: impl Into<String>, fixed_ip_address: impl Into<String>) -> Self {
        Self {
            port_id: port_id.into(),
            fixed_ip_address: fixed_ip_address.into(),
        }
    }
}

/// Backend network object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    pub name: String,

    /// Whether the network is externally routable
    #[serde(default)]
    pub router_external: bool,
}

/// Network search options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkFilter {
    pub name: Option<String>,
    pub router_external: Option<bool>,
}

impl NetworkFilter {
    /// Filter for the external network with the given name
    pub fn external(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            router_external: Some(true),
        }
    }

    pub fn matches(&self, network: &Network) -> bool {
        if let Some(name) = &self.name {
            if network.name != *name {
                return false;
            }
        }
        if let Some(external) = self.router_external {
            if network.router_external != external {
                return false;
            }
        }
        true
    }
}

/// Backend port object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub id: String,

    /// Backend id of the device (server) the port is attached to
    #[serde(default)]
    pub device_id: Option<String>,

    #[serde(default)]
    pub device_owner: Option<String>,
}
