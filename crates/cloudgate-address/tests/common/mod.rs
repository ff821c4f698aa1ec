#![allow(dead_code)]

use async_trait::async_trait;
use cloudgate_address::ids::{self, Kind};
use cloudgate_address::{
    Address, AddressEngine, AssociateAddressRequest, AssociateAddressResponse, EngineSettings,
    Instance, InstanceRecord, LegacyAddressApi, NetworkInterface, NetworkInterfaceRecord,
};
use cloudgate_cloud::{
    CloudError, FloatingIp, Item, MemoryStore, Network, NetworkBackend, NetworkFilter, Port,
    PortBinding, RecordStore, RecordStoreExt, Result,
};
use std::sync::{Arc, Mutex};

pub const EXTERNAL_NETWORK: &str = "public";
pub const PROJECT_ID: &str = "project-1";

/// Association id an allocation id maps to
pub fn association_of(allocation_id: &str) -> String {
    let id = ids::decode_as(allocation_id, Kind::Allocation).unwrap();
    ids::encode(id, Kind::Association)
}

/// How an injected backend or store failure looks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    NotFound,
    Api,
}

impl Failure {
    fn error(self, what: &str) -> CloudError {
        match self {
            Failure::NotFound => CloudError::ResourceNotFound(what.to_string()),
            Failure::Api => CloudError::ApiError(format!("injected failure: {}", what)),
        }
    }
}

#[derive(Default)]
struct BackendState {
    floating_ips: Vec<FloatingIp>,
    networks: Vec<Network>,
    ports: Vec<Port>,
    calls: Vec<String>,
    failures: Vec<(String, Failure)>,
    created: u32,
}

impl BackendState {
    fn record(&mut self, call: String, op: &str) -> Result<()> {
        self.calls.push(call);
        if let Some(pos) = self.failures.iter().position(|(o, _)| o == op) {
            let (_, failure) = self.failures.remove(pos);
            return Err(failure.error(op));
        }
        Ok(())
    }
}

/// In-process network backend with a call log and failure injection
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<BackendState>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_network(&self, id: &str, name: &str, router_external: bool) {
        self.state.lock().unwrap().networks.push(Network {
            id: id.to_string(),
            name: name.to_string(),
            router_external,
        });
    }

    pub fn add_port(&self, id: &str, device_id: Option<&str>) {
        self.state.lock().unwrap().ports.push(Port {
            id: id.to_string(),
            device_id: device_id.map(str::to_string),
            device_owner: device_id.map(|_| "compute:nova".to_string()),
        });
    }

    /// A floating IP created outside the gateway
    pub fn add_floating_ip(&self, floating_ip: FloatingIp) {
        self.state.lock().unwrap().floating_ips.push(floating_ip);
    }

    /// Delete a floating IP behind the gateway's back
    pub fn remove_floating_ip(&self, id: &str) {
        self.state
            .lock()
            .unwrap()
            .floating_ips
            .retain(|ip| ip.id != id);
    }

    /// Fail the next call of the given operation
    pub fn fail_next(&self, op: &str, failure: Failure) {
        self.state
            .lock()
            .unwrap()
            .failures
            .push((op.to_string(), failure));
    }

    pub fn floating_ips(&self) -> Vec<FloatingIp> {
        self.state.lock().unwrap().floating_ips.clone()
    }

    pub fn floating_ip(&self, id: &str) -> Option<FloatingIp> {
        self.floating_ips().into_iter().find(|ip| ip.id == id)
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls that change backend state
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| {
                c.starts_with("create_floating_ip")
                    || c.starts_with("delete_floating_ip")
                    || c.starts_with("update_floating_ip_binding")
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }
}

#[async_trait]
impl NetworkBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    async fn create_floating_ip(&self, network_id: &str) -> Result<FloatingIp> {
        let mut state = self.state.lock().unwrap();
        state.record(
            format!("create_floating_ip:{}", network_id),
            "create_floating_ip",
        )?;
        state.created += 1;
        let mut floating_ip = FloatingIp::new(
            format!("fip-{}", state.created),
            format!("203.0.113.{}", state.created),
        );
        floating_ip.floating_network_id = Some(network_id.to_string());
        state.floating_ips.push(floating_ip.clone());
        Ok(floating_ip)
    }

    async fn delete_floating_ip(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.record(format!("delete_floating_ip:{}", id), "delete_floating_ip")?;
        let before = state.floating_ips.len();
        state.floating_ips.retain(|ip| ip.id != id);
        if state.floating_ips.len() == before {
            return Err(CloudError::ResourceNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn update_floating_ip_binding(
        &self,
        id: &str,
        binding: Option<&PortBinding>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let call = match binding {
            Some(b) => format!(
                "update_floating_ip_binding:{}:{}:{}",
                id, b.port_id, b.fixed_ip_address
            ),
            None => format!("update_floating_ip_binding:{}:none", id),
        };
        state.record(call, "update_floating_ip_binding")?;
        let floating_ip = state
            .floating_ips
            .iter_mut()
            .find(|ip| ip.id == id)
            .ok_or_else(|| CloudError::ResourceNotFound(id.to_string()))?;
        floating_ip.port_id = binding.map(|b| b.port_id.clone());
        floating_ip.fixed_ip_address = binding.map(|b| b.fixed_ip_address.clone());
        Ok(())
    }

    async fn get_floating_ip(&self, id: &str) -> Result<FloatingIp> {
        let mut state = self.state.lock().unwrap();
        state.record(format!("get_floating_ip:{}", id), "get_floating_ip")?;
        state
            .floating_ips
            .iter()
            .find(|ip| ip.id == id)
            .cloned()
            .ok_or_else(|| CloudError::ResourceNotFound(id.to_string()))
    }

    async fn list_floating_ips(&self) -> Result<Vec<FloatingIp>> {
        let mut state = self.state.lock().unwrap();
        state.record("list_floating_ips".to_string(), "list_floating_ips")?;
        Ok(state.floating_ips.clone())
    }

    async fn list_networks(&self, filter: &NetworkFilter) -> Result<Vec<Network>> {
        let mut state = self.state.lock().unwrap();
        state.record("list_networks".to_string(), "list_networks")?;
        Ok(state
            .networks
            .iter()
            .filter(|n| filter.matches(n))
            .cloned()
            .collect())
    }

    async fn list_ports(&self) -> Result<Vec<Port>> {
        let mut state = self.state.lock().unwrap();
        state.record("list_ports".to_string(), "list_ports")?;
        Ok(state.ports.clone())
    }
}

/// Legacy pool that records what was proxied
#[derive(Default)]
pub struct FakeLegacy {
    calls: Mutex<Vec<String>>,
}

impl FakeLegacy {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LegacyAddressApi for FakeLegacy {
    async fn allocate(&self) -> cloudgate_address::Result<Address> {
        self.calls.lock().unwrap().push("allocate".to_string());
        Ok(Address::standard("198.51.100.10"))
    }

    async fn associate(
        &self,
        request: &AssociateAddressRequest,
    ) -> cloudgate_address::Result<AssociateAddressResponse> {
        self.calls.lock().unwrap().push(format!(
            "associate:{}",
            request.public_ip.as_deref().unwrap_or_default()
        ));
        Ok(AssociateAddressResponse {
            success: true,
            association_id: None,
        })
    }

    async fn disassociate(&self, public_ip: &str) -> cloudgate_address::Result<bool> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("disassociate:{}", public_ip));
        Ok(true)
    }

    async fn release(&self, public_ip: &str) -> cloudgate_address::Result<bool> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("release:{}", public_ip));
        Ok(true)
    }
}

/// Memory store whose next call of a given operation can be made to fail
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failures: Mutex<Vec<String>>,
}

impl FlakyStore {
    pub fn fail_next(&self, op: &str) {
        self.failures.lock().unwrap().push(op.to_string());
    }

    fn check(&self, op: &str) -> Result<()> {
        let mut failures = self.failures.lock().unwrap();
        if let Some(pos) = failures.iter().position(|o| o == op) {
            failures.remove(pos);
            return Err(CloudError::StateError(format!("injected failure: {}", op)));
        }
        Ok(())
    }

    pub async fn snapshot(&self) -> Vec<Item> {
        self.inner.snapshot().await
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn add(&self, kind: &str, data: serde_json::Value) -> Result<Item> {
        self.check("add")?;
        self.inner.add(kind, data).await
    }

    async fn get(&self, kind: &str, id: u64) -> Result<Option<Item>> {
        self.inner.get(kind, id).await
    }

    async fn get_all(&self, kind: &str, ids: Option<&[u64]>) -> Result<Vec<Item>> {
        self.inner.get_all(kind, ids).await
    }

    async fn update(&self, item: &Item) -> Result<()> {
        self.check("update")?;
        self.inner.update(item).await
    }

    async fn delete(&self, id: u64) -> Result<()> {
        self.check("delete")?;
        self.inner.delete(id).await
    }

    async fn restore(&self, item: &Item) -> Result<()> {
        self.check("restore")?;
        self.inner.restore(item).await
    }
}

/// Engine wired to fakes, with one external network named [`EXTERNAL_NETWORK`]
pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub store: Arc<FlakyStore>,
    pub legacy: Arc<FakeLegacy>,
    pub engine: AddressEngine,
}

impl Harness {
    pub fn new() -> Self {
        let backend = Arc::new(FakeBackend::new());
        backend.add_network("net-public", EXTERNAL_NETWORK, true);
        backend.add_network("net-private", "private", false);
        Self::with_backend(backend)
    }

    pub fn with_backend(backend: Arc<FakeBackend>) -> Self {
        let store = Arc::new(FlakyStore::default());
        let legacy = Arc::new(FakeLegacy::default());
        let engine = AddressEngine::new(
            backend.clone(),
            store.clone(),
            legacy.clone(),
            EngineSettings::new(EXTERNAL_NETWORK, PROJECT_ID),
        );
        Self {
            backend,
            store,
            legacy,
            engine,
        }
    }

    pub async fn add_instance(&self, os_id: &str) -> InstanceRecord {
        self.store
            .add_record(Instance {
                os_id: os_id.to_string(),
            })
            .await
            .unwrap()
    }

    /// A managed interface on a backend port, optionally attached to an instance
    pub async fn add_interface(
        &self,
        port_id: &str,
        instance: Option<&InstanceRecord>,
        private_ip: &str,
    ) -> NetworkInterfaceRecord {
        self.backend
            .add_port(port_id, instance.map(|i| i.os_id.as_str()));
        self.store
            .add_record(NetworkInterface {
                os_id: port_id.to_string(),
                instance_id: instance.map(|i| i.id),
                private_ip_address: private_ip.to_string(),
            })
            .await
            .unwrap()
    }
}
