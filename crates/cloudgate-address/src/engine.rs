//! Address lifecycle engine
//!
//! Implements allocate / associate / disassociate / release / describe for
//! elastic IPs. Managed-domain addresses are backed by a backend floating IP
//! plus a local record; each mutation is a sequence of (store, backend) steps
//! inside a [`CompensationScope`]. Legacy-domain requests are proxied.
//!
//! State per record: unassociated ⇄ associated. Release is only possible
//! while unassociated and removes the record.

use crate::api::{
    Address, AssociateAddressRequest, AssociateAddressResponse, DescribeAddressesRequest,
    DescribeAddressesResponse, DisassociateAddressRequest, Domain, ReleaseAddressRequest,
};
use crate::compensation::CompensationScope;
use crate::error::{ApiError, Result};
use crate::filter::filtered_out;
use crate::format::{FormatContext, format_address};
use crate::ids::{self, Kind};
use crate::legacy::LegacyAddressApi;
use crate::model::{
    AddressRecord, Association, ElasticIp, Instance, NetworkInterface, NetworkInterfaceRecord,
};
use crate::reconcile::{self, Reconciliation};
use cloudgate_cloud::{
    FloatingIp, Network, NetworkBackend, NetworkFilter, PortBinding, RecordStore, RecordStoreExt,
};
use std::net::IpAddr;
use std::sync::Arc;

/// Values the engine needs from the gateway configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Name of the external network floating IPs are allocated from
    pub external_network: String,

    /// Reported as `networkInterfaceOwnerId`
    pub project_id: String,
}

impl EngineSettings {
    pub fn new(external_network: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            external_network: external_network.into(),
            project_id: project_id.into(),
        }
    }
}

pub struct AddressEngine {
    backend: Arc<dyn NetworkBackend>,
    store: Arc<dyn RecordStore>,
    legacy: Arc<dyn LegacyAddressApi>,
    settings: EngineSettings,
}

/// Exactly one of two alternative parameters
fn one_of<'a>(
    first: (&str, Option<&'a String>),
    second: (&str, Option<&'a String>),
) -> Result<Choice<'a>> {
    match (first.1, second.1) {
        (Some(value), None) => Ok(Choice::First(value)),
        (None, Some(value)) => Ok(Choice::Second(value)),
        (None, None) => Err(ApiError::MissingParameter(format!(
            "Either {} or {} must be specified",
            first.0, second.0
        ))),
        (Some(_), Some(_)) => Err(ApiError::InvalidParameterCombination(format!(
            "You may specify {} or {}, but not both in the same call",
            first.0, second.0
        ))),
    }
}

#[derive(Clone, Copy)]
enum Choice<'a> {
    First(&'a String),
    Second(&'a String),
}

impl AddressEngine {
    pub fn new(
        backend: Arc<dyn NetworkBackend>,
        store: Arc<dyn RecordStore>,
        legacy: Arc<dyn LegacyAddressApi>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            backend,
            store,
            legacy,
            settings,
        }
    }

    /// Allocate an address in the given domain
    ///
    /// No domain proxies to the legacy pool; `vpc` creates a backend floating
    /// IP and a local record.
    pub async fn allocate(&self, domain: Option<&str>) -> Result<Address> {
        match domain {
            None | Some("") => {
                let mut address = self.legacy.allocate().await?;
                address.domain = Domain::Standard;
                return Ok(address);
            }
            Some(d) if d == Domain::Vpc.as_str() => {}
            Some(d) => {
                return Err(ApiError::InvalidParameterValue(format!(
                    "Invalid value '{}' for domain.",
                    d
                )));
            }
        }

        let network = self.external_network().await?;

        let mut scope = CompensationScope::new("allocate_address");
        let outcome = async {
            let floating_ip = self.backend.create_floating_ip(&network.id).await?;
            tracing::debug!(
                "Created floating IP {} ({})",
                floating_ip.id,
                floating_ip.floating_ip_address
            );

            let backend = Arc::clone(&self.backend);
            let os_id = floating_ip.id.clone();
            scope.on_failure(
                format!("delete floating IP {}", floating_ip.id),
                move || async move { backend.delete_floating_ip(&os_id).await },
            );

            let record = self
                .store
                .add_record(ElasticIp::new(
                    floating_ip.id.clone(),
                    floating_ip.floating_ip_address.clone(),
                ))
                .await?;

            Ok::<_, ApiError>((record, floating_ip))
        }
        .await;
        let (record, floating_ip) = scope.exit(outcome).await?;

        tracing::info!(
            "Allocated {} as {}",
            record.public_ip,
            ids::encode(record.id, Kind::Allocation)
        );
        Ok(format_address(
            Some(&record),
            &floating_ip,
            &FormatContext::new(&self.settings.project_id),
        ))
    }

    /// Bind an address to a network interface
    pub async fn associate(
        &self,
        request: &AssociateAddressRequest,
    ) -> Result<AssociateAddressResponse> {
        let address_ref = one_of(
            ("public IP", request.public_ip.as_ref()),
            ("allocation id", request.allocation_id.as_ref()),
        )?;
        let target = one_of(
            ("instance ID", request.instance_id.as_ref()),
            ("network interface id", request.network_interface_id.as_ref()),
        )?;

        let instance_interfaces = match target {
            Choice::First(instance_id) => self.instance_interfaces(instance_id).await?,
            Choice::Second(_) => Vec::new(),
        };

        let allocation_id = match address_ref {
            Choice::First(public_ip) => {
                if !instance_interfaces.is_empty() {
                    return Err(ApiError::InvalidParameterCombination(
                        "You must specify an allocation id when mapping an address to a VPC instance"
                            .to_string(),
                    ));
                }
                if self.find_valid_by_public_ip(public_ip).await?.is_some() {
                    return Err(ApiError::AuthFailure(format!(
                        "The address '{}' does not belong to you.",
                        public_ip
                    )));
                }
                return self.legacy.associate(request).await;
            }
            Choice::Second(allocation_id) => allocation_id,
        };

        let interface = match target {
            Choice::First(instance_id) => {
                let mut interfaces = instance_interfaces;
                match interfaces.len() {
                    0 => {
                        return Err(ApiError::InvalidParameterCombination(
                            "You must specify an IP address when mapping to a non-VPC instance"
                                .to_string(),
                        ));
                    }
                    1 => interfaces.remove(0),
                    _ => return Err(ApiError::InvalidInstanceId(instance_id.clone())),
                }
            }
            Choice::Second(network_interface_id) => {
                self.get_network_interface(network_interface_id).await?
            }
        };
        let private_ip_address = request
            .private_ip_address
            .clone()
            .unwrap_or_else(|| interface.private_ip_address.clone());

        let mut address = self.get_allocation(allocation_id).await?;
        if !reconcile::is_valid(self.backend.as_ref(), &address).await? {
            return Err(ApiError::InvalidAllocationIdNotFound(allocation_id.clone()));
        }
        let association_id = ids::encode(address.id, Kind::Association);
        let response = AssociateAddressResponse {
            success: true,
            association_id: Some(association_id.clone()),
        };

        match &address.association {
            Some(current) if current.network_interface_id == interface.id => {
                tracing::debug!("{} already associated, nothing to do", allocation_id);
                return Ok(response);
            }
            Some(_) if !request.allow_reassociation => {
                return Err(ApiError::ResourceAlreadyAssociated {
                    allocation_id: allocation_id.clone(),
                    association_id,
                });
            }
            _ => {}
        }

        let previous = address.clone();
        let binding = PortBinding::new(interface.os_id.clone(), private_ip_address.clone());

        let mut scope = CompensationScope::new("associate_address");
        let outcome = async {
            address.association = Some(Association {
                network_interface_id: interface.id,
                private_ip_address,
            });
            self.store.update_record(&address).await?;

            let store = Arc::clone(&self.store);
            scope.on_failure("restore address association", move || async move {
                store.update_record(&previous).await
            });

            self.backend
                .update_floating_ip_binding(&address.os_id, Some(&binding))
                .await?;
            Ok::<_, ApiError>(())
        }
        .await;
        scope.exit(outcome).await?;

        tracing::info!(
            "Associated {} with {}",
            address.public_ip,
            ids::encode(interface.id, Kind::NetworkInterface)
        );
        Ok(response)
    }

    /// Unbind an address from its network interface
    pub async fn disassociate(&self, request: &DisassociateAddressRequest) -> Result<bool> {
        let association_id = match one_of(
            ("public IP", request.public_ip.as_ref()),
            ("association id", request.association_id.as_ref()),
        )? {
            Choice::First(public_ip) => {
                if self.find_valid_by_public_ip(public_ip).await?.is_some() {
                    return Err(ApiError::InvalidParameterValue(
                        "You must specify an association id when unmapping an address from a VPC instance"
                            .to_string(),
                    ));
                }
                return self.legacy.disassociate(public_ip).await;
            }
            Choice::Second(association_id) => association_id,
        };

        let not_found = || ApiError::InvalidAssociationIdNotFound(association_id.clone());
        let id = ids::decode_as(association_id, Kind::Association).map_err(|_| not_found())?;
        let mut address = self
            .store
            .get_record::<ElasticIp>(id)
            .await?
            .ok_or_else(not_found)?;
        if !reconcile::is_valid(self.backend.as_ref(), &address).await? {
            return Err(not_found());
        }

        if !address.is_associated() {
            tracing::debug!("{} is not associated, nothing to do", association_id);
            return Ok(true);
        }

        let previous = address.clone();

        let mut scope = CompensationScope::new("disassociate_address");
        let outcome = async {
            address.association = None;
            self.store.update_record(&address).await?;

            let store = Arc::clone(&self.store);
            scope.on_failure("restore address association", move || async move {
                store.update_record(&previous).await
            });

            self.backend
                .update_floating_ip_binding(&address.os_id, None)
                .await?;
            Ok::<_, ApiError>(())
        }
        .await;
        scope.exit(outcome).await?;

        tracing::info!("Disassociated {}", address.public_ip);
        Ok(true)
    }

    /// Release an unassociated address
    pub async fn release(&self, request: &ReleaseAddressRequest) -> Result<bool> {
        let allocation_id = match one_of(
            ("public IP", request.public_ip.as_ref()),
            ("allocation id", request.allocation_id.as_ref()),
        )? {
            Choice::First(public_ip) => {
                if self.find_valid_by_public_ip(public_ip).await?.is_some() {
                    return Err(ApiError::InvalidParameterValue(
                        "You must specify an allocation id when releasing a VPC elastic IP address"
                            .to_string(),
                    ));
                }
                return self.legacy.release(public_ip).await;
            }
            Choice::Second(allocation_id) => allocation_id,
        };

        let address = self.get_allocation(allocation_id).await?;
        if !reconcile::is_valid(self.backend.as_ref(), &address).await? {
            return Err(ApiError::InvalidAllocationIdNotFound(allocation_id.clone()));
        }
        if address.is_associated() {
            return Err(ApiError::InvalidIpAddressInUse(address.public_ip.clone()));
        }

        let mut scope = CompensationScope::new("release_address");
        let outcome = async {
            self.store.delete(address.id).await?;

            let store = Arc::clone(&self.store);
            let deleted = address.clone();
            scope.on_failure("restore address record", move || async move {
                store.restore_record(&deleted).await
            });

            match self.backend.delete_floating_ip(&address.os_id).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    tracing::debug!("Floating IP {} was already deleted", address.os_id);
                }
                Err(e) => return Err(ApiError::from(e)),
            }
            Ok::<_, ApiError>(())
        }
        .await;
        scope.exit(outcome).await?;

        tracing::info!("Released {} ({})", address.public_ip, allocation_id);
        Ok(true)
    }

    /// List addresses, purging records whose floating IP vanished
    pub async fn describe(
        &self,
        request: &DescribeAddressesRequest,
    ) -> Result<DescribeAddressesResponse> {
        for public_ip in &request.public_ips {
            if public_ip.parse::<IpAddr>().is_err() {
                return Err(ApiError::InvalidParameterValue(format!(
                    "Invalid value '{}' for public_ip: Invalid public IP specified",
                    public_ip
                )));
            }
        }
        for filter in &request.filters {
            filter.validate()?;
        }
        let mut allocation_ids = Vec::with_capacity(request.allocation_ids.len());
        for allocation_id in &request.allocation_ids {
            let id = ids::decode_as(allocation_id, Kind::Allocation)
                .map_err(|_| ApiError::InvalidAllocationIdNotFound(allocation_id.clone()))?;
            allocation_ids.push(id);
        }

        let floating_ips = self.backend.list_floating_ips().await?;

        // Join over every record; requested ids select after the join
        let records = self.store.get_records::<ElasticIp>(None).await?;
        if let Some(missing) = request
            .allocation_ids
            .iter()
            .zip(&allocation_ids)
            .find(|(_, id)| !records.iter().any(|r| r.id == **id))
        {
            return Err(ApiError::InvalidAllocationIdNotFound(missing.0.clone()));
        }

        let Reconciliation {
            matched,
            stale,
            unmanaged,
        } = reconcile::reconcile(records, floating_ips);
        reconcile::purge(self.store.as_ref(), &stale).await;

        let by_ip = !request.public_ips.is_empty();
        let by_allocation = !allocation_ids.is_empty();
        let mut wanted: Vec<&String> = Vec::new();
        for public_ip in &request.public_ips {
            if !wanted.contains(&public_ip) {
                wanted.push(public_ip);
            }
        }
        let mut take_wanted = |floating_ip: &FloatingIp| -> bool {
            match wanted
                .iter()
                .position(|ip| **ip == floating_ip.floating_ip_address)
            {
                Some(pos) => {
                    wanted.remove(pos);
                    true
                }
                None => false,
            }
        };

        let mut pairs: Vec<(Option<AddressRecord>, FloatingIp)> = Vec::new();
        for (record, floating_ip) in matched {
            let selected = if by_ip || by_allocation {
                // Both sides are evaluated so the public IP is consumed
                let ip_selected = by_ip && take_wanted(&floating_ip);
                ip_selected || allocation_ids.contains(&record.id)
            } else {
                true
            };
            if selected {
                pairs.push((Some(record), floating_ip));
            }
        }
        for floating_ip in unmanaged {
            let selected = if by_ip {
                take_wanted(&floating_ip)
            } else {
                !by_allocation
            };
            if selected {
                pairs.push((None, floating_ip));
            }
        }

        if let Some(missing) = wanted.first() {
            return Err(ApiError::InvalidAddressNotFound((*missing).clone()));
        }

        let ports = if pairs.iter().any(|(_, ip)| ip.port_id.is_some()) {
            self.backend.list_ports().await?
        } else {
            Vec::new()
        };
        let instances = self.store.get_records::<Instance>(None).await?;
        let ctx = FormatContext::new(&self.settings.project_id).with_ports(&ports, &instances);

        let addresses_set = pairs
            .iter()
            .map(|(record, floating_ip)| format_address(record.as_ref(), floating_ip, &ctx))
            .filter(|address| !filtered_out(address, &request.filters))
            .collect();

        Ok(DescribeAddressesResponse { addresses_set })
    }

    /// The single external network named in the settings
    async fn external_network(&self) -> Result<Network> {
        let name = &self.settings.external_network;
        let mut networks = self
            .backend
            .list_networks(&NetworkFilter::external(name.clone()))
            .await?;
        match networks.len() {
            0 => Err(ApiError::ExternalNetwork(format!(
                "no external network named '{}'",
                name
            ))),
            1 => Ok(networks.remove(0)),
            n => Err(ApiError::ExternalNetwork(format!(
                "{} external networks named '{}'",
                n, name
            ))),
        }
    }

    async fn get_allocation(&self, allocation_id: &str) -> Result<AddressRecord> {
        let not_found = || ApiError::InvalidAllocationIdNotFound(allocation_id.to_string());
        let id = ids::decode_as(allocation_id, Kind::Allocation).map_err(|_| not_found())?;
        self.store
            .get_record::<ElasticIp>(id)
            .await?
            .ok_or_else(not_found)
    }

    async fn get_network_interface(
        &self,
        network_interface_id: &str,
    ) -> Result<NetworkInterfaceRecord> {
        let not_found =
            || ApiError::InvalidNetworkInterfaceIdNotFound(network_interface_id.to_string());
        let id = ids::decode_as(network_interface_id, Kind::NetworkInterface)
            .map_err(|_| not_found())?;
        self.store
            .get_record::<NetworkInterface>(id)
            .await?
            .ok_or_else(not_found)
    }

    /// Managed network interfaces attached to the instance
    async fn instance_interfaces(&self, instance_id: &str) -> Result<Vec<NetworkInterfaceRecord>> {
        let id = ids::decode_as(instance_id, Kind::Instance)
            .map_err(|_| ApiError::InvalidInstanceId(instance_id.to_string()))?;
        Ok(self
            .store
            .get_records::<NetworkInterface>(None)
            .await?
            .into_iter()
            .filter(|eni| eni.instance_id == Some(id))
            .collect())
    }

    /// A managed record for the public IP that still exists on the backend
    async fn find_valid_by_public_ip(&self, public_ip: &str) -> Result<Option<AddressRecord>> {
        let record = self
            .store
            .get_records::<ElasticIp>(None)
            .await?
            .into_iter()
            .find(|r| r.public_ip == public_ip);
        let Some(record) = record else {
            return Ok(None);
        };
        if reconcile::is_valid(self.backend.as_ref(), &record).await? {
            Ok(Some(record))
        } else {
            Ok(None)
        }
    }
}
