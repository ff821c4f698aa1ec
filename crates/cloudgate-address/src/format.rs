//! Projection of records and backend objects into wire addresses

use crate::api::{Address, Domain};
use crate::ids::{self, Kind};
use crate::model::{AddressRecord, InstanceRecord};
use cloudgate_cloud::{FloatingIp, Port};

/// Lookup data for resolving the instance behind a bound port
#[derive(Debug, Clone, Copy)]
pub struct FormatContext<'a> {
    /// Reported as the owner of managed network interfaces
    pub owner_id: &'a str,

    /// Backend port snapshot
    pub ports: &'a [Port],

    /// Locally known instances, matched against the port's device
    pub instances: &'a [InstanceRecord],
}

impl<'a> FormatContext<'a> {
    pub fn new(owner_id: &'a str) -> Self {
        Self {
            owner_id,
            ports: &[],
            instances: &[],
        }
    }

    pub fn with_ports(mut self, ports: &'a [Port], instances: &'a [InstanceRecord]) -> Self {
        self.ports = ports;
        self.instances = instances;
        self
    }

    fn instance_for_port(&self, port_id: &str) -> Option<String> {
        let port = self.ports.iter().find(|p| p.id == port_id)?;
        let device_id = port.device_id.as_deref()?;
        self.instances
            .iter()
            .find(|i| i.os_id == device_id)
            .map(|i| ids::encode(i.id, Kind::Instance))
    }
}

/// Build the wire address for a backend floating IP and its local record
pub fn format_address(
    record: Option<&AddressRecord>,
    floating_ip: &FloatingIp,
    ctx: &FormatContext<'_>,
) -> Address {
    let mut address = Address::standard(floating_ip.floating_ip_address.clone());

    if let Some(fixed_ip) = &floating_ip.fixed_ip_address {
        address.private_ip_address = Some(fixed_ip.clone());
        if let Some(port_id) = &floating_ip.port_id {
            address.instance_id = ctx.instance_for_port(port_id);
        }
    }

    let Some(record) = record else {
        return address;
    };

    address.domain = Domain::Vpc;
    address.allocation_id = Some(ids::encode(record.id, Kind::Allocation));

    if let Some(association) = &record.association {
        address.association_id = Some(ids::encode(record.id, Kind::Association));
        address.network_interface_id = Some(ids::encode(
            association.network_interface_id,
            Kind::NetworkInterface,
        ));
        address.network_interface_owner_id = Some(ctx.owner_id.to_string());
    }

    address
}
