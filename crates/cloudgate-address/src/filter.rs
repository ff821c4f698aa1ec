//! Caller-supplied describe filters

use crate::api::Address;
use crate::error::{ApiError, Result};
use serde::{Deserialize, Serialize};

/// Filter names accepted by describe
pub const FILTER_NAMES: &[&str] = &[
    "domain",
    "public-ip",
    "allocation-id",
    "association-id",
    "instance-id",
    "network-interface-id",
    "network-interface-owner-id",
    "private-ip-address",
];

/// A named filter; an address passes if its field equals any of the values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub name: String,
    pub values: Vec<String>,
}

impl Filter {
    pub fn new(name: impl Into<String>, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse the `name=value1,value2` form
    pub fn parse(raw: &str) -> Result<Self> {
        let (name, values) = raw.split_once('=').ok_or_else(|| {
            ApiError::InvalidParameterValue(format!(
                "Invalid filter '{}': expected name=value[,value...]",
                raw
            ))
        })?;
        let values: Vec<&str> = values.split(',').filter(|v| !v.is_empty()).collect();
        let filter = Self::new(name.trim(), values);
        filter.validate()?;
        Ok(filter)
    }

    pub fn validate(&self) -> Result<()> {
        if !FILTER_NAMES.contains(&self.name.as_str()) {
            return Err(ApiError::InvalidParameterValue(format!(
                "The filter '{}' is invalid",
                self.name
            )));
        }
        Ok(())
    }
}

fn field<'a>(address: &'a Address, name: &str) -> Option<&'a str> {
    match name {
        "domain" => Some(address.domain.as_str()),
        "public-ip" => Some(address.public_ip.as_str()),
        "allocation-id" => address.allocation_id.as_deref(),
        "association-id" => address.association_id.as_deref(),
        "instance-id" => address.instance_id.as_deref(),
        "network-interface-id" => address.network_interface_id.as_deref(),
        "network-interface-owner-id" => address.network_interface_owner_id.as_deref(),
        "private-ip-address" => address.private_ip_address.as_deref(),
        _ => None,
    }
}

/// Whether any filter rejects the address
pub fn filtered_out(address: &Address, filters: &[Filter]) -> bool {
    filters.iter().any(|filter| match field(address, &filter.name) {
        Some(value) => !filter.values.iter().any(|v| v == value),
        None => true,
    })
}
