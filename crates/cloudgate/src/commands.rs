use crate::AddressCommand;
use cloudgate_address::{
    AddressEngine, ApiError, AssociateAddressRequest, DescribeAddressesRequest,
    DisassociateAddressRequest, Filter, ReleaseAddressRequest,
};
use serde_json::{Value, json};

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::Backend(e.into()))
}

/// Run an address command and return its JSON response
pub async fn handle(engine: &AddressEngine, command: AddressCommand) -> Result<Value, ApiError> {
    match command {
        AddressCommand::AllocateAddress { domain } => {
            let address = engine.allocate(domain.as_deref()).await?;
            to_value(&address)
        }
        AddressCommand::AssociateAddress {
            public_ip,
            allocation_id,
            instance_id,
            network_interface_id,
            private_ip_address,
            allow_reassociation,
        } => {
            let request = AssociateAddressRequest {
                public_ip,
                allocation_id,
                instance_id,
                network_interface_id,
                private_ip_address,
                allow_reassociation,
            };
            let response = engine.associate(&request).await?;
            to_value(&response)
        }
        AddressCommand::DisassociateAddress {
            public_ip,
            association_id,
        } => {
            let request = DisassociateAddressRequest {
                public_ip,
                association_id,
            };
            let success = engine.disassociate(&request).await?;
            Ok(json!({ "return": success }))
        }
        AddressCommand::ReleaseAddress {
            public_ip,
            allocation_id,
        } => {
            let request = ReleaseAddressRequest {
                public_ip,
                allocation_id,
            };
            let success = engine.release(&request).await?;
            Ok(json!({ "return": success }))
        }
        AddressCommand::DescribeAddresses {
            public_ips,
            allocation_ids,
            filters,
        } => {
            let filters = filters
                .iter()
                .map(|raw| Filter::parse(raw))
                .collect::<Result<Vec<_>, _>>()?;
            let request = DescribeAddressesRequest {
                public_ips,
                allocation_ids,
                filters,
            };
            let response = engine.describe(&request).await?;
            to_value(&response)
        }
    }
}
