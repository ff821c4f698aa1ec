//! Cloudgate elastic IP engine
//!
//! Exposes the legacy cloud API's address operations (allocate, associate,
//! disassociate, release, describe) on top of a backend whose native
//! primitive is the floating IP.
//!
//! Each operation is a sequence of local-store and backend calls made to look
//! atomic to the caller:
//!
//! - identifiers of the exposed API are translated to durable record ids
//!   ([`ids`])
//! - partial failures are rolled back by undo actions ([`compensation`])
//! - records whose floating IP vanished out-of-band are detected and purged
//!   ([`reconcile`])
//!
//! # Example
//!
//! ```ignore
//! use cloudgate_address::{AddressEngine, EngineSettings, NoLegacyPool};
//! use cloudgate_cloud::MemoryStore;
//! use std::sync::Arc;
//!
//! let engine = AddressEngine::new(
//!     backend,
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(NoLegacyPool),
//!     EngineSettings::new("public", "project-1"),
//! );
//! let address = engine.allocate(Some("vpc")).await?;
//! ```

pub mod api;
pub mod compensation;
pub mod engine;
pub mod error;
pub mod filter;
pub mod format;
pub mod ids;
pub mod legacy;
pub mod model;
pub mod reconcile;

// Re-exports
pub use api::{
    Address, AssociateAddressRequest, AssociateAddressResponse, DescribeAddressesRequest,
    DescribeAddressesResponse, DisassociateAddressRequest, Domain, ReleaseAddressRequest,
};
pub use compensation::{CompensationScope, RollbackReport};
pub use engine::{AddressEngine, EngineSettings};
pub use error::{ApiError, Result};
pub use filter::Filter;
pub use format::{FormatContext, format_address};
pub use legacy::{LegacyAddressApi, NoLegacyPool};
pub use model::{
    AddressRecord, Association, ElasticIp, Instance, InstanceRecord, NetworkInterface,
    NetworkInterfaceRecord,
};
