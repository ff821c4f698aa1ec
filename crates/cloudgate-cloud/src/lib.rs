//! Cloudgate backend abstraction
//!
//! This crate provides the two systems of record the gateway mutates on every
//! lifecycle operation:
//!
//! - **Network backend**: the remote cloud whose floating IPs back the
//!   exposed addresses ([`NetworkBackend`])
//! - **Record store**: local records mapping exposed identifiers onto backend
//!   objects ([`RecordStore`])
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │               cloudgate-address                  │
//! │          (address lifecycle engine)              │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               cloudgate-cloud                    │
//! │  ┌──────────────────┐  ┌──────────────────┐     │
//! │  │ NetworkBackend   │  │  RecordStore     │     │
//! │  └──────────────────┘  └──────────────────┘     │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼─────────────────┐
//! │ cloudgate-cloud-openstack│
//! └─────────────────────────┘
//! ```

pub mod backend;
pub mod error;
pub mod state;

// Re-exports
pub use backend::{FloatingIp, Network, NetworkBackend, NetworkFilter, Port, PortBinding};
pub use error::{CloudError, Result};
pub use state::{
    FileStore, GlobalState, Item, MemoryStore, Record, RecordStore, RecordStoreExt, Resource,
    StateLock,
};
