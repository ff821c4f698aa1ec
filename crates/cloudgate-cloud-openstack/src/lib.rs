//! OpenStack backend for Cloudgate
//!
//! [`OpenStackCli`] implements `NetworkBackend` on top of the `openstack`
//! client; [`Ec2Cli`] forwards standard-domain address requests to an
//! EC2-compatible endpoint through the `aws` client.
//!
//! # Requirements
//!
//! - `openstack` CLI installed, with credentials in `clouds.yaml` or `OS_*`
//!   environment variables
//! - `aws` CLI, only when a legacy endpoint is configured
//!
//! # Example
//!
//! ```ignore
//! use cloudgate_cloud::NetworkBackend;
//! use cloudgate_cloud_openstack::OpenStackCli;
//!
//! let backend = OpenStackCli::new().with_cloud("devstack");
//! let floating_ips = backend.list_floating_ips().await?;
//! ```

pub mod ec2;
pub mod error;
pub mod openstack;

pub use ec2::Ec2Cli;
pub use error::{OpenStackError, Result};
pub use openstack::OpenStackCli;
