//! Legacy address pool proxy

use crate::api::{Address, AssociateAddressRequest, AssociateAddressResponse};
use crate::error::{ApiError, Result};
use async_trait::async_trait;

/// The unmanaged (legacy) address pool
///
/// Requests for addresses outside the managed domain are forwarded verbatim;
/// the gateway keeps no records for them.
#[async_trait]
pub trait LegacyAddressApi: Send + Sync {
    async fn allocate(&self) -> Result<Address>;

    async fn associate(&self, request: &AssociateAddressRequest)
    -> Result<AssociateAddressResponse>;

    async fn disassociate(&self, public_ip: &str) -> Result<bool>;

    async fn release(&self, public_ip: &str) -> Result<bool>;
}

/// Proxy for deployments without a legacy pool; every call is rejected
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLegacyPool;

impl NoLegacyPool {
    fn unsupported() -> ApiError {
        ApiError::InvalidParameterValue(
            "The standard address domain is not available; use domain 'vpc'".to_string(),
        )
    }
}

#[async_trait]
impl LegacyAddressApi for NoLegacyPool {
    async fn allocate(&self) -> Result<Address> {
        Err(Self::unsupported())
    }

    async fn associate(
        &self,
        _request: &AssociateAddressRequest,
    ) -> Result<AssociateAddressResponse> {
        Err(Self::unsupported())
    }

    async fn disassociate(&self, _public_ip: &str) -> Result<bool> {
        Err(Self::unsupported())
    }

    async fn release(&self, _public_ip: &str) -> Result<bool> {
        Err(Self::unsupported())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_legacy_pool_rejects() {
        let pool = NoLegacyPool;
        assert!(matches!(
            pool.allocate().await,
            Err(ApiError::InvalidParameterValue(_))
        ));
        assert!(pool.release("198.51.100.1").await.is_err());
    }
}
