//! Exposed API error kinds

use cloudgate_cloud::CloudError;
use thiserror::Error;

/// Errors surfaced to API callers
///
/// Each variant maps onto one error code of the exposed API (see
/// [`ApiError::code`]). Validation variants are raised before any mutation.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    MissingParameter(String),

    #[error("{0}")]
    InvalidParameterValue(String),

    #[error("{0}")]
    InvalidParameterCombination(String),

    #[error("{0}")]
    AuthFailure(String),

    #[error("The allocation ID '{0}' does not exist")]
    InvalidAllocationIdNotFound(String),

    #[error("The association ID '{0}' does not exist")]
    InvalidAssociationIdNotFound(String),

    #[error("The address '{0}' does not exist")]
    InvalidAddressNotFound(String),

    #[error("The instance ID '{0}' is not valid for this operation")]
    InvalidInstanceId(String),

    #[error("The network interface ID '{0}' does not exist")]
    InvalidNetworkInterfaceIdNotFound(String),

    #[error("resource {allocation_id} is already associated with associate-id {association_id}")]
    ResourceAlreadyAssociated {
        allocation_id: String,
        association_id: String,
    },

    #[error("Address {0} is in use")]
    InvalidIpAddressInUse(String),

    #[error("External network unavailable: {0}")]
    ExternalNetwork(String),

    /// Error returned verbatim by the legacy address pool
    #[error("{message}")]
    Legacy { code: String, message: String },

    #[error("Backend error: {0}")]
    Backend(#[from] CloudError),
}

impl ApiError {
    /// Error code of the exposed API
    pub fn code(&self) -> &str {
        match self {
            ApiError::MissingParameter(_) => "MissingParameter",
            ApiError::InvalidParameterValue(_) => "InvalidParameterValue",
            ApiError::InvalidParameterCombination(_) => "InvalidParameterCombination",
            ApiError::AuthFailure(_) => "AuthFailure",
            ApiError::InvalidAllocationIdNotFound(_) => "InvalidAllocationID.NotFound",
            ApiError::InvalidAssociationIdNotFound(_) => "InvalidAssociationID.NotFound",
            ApiError::InvalidAddressNotFound(_) => "InvalidAddress.NotFound",
            ApiError::InvalidInstanceId(_) => "InvalidInstanceID",
            ApiError::InvalidNetworkInterfaceIdNotFound(_) => "InvalidNetworkInterfaceID.NotFound",
            ApiError::ResourceAlreadyAssociated { .. } => "Resource.AlreadyAssociated",
            ApiError::InvalidIpAddressInUse(_) => "InvalidIPAddress.InUse",
            ApiError::ExternalNetwork(_) | ApiError::Backend(_) => "InternalError",
            ApiError::Legacy { code, .. } => code,
        }
    }

    /// Whether the caller can fix the request (as opposed to a server-side failure)
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ApiError::ExternalNetwork(_) | ApiError::Backend(_))
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let err = ApiError::ResourceAlreadyAssociated {
            allocation_id: "eipalloc-00000001".to_string(),
            association_id: "eipassoc-00000001".to_string(),
        };
        assert_eq!(err.code(), "Resource.AlreadyAssociated");
        assert!(err.to_string().contains("eipassoc-00000001"));

        let err = ApiError::Legacy {
            code: "AuthFailure".to_string(),
            message: "denied".to_string(),
        };
        assert_eq!(err.code(), "AuthFailure");
        assert_eq!(err.to_string(), "denied");
    }

    #[test]
    fn test_backend_errors_are_server_side() {
        let err: ApiError = CloudError::ApiError("boom".to_string()).into();
        assert_eq!(err.code(), "InternalError");
        assert!(!err.is_client_error());
        assert!(ApiError::MissingParameter("x".to_string()).is_client_error());
    }
}
