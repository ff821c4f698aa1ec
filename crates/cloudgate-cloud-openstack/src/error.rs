//! OpenStack backend error types

use cloudgate_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpenStackError {
    #[error("{0} not found. Please install it and make sure it is on PATH")]
    CliNotFound(String),

    #[error("OpenStack authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("openstack command failed: {0}")]
    CommandFailed(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl OpenStackError {
    /// Classify a failed command by its stderr
    pub fn from_stderr(stderr: &str) -> Self {
        let message = stderr.trim().to_string();
        if stderr.contains("No FloatingIP found")
            || stderr.contains("could not be found")
            || stderr.contains("404")
        {
            OpenStackError::NotFound(message)
        } else if stderr.contains("requires authentication")
            || stderr.contains("Missing value auth-url")
            || stderr.contains("401")
        {
            OpenStackError::AuthenticationFailed(message)
        } else {
            OpenStackError::CommandFailed(message)
        }
    }
}

impl From<OpenStackError> for CloudError {
    fn from(err: OpenStackError) -> Self {
        match err {
            OpenStackError::NotFound(msg) => CloudError::ResourceNotFound(msg),
            OpenStackError::AuthenticationFailed(msg) => CloudError::AuthenticationFailed(msg),
            OpenStackError::JsonError(e) => CloudError::Json(e),
            OpenStackError::IoError(e) => CloudError::Io(e),
            e @ (OpenStackError::CliNotFound(_) | OpenStackError::CommandFailed(_)) => {
                CloudError::CommandFailed(e.to_string())
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, OpenStackError>;
