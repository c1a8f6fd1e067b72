//! NIFCLOUD provider error types

use stratus_cloud::{ApiError, CloudError};
use stratus_config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NifcloudError {
    #[error(transparent)]
    Cloud(#[from] CloudError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{operation} {resource} failed: {source}")]
    Request {
        operation: &'static str,
        resource: String,
        #[source]
        source: CloudError,
    },
}

impl NifcloudError {
    /// The API error behind this failure, if any.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            NifcloudError::Cloud(err) | NifcloudError::Request { source: err, .. } => {
                err.api_error()
            }
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, NifcloudError::Cloud(err) if err.is_timeout())
    }

    /// The resource a failed call named, as `"<kind> <id>"`.
    pub fn resource(&self) -> Option<&str> {
        match self {
            NifcloudError::Request { resource, .. } => Some(resource),
            _ => None,
        }
    }
}

impl From<ApiError> for NifcloudError {
    fn from(err: ApiError) -> Self {
        NifcloudError::Cloud(CloudError::Api(err))
    }
}

pub type Result<T> = std::result::Result<T, NifcloudError>;
