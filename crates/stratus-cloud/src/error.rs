//! Cloud provider error types

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Error reported by the cloud API for a single call.
///
/// The transport layer classifies every failed call into a stable `code`
/// (e.g. `Client.InvalidParameterNotFound.DBInstance`) and a human readable
/// `message`. Retry classification works on these two fields only.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Cloud provider errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("{resource} reached failure state '{state}'")]
    FailureState { resource: String, state: String },

    #[error("{resource} is in unexpected state '{state}', wanted one of {target:?}")]
    UnexpectedState {
        resource: String,
        state: String,
        target: Vec<String>,
    },

    #[error(
        "{resource} not found after {checks} checks (last state: '{}')",
        .last_state.as_deref().unwrap_or("none")
    )]
    NotFound {
        resource: String,
        checks: u32,
        last_state: Option<String>,
    },

    #[error(
        "probing {resource} failed (last state: '{}'): {source}",
        .last_state.as_deref().unwrap_or("none")
    )]
    ProbeFailed {
        resource: String,
        last_state: Option<String>,
        #[source]
        source: Box<CloudError>,
    },

    #[error(
        "timeout after {elapsed:?} waiting for {resource} to reach {target:?} (last state: '{last_state}')"
    )]
    Timeout {
        resource: String,
        last_state: String,
        target: Vec<String>,
        elapsed: Duration,
    },

    #[error("Malformed API response: {0}")]
    MalformedResponse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// The API error carried by this error, if the failure came from a call.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            CloudError::Api(err) => Some(err),
            CloudError::ProbeFailed { source, .. } => source.api_error(),
            _ => None,
        }
    }

    /// Whether a wait ran out of time before the resource converged.
    pub fn is_timeout(&self) -> bool {
        matches!(self, CloudError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
