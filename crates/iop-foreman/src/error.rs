//! ---
//! iop_section: "04-management-api"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Errors surfaced by the management API client."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid API base URI '{uri}': {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },
    #[error("'{0}' is not a valid Host header value")]
    InvalidHeader(String),
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("{method} {path} failed: {source}")]
    Http {
        method: &'static str,
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method} {path} returned HTTP {status}: {body}")]
    Status {
        method: &'static str,
        path: String,
        status: u16,
        body: String,
    },
    #[error("unable to decode response of {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown resource '{0}'")]
    UnknownResource(String),
    #[error("resource '{resource}' has no action '{action}'")]
    UnknownAction { resource: String, action: String },
    #[error("{resource} entity is missing '{field}'")]
    MissingField { resource: String, field: String },
    #[error("task {id} did not finish within {waited:?} (last state '{state}')")]
    TaskTimeout {
        id: String,
        state: String,
        waited: Duration,
    },
    #[error("task {id} ({label}) finished with result '{result}'")]
    TaskFailed {
        id: String,
        label: String,
        result: String,
    },
}

impl ApiError {
    /// HTTP status when the server answered with an error response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
