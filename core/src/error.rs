//! Error types for the riddle API client.
//!
//! # Design
//! Callers branch on the variant: a `Network` failure means no response was
//! obtained (offer a retry), `Unauthorized` means the session is no longer
//! usable, and `Http` carries whatever the server said about the rejection.
//! A body that fails to parse on an error response never becomes its own
//! error; it is recorded as `body: None` on the `Http` variant.

use serde_json::Value;
use thiserror::Error;

use crate::transport::TransportError;

/// Errors returned by `ApiClient` and its collaborators.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A configuration value is malformed. Raised at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// The transport failed before a response was obtained.
    #[error("Network error: {0}")]
    Network(#[source] TransportError),

    /// The server answered 401 and no refresh recovered the session.
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// The server returned a non-2xx status other than 401.
    #[error("{message}")]
    Http {
        status: u16,
        message: String,
        body: Option<Value>,
    },

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A success body could not be decoded into the expected shape.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// A wrapper was called with an argument the backend would reject.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The session persistence adapter could not read or write its store.
    #[error("session persistence failed: {0}")]
    Persistence(String),
}

impl ApiError {
    /// HTTP status associated with the error, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized(_) => Some(401),
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }
}
