//! Direct-messaging REST client library
//!
//! This crate provides the HTTP transport used by the Grapevine messaging
//! core: a REST client with retry support and error-body diagnostics, plus
//! the authenticated session context extracted from the stored login cookie.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod rest;
pub mod session;

pub use rest::{ApiClient, ApiClientConfig, ApiError, ApiRequest, ApiResponse};
pub use session::{SessionContext, SessionStore};

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for transport operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API error surfaced by the service
    #[error(transparent)]
    Api(#[from] rest::ApiError),

    /// Session construction failure
    #[error(transparent)]
    Session(#[from] session::SessionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_wraps_api_error() {
        let err: Error = rest::ApiError::new(500, "ServerError", "boom").into();
        assert!(err.to_string().contains("boom"));
    }
}
