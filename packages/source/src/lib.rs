#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Connectors for the public, key-free APIs datamill ingests from.
//!
//! Each connector module exposes a query struct and an async fetch
//! function that flattens the API's nested payload into the flat record
//! types from `datamill_source_models`. All HTTP traffic goes through
//! [`retry`] so transient failures are retried with exponential backoff.

pub mod earthquakes;
pub mod holidays;
pub mod pageviews;
pub mod progress;
pub mod retry;

/// User agent sent with every request, identifying this tool to the
/// upstream APIs.
pub const USER_AGENT: &str = "datamill/0.1 (+https://github.com/datamill/datamill)";

/// Errors that can occur while fetching from a data source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The endpoint answered, but not with the shape the connector
    /// expects (or with a non-retryable error status).
    #[error("{source_id}: {message}")]
    Fetch {
        /// Identifier of the connector that issued the request.
        source_id: String,
        /// Description of what was wrong with the response.
        message: String,
    },

    /// Transient failures persisted through every retry attempt.
    #[error("transient failure after {attempts} attempts (last status: {status:?})")]
    RetriesExhausted {
        /// Last HTTP status observed, if the server answered at all.
        status: Option<reqwest::StatusCode>,
        /// Total attempts made before giving up.
        attempts: u32,
    },

    /// The caller's query parameters are unusable.
    #[error("invalid query: {message}")]
    InvalidQuery {
        /// Description of the problem.
        message: String,
    },
}

/// Builds the shared HTTP client used by all connectors.
///
/// # Errors
///
/// Returns [`SourceError::Http`] if the TLS backend fails to initialize.
pub fn http_client() -> Result<reqwest::Client, SourceError> {
    Ok(reqwest::Client::builder().user_agent(USER_AGENT).build()?)
}
