//! Error helpers for mapping HTTP/reqwest errors onto the protocol errors.

use std::time::Duration;

use chronobloom_types::{EmitError, QueryError};
use thiserror::Error;

/// Errors constructing a [`Splunk`](crate::Splunk) client.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SplunkError {
    /// The HTTP client could not be built (TLS backend, invalid settings).
    #[error("http client: {0}")]
    Client(#[from] reqwest::Error),

    /// The base URL is not usable.
    #[error("invalid base url: {0}")]
    InvalidUrl(String),
}

/// Map a search-side HTTP status to a [`QueryError`].
pub(crate) fn map_query_status(status: reqwest::StatusCode, body: &str) -> QueryError {
    match status.as_u16() {
        401 | 403 => QueryError::Auth(format!("HTTP {status}: {body}")),
        _ => QueryError::Connection(format!("HTTP {status}: {body}")),
    }
}

/// Map a [`reqwest::Error`] from a search to a [`QueryError`].
pub(crate) fn map_query_error(err: reqwest::Error, timeout: Duration) -> QueryError {
    if err.is_timeout() {
        QueryError::Timeout(timeout)
    } else {
        QueryError::Connection(err.to_string())
    }
}

/// Map a [`reqwest::Error`] from a submission to an [`EmitError`].
pub(crate) fn map_emit_error(err: reqwest::Error) -> EmitError {
    EmitError::Transport(err.to_string())
}
