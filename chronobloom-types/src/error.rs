//! Error types for each protocol.

use std::time::Duration;

use thiserror::Error;

/// Observation source errors.
///
/// These never escape the source adapter: any of them switches the
/// adapter to its synthetic fallback batch.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SourceError {
    /// The upstream service could not be reached or answered with an error.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// The upstream answered, but the body could not be decoded.
    #[error("invalid source response: {0}")]
    InvalidResponse(String),

    /// The request exceeded its deadline.
    #[error("source timed out after {0:?}")]
    Timeout(Duration),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Event emission errors. Per-record: the caller decides whether to skip or retry.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EmitError {
    /// The envelope could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Writing to the transport failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The destination rejected the event.
    #[error("rejected by {partition}: {reason}")]
    Rejected {
        /// Partition the event was sent to.
        partition: String,
        /// Reason reported by the destination.
        reason: String,
    },

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl From<std::io::Error> for EmitError {
    fn from(err: std::io::Error) -> Self {
        EmitError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for EmitError {
    fn from(err: serde_json::Error) -> Self {
        EmitError::Serialization(err.to_string())
    }
}

/// History query errors.
///
/// `Empty` is kept apart from the failure variants so a caller can tell
/// "no data" from "failed to ask".
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum QueryError {
    /// Connecting to the store or executing the search failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The search exceeded its deadline.
    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    /// The search succeeded but returned no observation records.
    #[error("no observations in query window")]
    Empty,

    /// The store answered with something that is not a result stream.
    #[error("malformed query response: {0}")]
    Malformed(String),

    /// The store refused the credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The store ran the search and reported it as failed.
    #[error("search failed: {0}")]
    SearchFailed(String),
}

impl QueryError {
    /// Whether re-running the query later might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueryError::Connection(_) | QueryError::Timeout(_))
    }
}

/// Prediction service errors. Transport and service failures only; parsing
/// the returned text is a separate concern.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum InvocationError {
    /// The request exceeded its deadline.
    #[error("invocation timed out after {0:?}")]
    Timeout(Duration),

    /// HTTP or network failure before a response arrived.
    #[error("network error: {0}")]
    Network(String),

    /// The service answered with a non-success status.
    #[error("service error (HTTP {status}): {body}")]
    Service {
        /// HTTP status code.
        status: u16,
        /// Response body as returned.
        body: String,
    },

    /// Credentials were rejected.
    #[error("auth failed: {0}")]
    Auth(String),

    /// The service refused to answer the prompt.
    #[error("prompt blocked: {0}")]
    Blocked(String),

    /// The service answered without any text.
    #[error("empty response")]
    EmptyResponse,

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl InvocationError {
    /// Whether a later attempt might succeed. No component retries on its own;
    /// this is for the scheduler that re-runs the bridge.
    pub fn is_retryable(&self) -> bool {
        match self {
            InvocationError::Timeout(_) | InvocationError::Network(_) => true,
            InvocationError::Service { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
