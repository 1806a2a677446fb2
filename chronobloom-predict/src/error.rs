//! Errors surfaced by the prediction bridge.

use chronobloom_types::{InvocationError, QueryError};
use thiserror::Error;

/// Errors from [`PromptBuilder::build`](crate::PromptBuilder::build).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BuildError {
    /// No observations were supplied; a prediction cannot be requested
    /// from empty data.
    #[error("no observations to build a prediction request from")]
    EmptyInput,

    /// No targets were supplied and the builder has no defaults.
    #[error("no prediction targets")]
    NoTargets,

    /// Observations could not be rendered.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// Errors from [`extract`](crate::extract), whole-response or per record.
///
/// Whole-response variants keep the raw text so the failure can be
/// diagnosed without re-running the invocation.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// No `[` ... `]` pair in the response.
    #[error("no JSON array delimiters in response")]
    DelimitersNotFound {
        /// The full response text.
        raw: String,
    },

    /// The delimited slice is not a JSON array.
    #[error("response array is not valid JSON: {message}")]
    InvalidStructure {
        /// Parser message.
        message: String,
        /// The full response text.
        raw: String,
    },

    /// A record lacks a required field.
    #[error("record {index}: missing required field {field}")]
    MissingField {
        /// Zero-based record position in the array.
        index: usize,
        /// Name of the missing field.
        field: &'static str,
    },

    /// A record field is present but has the wrong type or value.
    #[error("record {index}: invalid {field}: {message}")]
    InvalidField {
        /// Zero-based record position in the array.
        index: usize,
        /// Name of the offending field.
        field: &'static str,
        /// What was wrong with it.
        message: String,
    },
}

impl ParseError {
    /// Raw response text carried by whole-response failures.
    pub fn raw(&self) -> Option<&str> {
        match self {
            ParseError::DelimitersNotFound { raw } | ParseError::InvalidStructure { raw, .. } => {
                Some(raw)
            }
            _ => None,
        }
    }
}

/// Errors from [`PredictionIngestor::ingest`](crate::PredictionIngestor::ingest).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum IngestError {
    /// The destination partition is confirmed absent. It has to be created
    /// by an administrator; retrying will not help.
    #[error("destination partition {0} does not exist")]
    IndexMissing(String),
}

/// Everything one bridge invocation can fail with.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The history store could not be asked, or had nothing.
    #[error("history query failed: {0}")]
    Query(#[from] QueryError),

    /// The request could not be built.
    #[error("request build failed: {0}")]
    Build(#[from] BuildError),

    /// The prediction service call failed.
    #[error("prediction service failed: {0}")]
    Invocation(#[from] InvocationError),

    /// The response could not be turned into predictions.
    #[error("response extraction failed: {0}")]
    Parse(#[from] ParseError),

    /// The predictions could not be ingested.
    #[error("ingestion failed: {0}")]
    Ingest(#[from] IngestError),
}

impl BridgeError {
    /// Whether re-running the bridge later might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            BridgeError::Query(e) => e.is_retryable(),
            BridgeError::Invocation(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn parse_error_display() {
        let err = ParseError::MissingField {
            index: 0,
            field: "predicted_phenophase",
        };
        assert_eq!(
            err.to_string(),
            "record 0: missing required field predicted_phenophase"
        );
        assert!(err.raw().is_none());
    }

    #[test]
    fn whole_response_errors_keep_raw() {
        let err = ParseError::DelimitersNotFound {
            raw: "no brackets here".into(),
        };
        assert_eq!(err.raw(), Some("no brackets here"));
    }

    #[test]
    fn bridge_retryability_follows_cause() {
        let timeout = BridgeError::from(InvocationError::Timeout(Duration::from_secs(60)));
        assert!(timeout.is_retryable());
        let missing = BridgeError::from(IngestError::IndexMissing("predictions".into()));
        assert!(!missing.is_retryable());
        assert!(!BridgeError::from(QueryError::Empty).is_retryable());
    }
}
