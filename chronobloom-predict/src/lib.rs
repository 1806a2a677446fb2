#![deny(missing_docs)]
//! Prediction bridge for chronobloom.
//!
//! Turns stored observation history into a prediction request, sends it to
//! a [`PredictionService`](chronobloom_types::PredictionService), pulls the
//! JSON array out of whatever text comes back, and writes the validated
//! predictions to their own partition.
//!
//! | Stage | Item |
//! |-------|------|
//! | Build | [`PromptBuilder`] |
//! | Extract | [`extract`], [`IngestPolicy`] |
//! | Ingest | [`PredictionIngestor`] |
//! | Orchestrate | [`PredictionBridge`] |
//!
//! Failures before ingestion write nothing. Unlike acquisition there is no
//! fallback output: a failed invocation is reported, not papered over.

pub mod bridge;
pub mod builder;
pub mod error;
pub mod extract;
pub mod ingest;

pub use bridge::{BridgeReport, DEFAULT_SOURCE_LABEL, PredictionBridge};
pub use builder::{DEFAULT_MAX_OBSERVATIONS, PromptBuilder, SCHEMA_VERSION, build, default_targets};
pub use error::{BridgeError, BuildError, IngestError, ParseError};
pub use extract::{Extraction, IngestPolicy, extract};
pub use ingest::{IngestReport, PredictionIngestor};
