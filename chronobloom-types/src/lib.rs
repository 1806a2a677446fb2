//! # chronobloom-types: shared model and protocol traits
//!
//! This crate defines what flows through the chronobloom pipeline and the
//! boundaries every stage talks through.
//!
//! ## The Protocols
//!
//! | Protocol | Trait | What it does |
//! |----------|-------|-------------|
//! | ① Source | [`ObservationSource`] | Fetch observation records from upstream |
//! | ② Sink | [`EventSink`], [`PartitionCatalog`] | Write one event to a partition |
//! | ③ History | [`HistoryStore`] | Read back a bounded window of stored observations |
//! | ④ Prediction | [`PredictionService`] | Send a prompt, receive raw text |
//!
//! ## Two stages, loosely coupled
//!
//! Acquisition writes observation events to a sink. The prediction bridge
//! later reads them back through a [`HistoryStore`]. The two stages never
//! call each other; the event store is the only thing they share.
//!
//! Events are a closed enum ([`Event`]) so the serialization boundary
//! handles every payload kind exhaustively.

#![deny(missing_docs)]

pub mod error;
pub mod event;
pub mod history;
pub mod observation;
pub mod prediction;
pub mod service;
pub mod sink;
pub mod source;

#[cfg(feature = "test-utils")]
pub mod test_utils;

// Re-exports for convenience
pub use error::{EmitError, InvocationError, QueryError, SourceError};
pub use event::{
    DIAGNOSTIC_SOURCE_TAG, Diagnostic, Event, EventEnvelope, OBSERVATION_PARTITION,
    OBSERVATION_SOURCETYPE, PREDICTION_PARTITION, PREDICTION_SOURCETYPE, PredictionEvent,
};
pub use history::{HistoryFilter, HistoryStore, QueryWindow, dedup_bounded};
pub use observation::{Intensity, Observation, PhenophaseStatus};
pub use prediction::{PredictedDate, PredictionRequest, PredictionResult, Provenance, TargetSpec};
pub use service::PredictionService;
pub use sink::{EventSink, PartitionCatalog};
pub use source::{ObservationQuery, ObservationSource};
