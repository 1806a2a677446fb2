#![deny(missing_docs)]
//! Observation acquisition for chronobloom.
//!
//! Fetches observation records from USA-NPN (or synthesizes them when the
//! upstream is unavailable) and writes each as one JSON line to a sink.
//! The run always emits at least one event: the batch, or a single
//! diagnostic when the run degrades.

pub mod config;
pub mod emit;
pub mod npn;
pub mod pipeline;
pub mod source;

pub use config::{AcquisitionSettings, InputConfig, SourceKind, parse_ids, parse_regions};
pub use emit::JsonLinesSink;
pub use npn::NpnSource;
pub use pipeline::{
    AcquisitionPipeline, AcquisitionReport, AcquisitionState, PipelineError, diagnostic_envelope,
};
pub use source::{FallbackGenerator, SourceAdapter};
