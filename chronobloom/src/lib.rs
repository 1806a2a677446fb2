#![deny(missing_docs)]
//! # chronobloom: umbrella crate
//!
//! One import surface for the chronobloom pipeline. Stage and backend
//! crates are re-exported behind feature flags; the `cli` feature adds the
//! environment configuration and log setup used by the two binaries:
//!
//! - `chronobloom-input` fetches or synthesizes observations and writes one
//!   JSON event per line to stdout. It always exits 0.
//! - `chronobloom-predict` reads observation history from Splunk, asks
//!   Gemini for predictions and writes them to the prediction index.

#[cfg(feature = "acquire")]
pub use chronobloom_acquire;
#[cfg(feature = "predict")]
pub use chronobloom_predict;
#[cfg(feature = "provider-gemini")]
pub use chronobloom_provider_gemini;
#[cfg(feature = "splunk")]
pub use chronobloom_splunk;
#[cfg(feature = "core")]
pub use chronobloom_types;

#[cfg(feature = "cli")]
pub mod config;
#[cfg(feature = "cli")]
pub mod logging;

/// Happy-path imports.
pub mod prelude {
    #[cfg(feature = "core")]
    pub use chronobloom_types::{
        Event, EventEnvelope, EventSink, HistoryFilter, HistoryStore, Observation,
        ObservationQuery, ObservationSource, PartitionCatalog, PredictionResult,
        PredictionService, QueryWindow, TargetSpec,
    };

    #[cfg(feature = "acquire")]
    pub use chronobloom_acquire::{AcquisitionPipeline, InputConfig, JsonLinesSink, NpnSource};

    #[cfg(feature = "predict")]
    pub use chronobloom_predict::{
        IngestPolicy, PredictionBridge, PredictionIngestor, PromptBuilder, extract,
    };

    #[cfg(feature = "splunk")]
    pub use chronobloom_splunk::{Splunk, SplunkConfig};

    #[cfg(feature = "provider-gemini")]
    pub use chronobloom_provider_gemini::Gemini;

    #[cfg(feature = "cli")]
    pub use crate::config::{BridgeConfig, ConfigError};
}
