#![deny(missing_docs)]
//! Splunk event store for chronobloom.
//!
//! One [`Splunk`] client covers all three store-side protocols:
//!
//! | Protocol | Endpoint |
//! |----------|----------|
//! | [`HistoryStore`](chronobloom_types::HistoryStore) | `POST /services/search/jobs/export` |
//! | [`EventSink`](chronobloom_types::EventSink) | `POST /services/receivers/simple` |
//! | [`PartitionCatalog`](chronobloom_types::PartitionCatalog) | `GET /services/data/indexes/{name}` |

pub mod client;
pub mod error;
mod export;

pub use client::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT, Splunk, SplunkConfig};
pub use error::SplunkError;
