//! The Source protocol: where observations come from.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::observation::Observation;

/// Filter sets for an observation fetch. Any set may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationQuery {
    /// Species identifiers to include.
    pub species_ids: Vec<u32>,
    /// Phenophase identifiers to include.
    pub phenophase_ids: Vec<u32>,
    /// Uppercase two-letter region codes to include.
    pub region_codes: Vec<String>,
}

/// Protocol ①: Source
///
/// A read-only upstream of observation records. Implementations report
/// unavailability as a [`SourceError`]; deciding what to do about it is
/// the caller's job.
#[async_trait]
pub trait ObservationSource: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Fetch the records matching `query`.
    async fn fetch(&self, query: &ObservationQuery) -> Result<Vec<Observation>, SourceError>;
}
