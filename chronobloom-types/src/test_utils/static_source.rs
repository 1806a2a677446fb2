//! StaticSource: returns a fixed batch, or fails on demand.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};

use crate::error::SourceError;
use crate::observation::{Intensity, Observation, PhenophaseStatus};
use crate::source::{ObservationQuery, ObservationSource};

/// An [`ObservationSource`] with a canned answer.
pub struct StaticSource {
    batch: Option<Vec<Observation>>,
    calls: AtomicUsize,
}

impl StaticSource {
    /// A source that always returns `batch`.
    pub fn new(batch: Vec<Observation>) -> Self {
        Self {
            batch: Some(batch),
            calls: AtomicUsize::new(0),
        }
    }

    /// A source that is always unavailable.
    pub fn unavailable() -> Self {
        Self {
            batch: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of fetches so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObservationSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self, _query: &ObservationQuery) -> Result<Vec<Observation>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batch
            .clone()
            .ok_or_else(|| SourceError::Unavailable("static source configured to fail".into()))
    }
}

/// A plausible observation with the given id.
pub fn sample_observation(id: &str) -> Observation {
    Observation {
        id: id.into(),
        species_id: 52,
        species_name: "Lilac".into(),
        phenophase_id: 501,
        phenophase_name: "First flower".into(),
        observation_date: NaiveDate::from_ymd_opt(2024, 4, 28).unwrap_or_default(),
        observed_at: DateTime::from_timestamp(1_714_262_400, 0).unwrap_or_default(),
        latitude: 42.65,
        longitude: -73.75,
        region_code: "NY".into(),
        site_name: "Albany Pine Bush".into(),
        status: PhenophaseStatus::Present,
        intensity: Intensity::High,
        source_tag: "NPN".into(),
        collected_at: DateTime::from_timestamp(1_714_262_460, 0).unwrap_or_default(),
    }
}
