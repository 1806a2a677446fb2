//! Observation source adapter and its synthetic fallback.

use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use chronobloom_types::{
    Intensity, Observation, ObservationQuery, ObservationSource, PhenophaseStatus,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Species used when the query names none (Red maple).
pub const DEFAULT_SPECIES_ID: u32 = 3;
/// Phenophase used when the query names none (First leaf).
pub const DEFAULT_PHENOPHASE_ID: u32 = 373;
/// Region used when the query names none.
pub const DEFAULT_REGION_CODE: &str = "CA";
/// Latitude box for synthetic records.
pub const LATITUDE_RANGE: RangeInclusive<f64> = 32.0..=42.0;
/// Longitude box for synthetic records.
pub const LONGITUDE_RANGE: RangeInclusive<f64> = -120.0..=-100.0;
/// `source_tag` of synthetic records.
pub const SYNTHETIC_SOURCE_TAG: &str = "SYNTHETIC";

/// Common name for a species id.
pub fn species_name(id: u32) -> String {
    match id {
        3 => "Red maple".into(),
        35 => "American robin".into(),
        52 => "Lilac".into(),
        other => format!("Species_{other}"),
    }
}

/// Name for a phenophase id.
pub fn phenophase_name(id: u32) -> String {
    match id {
        373 => "First leaf".into(),
        501 => "First flower".into(),
        390 => "Full bloom".into(),
        other => format!("Phenophase_{other}"),
    }
}

/// Deterministic generator of synthetic observation batches.
///
/// Randomness comes from the injected `R`; seed it for reproducible output.
pub struct FallbackGenerator<R> {
    rng: R,
    batch_size: usize,
}

impl FallbackGenerator<StdRng> {
    /// Generator seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Generator with a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> FallbackGenerator<R> {
    /// Wrap an RNG. Batch size defaults to 5.
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            batch_size: crate::config::DEFAULT_BATCH_SIZE,
        }
    }

    /// Override the batch size (minimum 1).
    #[must_use]
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Produce one batch. Ids are `synthetic_{epoch}_{index}`, unique within
    /// the batch. Empty filter sets fall back to the default triple.
    pub fn generate(&mut self, query: &ObservationQuery, now: DateTime<Utc>) -> Vec<Observation> {
        let observed_at = DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now);
        (0..self.batch_size)
            .map(|i| {
                let species_id = query
                    .species_ids
                    .choose(&mut self.rng)
                    .copied()
                    .unwrap_or(DEFAULT_SPECIES_ID);
                let phenophase_id = query
                    .phenophase_ids
                    .choose(&mut self.rng)
                    .copied()
                    .unwrap_or(DEFAULT_PHENOPHASE_ID);
                let region_code = query
                    .region_codes
                    .choose(&mut self.rng)
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_REGION_CODE.into());
                let latitude = round6(self.rng.gen_range(LATITUDE_RANGE));
                let longitude = round6(self.rng.gen_range(LONGITUDE_RANGE));
                let status = if self.rng.gen_bool(0.5) {
                    PhenophaseStatus::Present
                } else {
                    PhenophaseStatus::Absent
                };
                let intensity = Intensity::ALL
                    .choose(&mut self.rng)
                    .copied()
                    .unwrap_or_default();

                Observation {
                    id: format!("synthetic_{}_{i}", now.timestamp()),
                    species_id,
                    species_name: species_name(species_id),
                    phenophase_id,
                    phenophase_name: phenophase_name(phenophase_id),
                    observation_date: now.date_naive(),
                    observed_at,
                    latitude,
                    longitude,
                    region_code,
                    site_name: format!("Synthetic Site {}", i + 1),
                    status,
                    intensity,
                    source_tag: SYNTHETIC_SOURCE_TAG.into(),
                    collected_at: now,
                }
            })
            .collect()
    }
}

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

/// Fetches observations, never failing.
///
/// Tries the live source when one is configured. An error or an empty
/// answer from it switches to a synthetic batch from the fallback generator.
pub struct SourceAdapter<R> {
    live: Option<Box<dyn ObservationSource>>,
    fallback: FallbackGenerator<R>,
}

impl<R: Rng> SourceAdapter<R> {
    /// Adapter with no live source: every fetch is synthetic.
    pub fn synthetic(fallback: FallbackGenerator<R>) -> Self {
        Self {
            live: None,
            fallback,
        }
    }

    /// Adapter backed by a live source.
    pub fn with_live(live: Box<dyn ObservationSource>, fallback: FallbackGenerator<R>) -> Self {
        Self {
            live: Some(live),
            fallback,
        }
    }

    /// Fetch a batch for `query`.
    pub async fn fetch(&mut self, query: &ObservationQuery) -> Vec<Observation> {
        self.fetch_at(query, Utc::now()).await
    }

    /// Fetch with an explicit clock, for reproducible fallback ids.
    pub async fn fetch_at(
        &mut self,
        query: &ObservationQuery,
        now: DateTime<Utc>,
    ) -> Vec<Observation> {
        if let Some(live) = &self.live {
            match live.fetch(query).await {
                Ok(batch) if !batch.is_empty() => {
                    tracing::info!(source = live.name(), count = batch.len(), "fetched observations");
                    return batch;
                }
                Ok(_) => {
                    tracing::warn!(source = live.name(), "source returned no observations, using fallback");
                }
                Err(err) => {
                    tracing::warn!(source = live.name(), error = %err, "source unavailable, using fallback");
                }
            }
        }
        let batch = self.fallback.generate(query, now);
        tracing::info!(count = batch.len(), "generated synthetic observations");
        batch
    }
}
