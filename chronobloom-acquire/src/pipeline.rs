//! The acquisition run: configure, fetch, emit.
//!
//! ```text
//! Configuring ──► Fetching ──► Emitting ──► Done
//!      │              │            │
//!      └──────────────┴────────────┴──────► Degraded (one diagnostic event)
//! ```
//!
//! Individual emit failures are logged and skipped. Anything outside the
//! explicit failure points (a contract violation or a panic in a stage)
//! moves the run to `Degraded`, which emits exactly one diagnostic event.
//! A run never ends without having written something.

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chronobloom_types::{Diagnostic, EventEnvelope, EventSink, Observation, ObservationSource};
use futures_util::FutureExt;
use rand::Rng;
use thiserror::Error;

use crate::config::{InputConfig, SourceKind};
use crate::npn::NpnSource;
use crate::source::{FallbackGenerator, SourceAdapter};

/// States of one acquisition run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    /// Interpreting configuration.
    Configuring,
    /// Asking the source adapter for a batch.
    Fetching,
    /// Writing the batch, one event per observation.
    Emitting,
    /// Every observation was attempted.
    Done,
    /// The run failed outside the explicit failure points.
    Degraded,
}

/// Failures that degrade a run.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage returned data that breaks an invariant.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// A stage panicked.
    #[error("stage panicked: {0}")]
    Panicked(String),
}

/// Outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionReport {
    /// Terminal state, `Done` or `Degraded`.
    pub state: AcquisitionState,
    /// Every state entered, in order.
    pub trace: Vec<AcquisitionState>,
    /// Observation events written, including any written before degrading.
    pub emitted: usize,
    /// Observation events that failed to write.
    pub failed: usize,
    /// Degradation cause, when degraded.
    pub error: Option<String>,
    /// Whether the diagnostic event was written, when degraded.
    pub diagnostic_emitted: bool,
}

/// Observation writes attempted so far. Kept outside the unwind boundary
/// so a run that degrades mid-batch still reports what it wrote.
#[derive(Debug, Default)]
struct Tally {
    emitted: usize,
    failed: usize,
}

/// The diagnostic event a degraded run emits.
pub fn diagnostic_envelope(error: &PipelineError, now: DateTime<Utc>) -> EventEnvelope {
    EventEnvelope::diagnostic(Diagnostic::from_error(error, now), now)
}

/// One acquisition run, wired to its sink and RNG.
///
/// Consumed by [`run`](AcquisitionPipeline::run); build a fresh one per
/// invocation.
pub struct AcquisitionPipeline<R> {
    sink: Arc<dyn EventSink>,
    rng: R,
    source: Option<Box<dyn ObservationSource>>,
}

impl<R: Rng> AcquisitionPipeline<R> {
    /// Pipeline writing to `sink`, with `rng` feeding the synthetic fallback.
    pub fn new(sink: Arc<dyn EventSink>, rng: R) -> Self {
        Self {
            sink,
            rng,
            source: None,
        }
    }

    /// Use this live source instead of the one the configuration selects.
    #[must_use]
    pub fn with_source(mut self, source: Box<dyn ObservationSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Run to a terminal state.
    pub async fn run(self, config: &InputConfig) -> AcquisitionReport {
        let sink = Arc::clone(&self.sink);
        let mut trace = vec![AcquisitionState::Configuring];
        let mut tally = Tally::default();

        let outcome = AssertUnwindSafe(self.stages(config, &mut trace, &mut tally))
            .catch_unwind()
            .await;

        let error = match outcome {
            Ok(Ok(())) => {
                trace.push(AcquisitionState::Done);
                tracing::info!(emitted = tally.emitted, failed = tally.failed, "acquisition run complete");
                return AcquisitionReport {
                    state: AcquisitionState::Done,
                    trace,
                    emitted: tally.emitted,
                    failed: tally.failed,
                    error: None,
                    diagnostic_emitted: false,
                };
            }
            Ok(Err(err)) => err,
            Err(panic) => PipelineError::Panicked(panic_message(panic.as_ref())),
        };

        trace.push(AcquisitionState::Degraded);
        tracing::error!(error = %error, emitted = tally.emitted, "acquisition run degraded");

        let envelope = diagnostic_envelope(&error, Utc::now());
        let diagnostic_emitted = match sink.emit(&envelope).await {
            Ok(()) => true,
            Err(emit_err) => {
                tracing::error!(error = %emit_err, "failed to emit diagnostic event");
                false
            }
        };

        AcquisitionReport {
            state: AcquisitionState::Degraded,
            trace,
            emitted: tally.emitted,
            failed: tally.failed,
            error: Some(error.to_string()),
            diagnostic_emitted,
        }
    }

    async fn stages(
        self,
        config: &InputConfig,
        trace: &mut Vec<AcquisitionState>,
        tally: &mut Tally,
    ) -> Result<(), PipelineError> {
        let settings = config.settings();
        let fallback = FallbackGenerator::new(self.rng).batch_size(settings.batch_size);
        let live = match (self.source, settings.source) {
            (Some(source), _) => Some(source),
            (None, SourceKind::Npn) => {
                let mut npn = NpnSource::new().lookback_days(settings.lookback_days);
                if let Some(key) = &settings.api_key {
                    npn = npn.api_key(key.clone());
                }
                Some(Box::new(npn) as Box<dyn ObservationSource>)
            }
            (None, SourceKind::Synthetic) => None,
        };
        let mut adapter = match live {
            Some(live) => SourceAdapter::with_live(live, fallback),
            None => SourceAdapter::synthetic(fallback),
        };
        tracing::debug!(query = ?settings.query, source = ?settings.source, "configured");

        trace.push(AcquisitionState::Fetching);
        let batch = adapter.fetch(&settings.query).await;
        check_batch(&batch)?;

        trace.push(AcquisitionState::Emitting);
        for observation in batch {
            let id = observation.id.clone();
            let envelope = EventEnvelope::observation(observation, Utc::now());
            match self.sink.emit(&envelope).await {
                Ok(()) => tally.emitted += 1,
                Err(err) => {
                    tracing::warn!(observation_id = %id, error = %err, "emit failed, skipping");
                    tally.failed += 1;
                }
            }
        }
        Ok(())
    }
}

/// Ids unique within the batch, coordinates in range.
fn check_batch(batch: &[Observation]) -> Result<(), PipelineError> {
    let mut seen = HashSet::new();
    for obs in batch {
        if !seen.insert(obs.id.as_str()) {
            return Err(PipelineError::ContractViolation(format!(
                "duplicate observation id {} in batch",
                obs.id
            )));
        }
        if !obs.has_valid_coordinates() {
            return Err(PipelineError::ContractViolation(format!(
                "observation {} has coordinates out of range ({}, {})",
                obs.id, obs.latitude, obs.longitude
            )));
        }
    }
    Ok(())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chronobloom_types::test_utils::{InMemoryEventStore, StaticSource, sample_observation};
    use chronobloom_types::{
        EmitError, Event, OBSERVATION_PARTITION, ObservationQuery, SourceError,
    };
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    struct PanickingSource;

    #[async_trait]
    impl ObservationSource for PanickingSource {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn fetch(&self, _query: &ObservationQuery) -> Result<Vec<Observation>, SourceError> {
            panic!("upstream client bug");
        }
    }

    /// Sink that panics on one observation id.
    struct PanickingSink {
        inner: Arc<InMemoryEventStore>,
        id: &'static str,
    }

    #[async_trait]
    impl EventSink for PanickingSink {
        async fn emit(&self, envelope: &EventEnvelope) -> Result<(), EmitError> {
            if let Event::Observation(obs) = &envelope.event {
                if obs.id == self.id {
                    panic!("sink bug on {}", obs.id);
                }
            }
            self.inner.emit(envelope).await
        }
    }

    fn pipeline(store: &Arc<InMemoryEventStore>) -> AcquisitionPipeline<StdRng> {
        AcquisitionPipeline::new(
            Arc::clone(store) as Arc<dyn EventSink>,
            StdRng::seed_from_u64(3),
        )
    }

    #[tokio::test]
    async fn default_config_emits_synthetic_batch() {
        let store = Arc::new(InMemoryEventStore::new());
        let report = pipeline(&store).run(&InputConfig::default()).await;
        assert_eq!(report.state, AcquisitionState::Done);
        assert_eq!(
            report.trace,
            [
                AcquisitionState::Configuring,
                AcquisitionState::Fetching,
                AcquisitionState::Emitting,
                AcquisitionState::Done
            ]
        );
        assert_eq!(report.emitted, 5);
        assert_eq!(store.observations(OBSERVATION_PARTITION).len(), 5);
    }

    #[tokio::test]
    async fn malformed_config_still_emits() {
        let store = Arc::new(InMemoryEventStore::new());
        let config =
            InputConfig::from_args(["species_ids=x,y", "phenophase_ids=", "states=123"]);
        let report = pipeline(&store).run(&config).await;
        assert_eq!(report.state, AcquisitionState::Done);
        let observations = store.observations(OBSERVATION_PARTITION);
        assert_eq!(observations.len(), 5);
        assert!(observations.iter().all(|o| o.species_id == 3 && o.region_code == "CA"));
    }

    #[tokio::test]
    async fn emits_in_source_order() {
        let store = Arc::new(InMemoryEventStore::new());
        let batch = ["c", "a", "b"].map(sample_observation).to_vec();
        let report = pipeline(&store)
            .with_source(Box::new(StaticSource::new(batch)))
            .run(&InputConfig::default())
            .await;
        assert_eq!(report.emitted, 3);
        let ids: Vec<_> = store
            .observations(OBSERVATION_PARTITION)
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }

    #[tokio::test]
    async fn single_emit_failure_is_skipped() {
        let store = Arc::new(InMemoryEventStore::new().rejecting("a"));
        let batch = ["a", "b", "c"].map(sample_observation).to_vec();
        let report = pipeline(&store)
            .with_source(Box::new(StaticSource::new(batch)))
            .run(&InputConfig::default())
            .await;
        assert_eq!(report.state, AcquisitionState::Done);
        assert_eq!(report.emitted, 2);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn duplicate_ids_degrade_with_one_diagnostic() {
        let store = Arc::new(InMemoryEventStore::new());
        let batch = vec![sample_observation("dup"), sample_observation("dup")];
        let report = pipeline(&store)
            .with_source(Box::new(StaticSource::new(batch)))
            .run(&InputConfig::default())
            .await;
        assert_eq!(report.state, AcquisitionState::Degraded);
        assert!(report.diagnostic_emitted);
        let envelopes = store.envelopes();
        assert_eq!(envelopes.len(), 1);
        match &envelopes[0].event {
            Event::Diagnostic(d) => assert!(d.error.contains("duplicate observation id dup")),
            other => panic!("expected diagnostic, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn panicking_source_degrades() {
        let store = Arc::new(InMemoryEventStore::new());
        let report = pipeline(&store)
            .with_source(Box::new(PanickingSource))
            .run(&InputConfig::default())
            .await;
        assert_eq!(report.state, AcquisitionState::Degraded);
        assert_eq!(*report.trace.last().unwrap(), AcquisitionState::Degraded);
        assert!(report.error.unwrap().contains("upstream client bug"));
        let envelopes = store.envelopes();
        assert_eq!(envelopes.len(), 1);
        let wire = envelopes[0].to_wire().unwrap();
        assert_eq!(wire["source_tag"], "ERROR");
    }

    #[tokio::test]
    async fn panic_mid_batch_reports_events_already_written() {
        let store = Arc::new(InMemoryEventStore::new());
        let sink = Arc::new(PanickingSink {
            inner: Arc::clone(&store),
            id: "c",
        });
        let batch = ["a", "b", "c", "d"].map(sample_observation).to_vec();
        let report = AcquisitionPipeline::new(sink as Arc<dyn EventSink>, StdRng::seed_from_u64(3))
            .with_source(Box::new(StaticSource::new(batch)))
            .run(&InputConfig::default())
            .await;

        assert_eq!(report.state, AcquisitionState::Degraded);
        assert_eq!((report.emitted, report.failed), (2, 0));
        assert!(report.diagnostic_emitted);
        assert_eq!(store.observations(OBSERVATION_PARTITION).len(), 2);
        assert_eq!(store.envelopes().len(), 3);
    }

    #[test]
    fn diagnostic_envelope_shape() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let env = diagnostic_envelope(&PipelineError::ContractViolation("x".into()), now);
        let wire = env.to_wire().unwrap();
        assert_eq!(wire["error"], "contract violation: x");
        assert_eq!(wire["timestamp"], 1_700_000_000);
        assert_eq!(wire["source_tag"], "ERROR");
    }
}
