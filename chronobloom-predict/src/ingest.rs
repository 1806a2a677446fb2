//! Prediction ingestion into the prediction partition.

use std::sync::Arc;

use chrono::Utc;
use chronobloom_types::{
    EventEnvelope, EventSink, PartitionCatalog, PredictionEvent, PredictionResult, Provenance,
};
use serde::Serialize;

use crate::error::IngestError;

/// Outcome of one ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Partition written to.
    pub partition: String,
    /// Predictions accepted by the sink.
    pub succeeded: usize,
    /// Predictions the sink refused.
    pub failed: usize,
}

/// Wraps validated predictions with provenance and writes them.
pub struct PredictionIngestor {
    sink: Arc<dyn EventSink>,
    catalog: Arc<dyn PartitionCatalog>,
}

impl PredictionIngestor {
    /// Ingestor writing through `sink` after checking `catalog`.
    pub fn new(sink: Arc<dyn EventSink>, catalog: Arc<dyn PartitionCatalog>) -> Self {
        Self { sink, catalog }
    }

    /// Write every result to `provenance.partition`, in order.
    ///
    /// A single failed write is counted and skipped. The whole call fails
    /// only when the catalog confirms the partition is absent; a catalog
    /// lookup error is logged and the writes are attempted anyway.
    pub async fn ingest(
        &self,
        results: &[PredictionResult],
        provenance: &Provenance,
    ) -> Result<IngestReport, IngestError> {
        let partition = provenance.partition.clone();
        if results.is_empty() {
            return Ok(IngestReport {
                partition,
                succeeded: 0,
                failed: 0,
            });
        }

        match self.catalog.partition_exists(&partition).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::error!(partition = %partition, "prediction partition does not exist; create it before ingesting");
                return Err(IngestError::IndexMissing(partition));
            }
            Err(e) => {
                tracing::warn!(partition = %partition, error = %e, "partition lookup failed; attempting writes");
            }
        }

        let mut report = IngestReport {
            partition,
            succeeded: 0,
            failed: 0,
        };
        for (index, result) in results.iter().enumerate() {
            let envelope = EventEnvelope::prediction(
                PredictionEvent {
                    result: result.clone(),
                    provenance: provenance.clone(),
                },
                Utc::now(),
            );
            match self.sink.emit(&envelope).await {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    tracing::warn!(index, species = %result.predicted_species, error = %e, "prediction write failed");
                    report.failed += 1;
                }
            }
        }
        tracing::info!(
            partition = %report.partition,
            succeeded = report.succeeded,
            failed = report.failed,
            "ingested predictions"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::DateTime;
    use chronobloom_types::test_utils::InMemoryEventStore;
    use chronobloom_types::{EmitError, Event, PREDICTION_PARTITION, PredictedDate};

    fn result(species: &str) -> PredictionResult {
        PredictionResult {
            predicted_species: species.into(),
            predicted_phenophase: "First flower".into(),
            predicted_region: "New York".into(),
            predicted_date: PredictedDate::CannotPredict,
            confidence: None,
            notes: "sparse data".into(),
        }
    }

    fn provenance() -> Provenance {
        Provenance {
            source: "chronobloom-predict".into(),
            model: "canned-model".into(),
            generated_at: DateTime::from_timestamp(1_714_000_000, 0).unwrap(),
            partition: PREDICTION_PARTITION.into(),
        }
    }

    /// Sink refusing predictions for one species.
    struct RefusingSink {
        inner: InMemoryEventStore,
        species: &'static str,
    }

    #[async_trait]
    impl EventSink for RefusingSink {
        async fn emit(&self, envelope: &EventEnvelope) -> Result<(), EmitError> {
            if let Event::Prediction(p) = &envelope.event {
                if p.result.predicted_species == self.species {
                    return Err(EmitError::Transport("connection reset".into()));
                }
            }
            self.inner.emit(envelope).await
        }
    }

    /// Catalog whose lookup always errors.
    struct BrokenCatalog;

    #[async_trait]
    impl PartitionCatalog for BrokenCatalog {
        async fn partition_exists(&self, _partition: &str) -> Result<bool, EmitError> {
            Err(EmitError::Transport("lookup refused".into()))
        }
    }

    #[tokio::test]
    async fn writes_each_result_with_provenance() {
        let store = Arc::new(InMemoryEventStore::new());
        let ingestor = PredictionIngestor::new(store.clone(), store.clone());
        let report = ingestor
            .ingest(&[result("Lilac"), result("Red maple")], &provenance())
            .await
            .unwrap();
        assert_eq!(
            report,
            IngestReport {
                partition: "predictions".into(),
                succeeded: 2,
                failed: 0
            }
        );
        let written = store.in_partition(PREDICTION_PARTITION);
        assert_eq!(written.len(), 2);
        match &written[0].event {
            Event::Prediction(p) => {
                assert_eq!(p.result.predicted_species, "Lilac");
                assert_eq!(p.provenance, provenance());
            }
            other => panic!("expected prediction, got {other:?}"),
        }
        assert_eq!(written[0].sourcetype(), "chrono_predictions");
    }

    #[tokio::test]
    async fn missing_partition_is_fatal_and_writes_nothing() {
        let store = Arc::new(InMemoryEventStore::new().without_partition(PREDICTION_PARTITION));
        let ingestor = PredictionIngestor::new(store.clone(), store.clone());
        let err = ingestor
            .ingest(&[result("Lilac")], &provenance())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::IndexMissing(p) if p == "predictions"));
        assert!(store.envelopes().is_empty());
    }

    #[tokio::test]
    async fn single_failure_does_not_abort() {
        let store = Arc::new(InMemoryEventStore::new());
        let sink = Arc::new(RefusingSink {
            inner: InMemoryEventStore::new(),
            species: "Lilac",
        });
        let ingestor = PredictionIngestor::new(sink.clone(), store);
        let report = ingestor
            .ingest(
                &[result("Lilac"), result("Red maple"), result("American robin")],
                &provenance(),
            )
            .await
            .unwrap();
        assert_eq!((report.succeeded, report.failed), (2, 1));
        assert_eq!(sink.inner.in_partition(PREDICTION_PARTITION).len(), 2);
    }

    #[tokio::test]
    async fn catalog_error_still_attempts_writes() {
        let store = Arc::new(InMemoryEventStore::new());
        let ingestor = PredictionIngestor::new(store.clone(), Arc::new(BrokenCatalog));
        let report = ingestor
            .ingest(&[result("Lilac")], &provenance())
            .await
            .unwrap();
        assert_eq!(report.succeeded, 1);
    }

    #[tokio::test]
    async fn nothing_to_ingest_skips_lookup() {
        let store = Arc::new(InMemoryEventStore::new().without_partition(PREDICTION_PARTITION));
        let ingestor = PredictionIngestor::new(store.clone(), store.clone());
        let report = ingestor.ingest(&[], &provenance()).await.unwrap();
        assert_eq!((report.succeeded, report.failed), (0, 0));
    }
}
