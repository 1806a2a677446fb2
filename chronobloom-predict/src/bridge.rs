//! The prediction bridge: history in, predictions back out.

use std::sync::Arc;

use chrono::Utc;
use chronobloom_types::{
    HistoryFilter, HistoryStore, PREDICTION_PARTITION, PredictionService, Provenance, QueryWindow,
    TargetSpec,
};
use serde::Serialize;

use crate::builder::PromptBuilder;
use crate::error::BridgeError;
use crate::extract::{IngestPolicy, extract};
use crate::ingest::{IngestReport, PredictionIngestor};

/// `source` recorded in prediction provenance by default.
pub const DEFAULT_SOURCE_LABEL: &str = "chronobloom-predict";

/// Characters of the raw response included in log lines.
const RAW_SNIPPET_CHARS: usize = 500;

/// Summary of one successful invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BridgeReport {
    /// Observations embedded in the request.
    pub observations: usize,
    /// Targets asked about.
    pub targets: usize,
    /// Records found in the response array.
    pub extracted: usize,
    /// Records that failed validation.
    pub rejected: usize,
    /// What ingestion did.
    pub ingest: IngestReport,
}

/// One query → build → invoke → extract → ingest pass.
///
/// Every stage is attempted once. Any failure before ingestion returns
/// without writing anything; no fallback prediction is produced.
pub struct PredictionBridge<P> {
    history: Arc<dyn HistoryStore>,
    service: P,
    ingestor: PredictionIngestor,
    builder: PromptBuilder,
    filter: HistoryFilter,
    window: QueryWindow,
    targets: Vec<TargetSpec>,
    policy: IngestPolicy,
    source_label: String,
    partition: String,
}

impl<P: PredictionService> PredictionBridge<P> {
    /// Bridge with default filter, window, targets and policy.
    pub fn new(history: Arc<dyn HistoryStore>, service: P, ingestor: PredictionIngestor) -> Self {
        Self {
            history,
            service,
            ingestor,
            builder: PromptBuilder::new(),
            filter: HistoryFilter::default(),
            window: QueryWindow::default(),
            targets: Vec::new(),
            policy: IngestPolicy::default(),
            source_label: DEFAULT_SOURCE_LABEL.into(),
            partition: PREDICTION_PARTITION.into(),
        }
    }

    /// Replace the prompt builder.
    #[must_use]
    pub fn builder(mut self, builder: PromptBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Which stored observations to read.
    #[must_use]
    pub fn filter(mut self, filter: HistoryFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Time window and record bound for the history query.
    #[must_use]
    pub fn window(mut self, window: QueryWindow) -> Self {
        self.window = window;
        self
    }

    /// Targets to predict. Empty means the builder's defaults.
    #[must_use]
    pub fn targets(mut self, targets: Vec<TargetSpec>) -> Self {
        self.targets = targets;
        self
    }

    /// How partially valid responses are handled.
    #[must_use]
    pub fn policy(mut self, policy: IngestPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// `source` recorded in provenance.
    #[must_use]
    pub fn source_label(mut self, label: impl Into<String>) -> Self {
        self.source_label = label.into();
        self
    }

    /// Destination partition for predictions.
    #[must_use]
    pub fn partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = partition.into();
        self
    }

    /// The prediction service this bridge invokes.
    pub fn service(&self) -> &P {
        &self.service
    }

    /// Run one invocation.
    pub async fn run(&self) -> Result<BridgeReport, BridgeError> {
        let observations = self
            .history
            .query(&self.filter, &self.window)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "history query failed"))?;
        tracing::info!(count = observations.len(), "fetched observation history");

        let request = self.builder.build(&observations, &self.targets)?;

        let raw = self
            .service
            .invoke(&request)
            .await
            .inspect_err(|e| {
                tracing::error!(model = %self.service.model(), error = %e, retryable = e.is_retryable(), "prediction service failed");
            })?;
        tracing::debug!(raw = %snippet(&raw), "prediction response received");

        let extraction = extract(&raw).inspect_err(|e| {
            tracing::error!(error = %e, raw = %snippet(&raw), "could not extract predictions");
        })?;
        let extracted = extraction.len();
        let rejected = extraction.rejected().count();
        for error in extraction.rejected() {
            tracing::warn!(error = %error, policy = %self.policy, "prediction record rejected");
        }

        let results = extraction.accept(self.policy).inspect_err(|e| {
            tracing::error!(error = %e, raw = %snippet(&raw), "response discarded");
        })?;

        let provenance = Provenance {
            source: self.source_label.clone(),
            model: self.service.model().to_string(),
            generated_at: Utc::now(),
            partition: self.partition.clone(),
        };
        let ingest = self.ingestor.ingest(&results, &provenance).await?;

        Ok(BridgeReport {
            observations: request.observations.len(),
            targets: request.targets.len(),
            extracted,
            rejected,
            ingest,
        })
    }
}

/// First [`RAW_SNIPPET_CHARS`] characters of `raw`.
fn snippet(raw: &str) -> &str {
    match raw.char_indices().nth(RAW_SNIPPET_CHARS) {
        Some((end, _)) => &raw[..end],
        None => raw,
    }
}
