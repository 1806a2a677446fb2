//! Splunk REST client and its protocol implementations.

use std::time::Duration;

use async_trait::async_trait;
use chronobloom_types::{
    EmitError, Event, EventEnvelope, EventSink, HistoryFilter, HistoryStore, Observation,
    PartitionCatalog, QueryError, QueryWindow, dedup_bounded,
};

use crate::error::{SplunkError, map_emit_error, map_query_error, map_query_status};
use crate::export::{parse_export, render_search};

/// Default management endpoint.
pub const DEFAULT_BASE_URL: &str = "https://localhost:8089";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// `host` recorded on submitted events.
const DEFAULT_HOST_LABEL: &str = "chronobloom";

/// Connection settings for [`Splunk`].
#[derive(Debug, Clone)]
pub struct SplunkConfig {
    /// Management base URL, e.g. `https://localhost:8089`.
    pub base_url: String,
    /// Basic-auth user; requests go unauthenticated when `None`.
    pub username: Option<String>,
    /// Basic-auth password.
    pub password: Option<String>,
    /// Verify the server certificate. Local instances usually run self-signed.
    pub verify_tls: bool,
    /// Per-request timeout.
    pub timeout: Duration,
    /// `host` field attached to submitted events.
    pub host_label: String,
}

impl Default for SplunkConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            username: None,
            password: None,
            verify_tls: false,
            timeout: DEFAULT_TIMEOUT,
            host_label: DEFAULT_HOST_LABEL.into(),
        }
    }
}

/// Client for a Splunk management endpoint.
///
/// Implements [`HistoryStore`] over the search export endpoint,
/// [`EventSink`] over the simple receiver and [`PartitionCatalog`] over the
/// index listing.
///
/// # Example
///
/// ```no_run
/// use chronobloom_splunk::{Splunk, SplunkConfig};
///
/// let splunk = Splunk::new(SplunkConfig {
///     base_url: "https://splunk.internal:8089".into(),
///     username: Some("admin".into()),
///     password: Some("changeme".into()),
///     ..SplunkConfig::default()
/// })?;
/// # Ok::<(), chronobloom_splunk::SplunkError>(())
/// ```
pub struct Splunk {
    config: SplunkConfig,
    client: reqwest::Client,
}

impl Splunk {
    /// Build a client from `config`.
    pub fn new(config: SplunkConfig) -> Result<Self, SplunkError> {
        if !(config.base_url.starts_with("http://") || config.base_url.starts_with("https://")) {
            return Err(SplunkError::InvalidUrl(config.base_url));
        }
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, client })
    }

    /// The settings this client was built with.
    pub fn config(&self) -> &SplunkConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.username {
            Some(user) => request.basic_auth(user, self.config.password.as_deref()),
            None => request,
        }
    }

    /// Run the export search for `filter` and decode every result.
    async fn export(
        &self,
        filter: &HistoryFilter,
        window: &QueryWindow,
    ) -> Result<Vec<Observation>, QueryError> {
        let url = self.url("/services/search/jobs/export");
        let search = render_search(filter);
        tracing::debug!(url = %url, search = %search, earliest = %window.earliest, latest = %window.latest, "running history export");

        let form = [
            ("search", search.as_str()),
            ("earliest_time", window.earliest.as_str()),
            ("latest_time", window.latest.as_str()),
            ("output_mode", "json"),
        ];
        let response = self
            .authed(self.client.post(&url))
            .form(&form)
            .send()
            .await
            .map_err(|e| map_query_error(e, self.config.timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| map_query_error(e, self.config.timeout))?;
        if !status.is_success() {
            return Err(map_query_status(status, &body));
        }
        parse_export(&body)
    }
}

#[async_trait]
impl HistoryStore for Splunk {
    async fn query(
        &self,
        filter: &HistoryFilter,
        window: &QueryWindow,
    ) -> Result<Vec<Observation>, QueryError> {
        let decoded = self.export(filter, window).await?;
        let total = decoded.len();
        let kept = dedup_bounded(
            decoded.into_iter().filter(|obs| filter.matches(obs)),
            window.max_records,
        )?;
        tracing::info!(returned = total, kept = kept.len(), "history query complete");
        Ok(kept)
    }
}

/// `source` recorded for an envelope on submission.
fn event_source(envelope: &EventEnvelope) -> &str {
    match &envelope.event {
        Event::Prediction(prediction) => &prediction.provenance.source,
        Event::Observation(observation) => &observation.source_tag,
        Event::Diagnostic(_) => "chronobloom-input",
    }
}

#[async_trait]
impl EventSink for Splunk {
    async fn emit(&self, envelope: &EventEnvelope) -> Result<(), EmitError> {
        let url = self.url("/services/receivers/simple");
        let body = envelope.to_line()?;
        tracing::debug!(url = %url, partition = %envelope.partition, "submitting event");

        let response = self
            .authed(self.client.post(&url))
            .query(&[
                ("index", envelope.partition.as_str()),
                ("sourcetype", envelope.sourcetype()),
                ("host", self.config.host_label.as_str()),
                ("source", event_source(envelope)),
            ])
            .body(body)
            .send()
            .await
            .map_err(map_emit_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(EmitError::Rejected {
            partition: envelope.partition.clone(),
            reason: format!("HTTP {status}: {text}"),
        })
    }
}

#[async_trait]
impl PartitionCatalog for Splunk {
    async fn partition_exists(&self, partition: &str) -> Result<bool, EmitError> {
        let url = self.url(&format!("/services/data/indexes/{partition}"));
        let response = self
            .authed(self.client.get(&url))
            .query(&[("output_mode", "json")])
            .send()
            .await
            .map_err(map_emit_error)?;

        match response.status() {
            status if status.is_success() => Ok(true),
            status if status == reqwest::StatusCode::NOT_FOUND => Ok(false),
            status => Err(EmitError::Transport(format!(
                "index lookup for {partition} failed: HTTP {status}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_base_url() {
        let result = Splunk::new(SplunkConfig {
            base_url: "localhost:8089".into(),
            ..SplunkConfig::default()
        });
        assert!(matches!(result, Err(SplunkError::InvalidUrl(_))));
    }

    #[test]
    fn joins_paths_without_double_slash() {
        let splunk = Splunk::new(SplunkConfig {
            base_url: "https://splunk:8089/".into(),
            ..SplunkConfig::default()
        })
        .unwrap();
        assert_eq!(
            splunk.url("/services/receivers/simple"),
            "https://splunk:8089/services/receivers/simple"
        );
    }

    #[test]
    fn event_source_per_event_kind() {
        use chrono::DateTime;
        use chronobloom_types::test_utils::sample_observation;
        use chronobloom_types::{
            Diagnostic, PREDICTION_PARTITION, PredictedDate, PredictionEvent, PredictionResult,
            Provenance,
        };

        let now = DateTime::from_timestamp(1_714_000_000, 0).unwrap();
        let mut observation = sample_observation("a");
        observation.source_tag = "USA-NPN".into();
        let prediction = PredictionEvent {
            result: PredictionResult {
                predicted_species: "Lilac".into(),
                predicted_phenophase: "First flower".into(),
                predicted_region: "New York".into(),
                predicted_date: PredictedDate::CannotPredict,
                confidence: None,
                notes: String::new(),
            },
            provenance: Provenance {
                source: "chronobloom-predict".into(),
                model: "gemini-1.5-flash-latest".into(),
                generated_at: now,
                partition: PREDICTION_PARTITION.into(),
            },
        };
        let diagnostic = Diagnostic::from_error(&"boom", now);

        assert_eq!(event_source(&EventEnvelope::observation(observation, now)), "USA-NPN");
        assert_eq!(
            event_source(&EventEnvelope::prediction(prediction, now)),
            "chronobloom-predict"
        );
        assert_eq!(
            event_source(&EventEnvelope::diagnostic(diagnostic, now)),
            "chronobloom-input"
        );
    }

    #[test]
    fn defaults_skip_tls_verification() {
        let config = SplunkConfig::default();
        assert!(!config.verify_tls);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(60));
    }
}
