//! Live observation source backed by the USA-NPN observation API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use chronobloom_types::{
    Intensity, Observation, ObservationQuery, ObservationSource, PhenophaseStatus, SourceError,
};
use serde_json::Value;

use crate::source::{phenophase_name, species_name};

/// Default USA-NPN services base URL.
const DEFAULT_BASE_URL: &str = "https://services.usanpn.org";

/// Default `request_src` sent with every call.
const DEFAULT_REQUEST_SRC: &str = "chronobloom";

/// `source_tag` of records fetched from USA-NPN.
pub const NPN_SOURCE_TAG: &str = "NPN";

/// Client for `getObservations.json`.
///
/// # Example
///
/// ```no_run
/// use chronobloom_acquire::NpnSource;
///
/// let source = NpnSource::new()
///     .lookback_days(14)
///     .request_src("my-pipeline");
/// ```
pub struct NpnSource {
    pub(crate) base_url: String,
    pub(crate) request_src: String,
    pub(crate) api_key: Option<String>,
    pub(crate) lookback_days: u32,
    pub(crate) timeout: Duration,
    client: reqwest::Client,
}

impl NpnSource {
    /// Client with the public endpoint, a 30-day window and a 30s timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            request_src: DEFAULT_REQUEST_SRC.into(),
            api_key: None,
            lookback_days: crate::config::DEFAULT_LOOKBACK_DAYS,
            timeout: Duration::from_secs(30),
            client: reqwest::Client::new(),
        }
    }

    /// Override the base URL (mock servers, mirrors).
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Override the `request_src` identifier.
    #[must_use]
    pub fn request_src(mut self, src: impl Into<String>) -> Self {
        self.request_src = src.into();
        self
    }

    /// Send an `api_key` parameter with each request.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Days before today the observation window starts.
    #[must_use]
    pub fn lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = days;
        self
    }

    /// Per-request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn observations_url(&self) -> String {
        format!(
            "{}/npn_portal/observations/getObservations.json",
            self.base_url.trim_end_matches('/')
        )
    }

    pub(crate) fn query_params(
        &self,
        query: &ObservationQuery,
        today: NaiveDate,
    ) -> Vec<(String, String)> {
        let start = today
            .checked_sub_days(Days::new(u64::from(self.lookback_days)))
            .unwrap_or(today);
        let mut params = Vec::new();
        for (i, id) in query.species_ids.iter().enumerate() {
            params.push((format!("species_id[{i}]"), id.to_string()));
        }
        for (i, id) in query.phenophase_ids.iter().enumerate() {
            params.push((format!("phenophase_id[{i}]"), id.to_string()));
        }
        for (i, code) in query.region_codes.iter().enumerate() {
            params.push((format!("state[{i}]"), code.clone()));
        }
        params.push(("start_date".into(), start.format("%Y-%m-%d").to_string()));
        params.push(("end_date".into(), today.format("%Y-%m-%d").to_string()));
        params.push(("request_src".into(), self.request_src.clone()));
        if let Some(key) = &self.api_key {
            params.push(("api_key".into(), key.clone()));
        }
        params
    }
}

impl Default for NpnSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObservationSource for NpnSource {
    fn name(&self) -> &str {
        "usa-npn"
    }

    async fn fetch(&self, query: &ObservationQuery) -> Result<Vec<Observation>, SourceError> {
        let now = Utc::now();
        let url = self.observations_url();
        let params = self.query_params(query, now.date_naive());

        tracing::debug!(url = %url, params = params.len(), "requesting USA-NPN observations");

        let response = self
            .client
            .get(&url)
            .query(&params)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_reqwest_error(e))?;
        if !status.is_success() {
            return Err(SourceError::Unavailable(format!("HTTP {status}: {body}")));
        }

        let records: Vec<Value> = serde_json::from_str(&body)
            .map_err(|e| SourceError::InvalidResponse(format!("expected a JSON array: {e}")))?;

        let total = records.len();
        let observations: Vec<Observation> = records
            .iter()
            .filter_map(|record| map_record(record, now))
            .collect();
        if observations.len() < total {
            tracing::warn!(
                dropped = total - observations.len(),
                kept = observations.len(),
                "dropped malformed USA-NPN records"
            );
        }
        Ok(observations)
    }
}

impl NpnSource {
    fn map_reqwest_error(&self, err: reqwest::Error) -> SourceError {
        if err.is_timeout() {
            SourceError::Timeout(self.timeout)
        } else {
            SourceError::Unavailable(err.to_string())
        }
    }
}

/// Map one USA-NPN record. Returns `None` for records that cannot form a
/// valid observation (missing ids, bad dates, out-of-range coordinates,
/// uncertain status).
pub(crate) fn map_record(record: &Value, collected_at: DateTime<Utc>) -> Option<Observation> {
    let id = match record.get("observation_id")? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let species_id = u32::try_from(number(record, "species_id")? as i64).ok()?;
    let phenophase_id = u32::try_from(number(record, "phenophase_id")? as i64).ok()?;
    let observation_date =
        NaiveDate::parse_from_str(text(record, "observation_date")?, "%Y-%m-%d").ok()?;
    let status = match number(record, "phenophase_status")? as i64 {
        0 => PhenophaseStatus::Absent,
        1 => PhenophaseStatus::Present,
        _ => return None,
    };
    let observed_at = observation_date.and_hms_opt(0, 0, 0)?.and_utc();

    let observation = Observation {
        id,
        species_id,
        species_name: text(record, "common_name")
            .map(String::from)
            .unwrap_or_else(|| species_name(species_id)),
        phenophase_id,
        phenophase_name: text(record, "phenophase_description")
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| phenophase_name(phenophase_id)),
        observation_date,
        observed_at,
        latitude: number(record, "latitude")?,
        longitude: number(record, "longitude")?,
        region_code: text(record, "state")?.trim().to_ascii_uppercase(),
        site_name: text(record, "site_name")
            .map(String::from)
            .or_else(|| record.get("site_id").map(|v| format!("Site {}", plain(v))))
            .unwrap_or_default(),
        status,
        intensity: text(record, "intensity_value")
            .map(|s| Intensity::from(s.to_string()))
            .unwrap_or_default(),
        source_tag: NPN_SOURCE_TAG.into(),
        collected_at,
    };
    observation.has_valid_coordinates().then_some(observation)
}

fn number(record: &Value, key: &str) -> Option<f64> {
    match record.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text<'a>(record: &'a Value, key: &str) -> Option<&'a str> {
    record.get(key)?.as_str().filter(|s| !s.trim().is_empty())
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
