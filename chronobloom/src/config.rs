//! Environment configuration for the prediction binary.

use std::time::Duration;

use chronobloom_predict::{DEFAULT_MAX_OBSERVATIONS, IngestPolicy};
use chronobloom_provider_gemini::{DEFAULT_MODEL, Gemini};
use chronobloom_splunk::SplunkConfig;
use chronobloom_types::{
    HistoryFilter, OBSERVATION_PARTITION, OBSERVATION_SOURCETYPE, PREDICTION_PARTITION,
    PhenophaseStatus, QueryWindow,
};
use thiserror::Error;

/// Configuration errors. The prediction binary exits 1 on any of these.
#[non_exhaustive]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("{0} is not set")]
    Missing(&'static str),

    /// Predictions would be written into the observation partition.
    #[error("prediction index {0} is the same as the source index")]
    SamePartition(String),
}

/// Everything `chronobloom-predict` reads from its environment.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Splunk connection.
    pub splunk: SplunkConfig,
    /// Index and sourcetype the observation history is read from.
    pub filter: HistoryFilter,
    /// Search window and record bound.
    pub window: QueryWindow,
    /// Index predictions are written to.
    pub prediction_index: String,
    /// Per-request timeout for both Splunk and Gemini.
    pub timeout: Duration,
    /// Partial-response handling.
    pub policy: IngestPolicy,
    /// Gemini API key.
    pub gemini_api_key: String,
    /// Gemini model name.
    pub gemini_model: String,
}

impl BridgeConfig {
    /// Read the process environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`. Empty values count as unset.
    ///
    /// Unparseable optional values fall back to their defaults with a
    /// warning; only a missing API key or a partition clash is an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let text = |name: &str, default: &str| var(name).unwrap_or_else(|| default.to_string());

        let gemini_api_key = var("GEMINI_API_KEY").ok_or(ConfigError::Missing("GEMINI_API_KEY"))?;

        let timeout = Duration::from_secs(parsed(&var, "CHRONOBLOOM_TIMEOUT_SECS", 60u64));
        let splunk = SplunkConfig {
            base_url: format!(
                "{}://{}:{}",
                text("SPLUNK_SCHEME", "https"),
                text("SPLUNK_HOST", "localhost"),
                parsed(&var, "SPLUNK_PORT", 8089u16)
            ),
            username: var("SPLUNK_USERNAME"),
            password: var("SPLUNK_PASSWORD"),
            verify_tls: var("SPLUNK_VERIFY_TLS").is_some_and(|v| truthy(&v)),
            timeout,
            ..SplunkConfig::default()
        };

        let filter = HistoryFilter {
            partition: text("CHRONOBLOOM_SOURCE_INDEX", OBSERVATION_PARTITION),
            sourcetype: text("CHRONOBLOOM_SOURCETYPE", OBSERVATION_SOURCETYPE),
            status: Some(PhenophaseStatus::Present),
        };
        let prediction_index = text("CHRONOBLOOM_PREDICTION_INDEX", PREDICTION_PARTITION);
        if prediction_index == filter.partition {
            return Err(ConfigError::SamePartition(prediction_index));
        }

        let window = QueryWindow {
            earliest: text("CHRONOBLOOM_EARLIEST", "0"),
            latest: text("CHRONOBLOOM_LATEST", "now"),
            max_records: parsed(&var, "CHRONOBLOOM_MAX_RECORDS", DEFAULT_MAX_OBSERVATIONS).max(1),
        };

        Ok(Self {
            splunk,
            filter,
            window,
            prediction_index,
            timeout,
            policy: parsed(&var, "CHRONOBLOOM_INGEST_POLICY", IngestPolicy::default()),
            gemini_api_key,
            gemini_model: text("GEMINI_MODEL", DEFAULT_MODEL),
        })
    }

    /// Gemini client for this configuration.
    pub fn gemini(&self) -> Gemini {
        Gemini::new(self.gemini_api_key.clone())
            .with_model(self.gemini_model.clone())
            .timeout(self.timeout)
    }
}

fn parsed<T, V>(var: &V, name: &str, default: T) -> T
where
    T: std::str::FromStr,
    V: Fn(&str) -> Option<String>,
{
    match var(name) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(variable = name, value = %raw, "unparseable value, using default");
            default
        }),
    }
}

fn truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let err = BridgeConfig::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("GEMINI_API_KEY"));
        let err = BridgeConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("GEMINI_API_KEY"));
    }

    #[test]
    fn defaults() {
        let config = BridgeConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "k")])).unwrap();
        assert_eq!(config.splunk.base_url, "https://localhost:8089");
        assert!(!config.splunk.verify_tls);
        assert_eq!(config.splunk.username, None);
        assert_eq!(config.filter, HistoryFilter::default());
        assert_eq!(config.window, QueryWindow::default());
        assert_eq!(config.prediction_index, "predictions");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.policy, IngestPolicy::AllOrNothing);
        assert_eq!(config.gemini_model, "gemini-1.5-flash-latest");
    }

    #[test]
    fn overrides() {
        let config = BridgeConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("GEMINI_MODEL", "gemini-1.5-pro-latest"),
            ("SPLUNK_SCHEME", "http"),
            ("SPLUNK_HOST", "splunk.lab"),
            ("SPLUNK_PORT", "18089"),
            ("SPLUNK_USERNAME", "admin"),
            ("SPLUNK_PASSWORD", "changeme"),
            ("SPLUNK_VERIFY_TLS", "TRUE"),
            ("CHRONOBLOOM_SOURCE_INDEX", "phenology"),
            ("CHRONOBLOOM_EARLIEST", "-30d"),
            ("CHRONOBLOOM_MAX_RECORDS", "50"),
            ("CHRONOBLOOM_TIMEOUT_SECS", "15"),
            ("CHRONOBLOOM_INGEST_POLICY", "best-effort"),
        ]))
        .unwrap();
        assert_eq!(config.splunk.base_url, "http://splunk.lab:18089");
        assert_eq!(config.splunk.username.as_deref(), Some("admin"));
        assert!(config.splunk.verify_tls);
        assert_eq!(config.splunk.timeout, Duration::from_secs(15));
        assert_eq!(config.filter.partition, "phenology");
        assert_eq!(config.window.earliest, "-30d");
        assert_eq!(config.window.max_records, 50);
        assert_eq!(config.policy, IngestPolicy::BestEffort);
        assert_eq!(config.gemini_model, "gemini-1.5-pro-latest");
    }

    #[test]
    fn bad_numbers_fall_back() {
        let config = BridgeConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("SPLUNK_PORT", "eighty"),
            ("CHRONOBLOOM_MAX_RECORDS", "-5"),
            ("CHRONOBLOOM_INGEST_POLICY", "whatever"),
        ]))
        .unwrap();
        assert_eq!(config.splunk.base_url, "https://localhost:8089");
        assert_eq!(config.window.max_records, 200);
        assert_eq!(config.policy, IngestPolicy::AllOrNothing);
    }

    #[test]
    fn prediction_index_must_differ() {
        let err = BridgeConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("CHRONOBLOOM_PREDICTION_INDEX", "main"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::SamePartition("main".into()));
    }
}
