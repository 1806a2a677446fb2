//! `key=value` configuration for an acquisition run.
//!
//! Parsing never fails. Malformed tokens are dropped and missing or empty
//! values fall back to the defaults, so a run always has something to do.

use std::collections::BTreeMap;

use chronobloom_types::ObservationQuery;

/// Default `species_ids`: Red maple, American robin, Lilac.
pub const DEFAULT_SPECIES_IDS: &str = "3,35,52";
/// Default `phenophase_ids`: First leaf, First flower, Full bloom.
pub const DEFAULT_PHENOPHASE_IDS: &str = "373,501,390";
/// Default `states`.
pub const DEFAULT_STATES: &str = "CA,NY,TX";
/// Default size of the synthetic fallback batch.
pub const DEFAULT_BATCH_SIZE: usize = 5;
/// Default live-source lookback.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 30;

const MAX_LIST_LEN: usize = 64;
const MAX_BATCH_SIZE: usize = 1000;

const KNOWN_KEYS: [&str; 7] = [
    "species_ids",
    "phenophase_ids",
    "states",
    "api_key",
    "source",
    "batch_size",
    "lookback_days",
];

/// Raw configuration: the default map overridden by command-line tokens.
///
/// Unknown keys are stored and otherwise ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputConfig {
    values: BTreeMap<String, String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        let values = [
            ("species_ids", DEFAULT_SPECIES_IDS),
            ("phenophase_ids", DEFAULT_PHENOPHASE_IDS),
            ("states", DEFAULT_STATES),
            ("api_key", ""),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self { values }
    }
}

impl InputConfig {
    /// Apply `key=value` tokens over the defaults. Tokens without `=` are ignored.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = Self::default();
        for arg in args {
            let arg = arg.as_ref();
            match arg.split_once('=') {
                Some((key, value)) => {
                    config.values.insert(key.trim().to_string(), value.to_string());
                }
                None => tracing::debug!(token = %arg, "ignoring argument without '='"),
            }
        }
        config
    }

    /// Raw value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Keys this crate does not interpret, with their values.
    pub fn extra(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .filter(|(k, _)| !KNOWN_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Interpret the raw values.
    pub fn settings(&self) -> AcquisitionSettings {
        let query = ObservationQuery {
            species_ids: parse_ids(self.get("species_ids").unwrap_or_default()),
            phenophase_ids: parse_ids(self.get("phenophase_ids").unwrap_or_default()),
            region_codes: parse_regions(self.get("states").unwrap_or_default()),
        };
        let source = match self.get("source").map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("npn") => SourceKind::Npn,
            Some(s) if !s.is_empty() && !s.eq_ignore_ascii_case("synthetic") => {
                tracing::debug!(source = %s, "unknown source kind, using synthetic");
                SourceKind::Synthetic
            }
            _ => SourceKind::Synthetic,
        };
        let api_key = self
            .get("api_key")
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from);
        let batch_size = self
            .get("batch_size")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|n| (1..=MAX_BATCH_SIZE).contains(n))
            .unwrap_or(DEFAULT_BATCH_SIZE);
        let lookback_days = self
            .get("lookback_days")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_LOOKBACK_DAYS);

        AcquisitionSettings {
            query,
            source,
            api_key,
            batch_size,
            lookback_days,
        }
    }
}

/// Which upstream feeds the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SourceKind {
    /// Synthetic records only.
    #[default]
    Synthetic,
    /// The USA-NPN observation API, falling back to synthetic records.
    Npn,
}

/// Interpreted configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionSettings {
    /// Filter sets; any may be empty.
    pub query: ObservationQuery,
    /// Upstream selection.
    pub source: SourceKind,
    /// Key for the live source, if any.
    pub api_key: Option<String>,
    /// Fallback batch size.
    pub batch_size: usize,
    /// Live-source lookback in days.
    pub lookback_days: u32,
}

/// Parse comma-separated integer ids. Malformed tokens are dropped.
pub fn parse_ids(raw: &str) -> Vec<u32> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter_map(|t| match t.parse::<u32>() {
            Ok(id) => Some(id),
            Err(_) => {
                tracing::debug!(token = %t, "dropping malformed id");
                None
            }
        })
        .take(MAX_LIST_LEN)
        .collect()
}

/// Parse comma-separated region codes, uppercased. Anything that is not
/// two ASCII letters is dropped.
pub fn parse_regions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter_map(|t| {
            if t.len() == 2 && t.chars().all(|c| c.is_ascii_alphabetic()) {
                Some(t.to_ascii_uppercase())
            } else {
                tracing::debug!(token = %t, "dropping malformed region code");
                None
            }
        })
        .take(MAX_LIST_LEN)
        .collect()
}
