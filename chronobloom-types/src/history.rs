//! The History protocol: reading stored observations back.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::event::{OBSERVATION_PARTITION, OBSERVATION_SOURCETYPE};
use crate::observation::{Observation, PhenophaseStatus};

/// Which stored events count as history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFilter {
    /// Partition to search.
    pub partition: String,
    /// Sourcetype the observation events were indexed under.
    pub sourcetype: String,
    /// Only observations with this status, when set.
    pub status: Option<PhenophaseStatus>,
}

impl Default for HistoryFilter {
    fn default() -> Self {
        Self {
            partition: OBSERVATION_PARTITION.into(),
            sourcetype: OBSERVATION_SOURCETYPE.into(),
            status: Some(PhenophaseStatus::Present),
        }
    }
}

impl HistoryFilter {
    /// Whether a decoded observation passes the status filter.
    pub fn matches(&self, observation: &Observation) -> bool {
        self.status.is_none_or(|status| observation.status == status)
    }
}

/// Time bounds and size cap for a history query.
///
/// `earliest`/`latest` are passed to the store verbatim (`"0"`, `"-30d"`,
/// `"now"`, or absolute timestamps).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryWindow {
    /// Lower time bound.
    pub earliest: String,
    /// Upper time bound.
    pub latest: String,
    /// Maximum number of observations returned.
    pub max_records: usize,
}

impl Default for QueryWindow {
    fn default() -> Self {
        Self {
            earliest: "0".into(),
            latest: "now".into(),
            max_records: 200,
        }
    }
}

/// Protocol ③: History
///
/// Returns stored observations in store order, deduplicated by id and
/// bounded by [`QueryWindow::max_records`]. An empty result is
/// [`QueryError::Empty`], never `Ok(vec![])`.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Run one query.
    async fn query(
        &self,
        filter: &HistoryFilter,
        window: &QueryWindow,
    ) -> Result<Vec<Observation>, QueryError>;
}

/// Drop repeated ids (first occurrence wins) and cap at `max_records`.
///
/// Returns [`QueryError::Empty`] when nothing is left.
pub fn dedup_bounded(
    observations: impl IntoIterator<Item = Observation>,
    max_records: usize,
) -> Result<Vec<Observation>, QueryError> {
    let mut seen = HashSet::new();
    let kept: Vec<Observation> = observations
        .into_iter()
        .filter(|obs| seen.insert(obs.id.clone()))
        .take(max_records)
        .collect();
    if kept.is_empty() {
        return Err(QueryError::Empty);
    }
    Ok(kept)
}
