//! InMemoryEventStore: a Vec-backed event store for testing.

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{EmitError, QueryError};
use crate::event::{Event, EventEnvelope, OBSERVATION_PARTITION, PREDICTION_PARTITION};
use crate::history::{HistoryFilter, HistoryStore, QueryWindow, dedup_bounded};
use crate::observation::Observation;
use crate::sink::{EventSink, PartitionCatalog};

/// In-memory event store: a sink, a partition catalog and a history
/// reader over the same envelopes.
///
/// Time bounds in [`QueryWindow`] are ignored; everything written is in
/// the window.
pub struct InMemoryEventStore {
    envelopes: RwLock<Vec<EventEnvelope>>,
    partitions: RwLock<HashSet<String>>,
    rejected_ids: RwLock<HashSet<String>>,
}

impl InMemoryEventStore {
    /// A store with the observation and prediction partitions present.
    pub fn new() -> Self {
        let partitions = [OBSERVATION_PARTITION, PREDICTION_PARTITION]
            .into_iter()
            .map(String::from)
            .collect();
        Self {
            envelopes: RwLock::new(Vec::new()),
            partitions: RwLock::new(partitions),
            rejected_ids: RwLock::new(HashSet::new()),
        }
    }

    /// Remove a partition so writes to it fail and the catalog reports it absent.
    pub fn without_partition(self, partition: &str) -> Self {
        if let Ok(mut partitions) = self.partitions.write() {
            partitions.remove(partition);
        }
        self
    }

    /// Fail any emit of the observation with this id.
    pub fn rejecting(self, observation_id: &str) -> Self {
        if let Ok(mut ids) = self.rejected_ids.write() {
            ids.insert(observation_id.to_owned());
        }
        self
    }

    /// Every accepted envelope, in write order.
    pub fn envelopes(&self) -> Vec<EventEnvelope> {
        self.envelopes.read().map(|e| e.clone()).unwrap_or_default()
    }

    /// Accepted envelopes written to `partition`, in write order.
    pub fn in_partition(&self, partition: &str) -> Vec<EventEnvelope> {
        self.envelopes()
            .into_iter()
            .filter(|e| e.partition == partition)
            .collect()
    }

    /// Observations written to `partition`, in write order.
    pub fn observations(&self, partition: &str) -> Vec<Observation> {
        self.in_partition(partition)
            .into_iter()
            .filter_map(|e| match e.event {
                Event::Observation(obs) => Some(obs),
                _ => None,
            })
            .collect()
    }

    fn has_partition(&self, partition: &str) -> bool {
        self.partitions
            .read()
            .map(|p| p.contains(partition))
            .unwrap_or(false)
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSink for InMemoryEventStore {
    async fn emit(&self, envelope: &EventEnvelope) -> Result<(), EmitError> {
        if !self.has_partition(&envelope.partition) {
            return Err(EmitError::Rejected {
                partition: envelope.partition.clone(),
                reason: "partition does not exist".into(),
            });
        }
        if let Event::Observation(obs) = &envelope.event {
            let rejected = self
                .rejected_ids
                .read()
                .map(|ids| ids.contains(&obs.id))
                .unwrap_or(false);
            if rejected {
                return Err(EmitError::Transport(format!("injected failure for {}", obs.id)));
            }
        }
        // Same check a real transport makes before accepting bytes.
        envelope.to_line()?;
        let mut envelopes = self
            .envelopes
            .write()
            .map_err(|e| EmitError::Transport(e.to_string()))?;
        envelopes.push(envelope.clone());
        Ok(())
    }
}

#[async_trait]
impl PartitionCatalog for InMemoryEventStore {
    async fn partition_exists(&self, partition: &str) -> Result<bool, EmitError> {
        Ok(self.has_partition(partition))
    }
}

#[async_trait]
impl HistoryStore for InMemoryEventStore {
    async fn query(
        &self,
        filter: &HistoryFilter,
        window: &QueryWindow,
    ) -> Result<Vec<Observation>, QueryError> {
        let matching = self
            .observations(&filter.partition)
            .into_iter()
            .filter(|obs| filter.matches(obs));
        dedup_bounded(matching, window.max_records)
    }
}
