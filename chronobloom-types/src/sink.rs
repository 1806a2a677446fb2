//! The Sink protocol: where events go.

use async_trait::async_trait;

use crate::error::EmitError;
use crate::event::EventEnvelope;

/// Protocol ②: Sink
///
/// Writes one event per call. When `emit` returns `Ok`, any buffered output
/// has been flushed to the immediate transport boundary; downstream
/// durability is not promised.
///
/// Implementations do not retry. A failed emit is reported and the caller
/// decides whether to skip or try again.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Write a single envelope.
    async fn emit(&self, envelope: &EventEnvelope) -> Result<(), EmitError>;
}

/// Lookup of named partitions at the destination.
///
/// Partitions are created by an administrator, never by this system.
#[async_trait]
pub trait PartitionCatalog: Send + Sync {
    /// Whether `partition` exists. `Ok(false)` means confirmed absent.
    async fn partition_exists(&self, partition: &str) -> Result<bool, EmitError>;
}
