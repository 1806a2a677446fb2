//! JSON-lines event emitter.

use std::io::{self, Write};
use std::sync::Mutex;

use async_trait::async_trait;
use chronobloom_types::{EmitError, EventEnvelope, EventSink};

/// Writes one JSON object per line and flushes after every event.
///
/// On stdout this is the wire format the downstream collection agent reads.
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl JsonLinesSink<io::Stdout> {
    /// Sink over the process's standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// Sink over any writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_line(&self, line: &str) -> Result<(), EmitError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| EmitError::Transport(e.to_string()))?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

#[async_trait]
impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    async fn emit(&self, envelope: &EventEnvelope) -> Result<(), EmitError> {
        let line = envelope.to_line()?;
        self.write_line(&line)
    }
}
