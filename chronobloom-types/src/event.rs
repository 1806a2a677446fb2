//! Events and the envelope they travel in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::EmitError;
use crate::observation::Observation;
use crate::prediction::{PredictionResult, Provenance};

/// Partition observation and diagnostic events are written to.
pub const OBSERVATION_PARTITION: &str = "main";

/// Partition prediction events are written to.
pub const PREDICTION_PARTITION: &str = "predictions";

/// Sourcetype of observation and diagnostic events.
pub const OBSERVATION_SOURCETYPE: &str = "chronobloom";

/// Sourcetype of prediction events.
pub const PREDICTION_SOURCETYPE: &str = "chrono_predictions";

/// `source_tag` carried by diagnostic events.
pub const DIAGNOSTIC_SOURCE_TAG: &str = "ERROR";

/// Every payload kind the pipeline emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    /// An acquired observation.
    Observation(Observation),
    /// A parsed prediction, tagged with provenance.
    Prediction(PredictionEvent),
    /// The single event emitted when acquisition degrades.
    Diagnostic(Diagnostic),
}

/// A prediction wrapped with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionEvent {
    /// The validated prediction.
    pub result: PredictionResult,
    /// Who produced it, and where it goes.
    pub provenance: Provenance,
}

/// Fixed-shape failure report for a degraded acquisition run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Description of what went wrong.
    pub error: String,
    /// When the failure was recorded.
    pub timestamp: DateTime<Utc>,
}

impl Diagnostic {
    /// Build a diagnostic from any displayable error.
    pub fn from_error(error: &dyn std::fmt::Display, timestamp: DateTime<Utc>) -> Self {
        Self {
            error: error.to_string(),
            timestamp,
        }
    }
}

/// Transport wrapper around one event.
///
/// Created at write time; owned by the sink afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    /// The payload.
    pub event: Event,
    /// When the envelope was created for writing.
    pub emitted_at: DateTime<Utc>,
    /// Destination partition.
    pub partition: String,
}

impl EventEnvelope {
    /// Wrap an observation for the observation partition.
    pub fn observation(observation: Observation, emitted_at: DateTime<Utc>) -> Self {
        Self {
            event: Event::Observation(observation),
            emitted_at,
            partition: OBSERVATION_PARTITION.into(),
        }
    }

    /// Wrap a prediction for the partition named in its provenance.
    pub fn prediction(event: PredictionEvent, emitted_at: DateTime<Utc>) -> Self {
        let partition = event.provenance.partition.clone();
        Self {
            event: Event::Prediction(event),
            emitted_at,
            partition,
        }
    }

    /// Wrap a diagnostic for the observation partition.
    pub fn diagnostic(diagnostic: Diagnostic, emitted_at: DateTime<Utc>) -> Self {
        Self {
            event: Event::Diagnostic(diagnostic),
            emitted_at,
            partition: OBSERVATION_PARTITION.into(),
        }
    }

    /// Sourcetype the destination should index this event under.
    pub fn sourcetype(&self) -> &'static str {
        match &self.event {
            Event::Observation(_) | Event::Diagnostic(_) => OBSERVATION_SOURCETYPE,
            Event::Prediction(_) => PREDICTION_SOURCETYPE,
        }
    }

    /// The JSON object written to the transport.
    ///
    /// Observations go out flat; predictions are nested under `prediction`
    /// next to their provenance; diagnostics use the fixed
    /// `{error, timestamp, source_tag}` shape.
    pub fn to_wire(&self) -> Result<Value, EmitError> {
        let value = match &self.event {
            Event::Observation(observation) => serde_json::to_value(observation)?,
            Event::Prediction(prediction) => json!({
                "timestamp": self.emitted_at.to_rfc3339(),
                "source": prediction.provenance.source,
                "sourcetype": PREDICTION_SOURCETYPE,
                "model": prediction.provenance.model,
                "generated_at": prediction.provenance.generated_at.to_rfc3339(),
                "prediction": serde_json::to_value(&prediction.result)?,
            }),
            Event::Diagnostic(diagnostic) => json!({
                "error": diagnostic.error,
                "timestamp": diagnostic.timestamp.timestamp(),
                "source_tag": DIAGNOSTIC_SOURCE_TAG,
            }),
        };
        Ok(value)
    }

    /// The wire object as a single line of JSON, without a trailing newline.
    pub fn to_line(&self) -> Result<String, EmitError> {
        Ok(serde_json::to_string(&self.to_wire()?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prediction::PredictedDate;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn diagnostic_has_fixed_shape() {
        let envelope = EventEnvelope::diagnostic(
            Diagnostic::from_error(&"source adapter panicked", at(1_700_000_000)),
            at(1_700_000_001),
        );
        let wire = envelope.to_wire().unwrap();
        let obj = wire.as_object().unwrap();
        assert_eq!(obj.len(), 3);
        assert_eq!(wire["error"], "source adapter panicked");
        assert_eq!(wire["timestamp"], 1_700_000_000);
        assert_eq!(wire["source_tag"], "ERROR");
        assert_eq!(envelope.partition, OBSERVATION_PARTITION);
    }

    #[test]
    fn prediction_envelope_uses_provenance_partition() {
        let event = PredictionEvent {
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
                generated_at: at(1_700_000_000),
                partition: PREDICTION_PARTITION.into(),
            },
        };
        let envelope = EventEnvelope::prediction(event, at(1_700_000_005));
        assert_eq!(envelope.partition, "predictions");
        assert_eq!(envelope.sourcetype(), PREDICTION_SOURCETYPE);

        let wire = envelope.to_wire().unwrap();
        assert_eq!(wire["source"], "chronobloom-predict");
        assert_eq!(wire["sourcetype"], "chrono_predictions");
        assert_eq!(wire["prediction"]["predicted_species"], "Lilac");
        assert_eq!(wire["prediction"]["predicted_date"], "Cannot predict");
    }

    #[test]
    fn line_is_single_line_json() {
        let envelope = EventEnvelope::diagnostic(
            Diagnostic::from_error(&"multi\nline", at(0)),
            at(0),
        );
        let line = envelope.to_line().unwrap();
        assert!(!line.contains('\n'));
        let back: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(back["error"], "multi\nline");
    }
}
