//! Prediction request and result types.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::observation::Observation;

/// One (species, phenophase, region) triple a prediction is sought for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    /// Species common name, e.g. "Lilac".
    pub species_name: String,
    /// Phenophase name, e.g. "First flower".
    pub phenophase_name: String,
    /// Region name, e.g. "New York".
    pub region_name: String,
}

impl TargetSpec {
    /// Create a new target triple.
    pub fn new(
        species_name: impl Into<String>,
        phenophase_name: impl Into<String>,
        region_name: impl Into<String>,
    ) -> Self {
        Self {
            species_name: species_name.into(),
            phenophase_name: phenophase_name.into(),
            region_name: region_name.into(),
        }
    }
}

/// A rendered request for the prediction service.
///
/// Built fresh per invocation and never persisted. The prompt is a pure
/// function of the other fields.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRequest {
    /// Observations embedded in the prompt, in input order. Never empty.
    pub observations: Vec<Observation>,
    /// Version of the output schema the prompt asks for.
    pub schema_version: String,
    /// Targets predictions are requested for, in order.
    pub targets: Vec<TargetSpec>,
    /// The rendered prompt text.
    pub prompt: String,
}

/// The predicted date: an ISO date or the literal `"Cannot predict"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PredictedDate {
    /// A concrete calendar date.
    Date(NaiveDate),
    /// The model declined; `notes` carries the reason.
    CannotPredict,
}

impl PredictedDate {
    /// The literal the model must use when it declines.
    pub const CANNOT_PREDICT: &'static str = "Cannot predict";
}

impl TryFrom<String> for PredictedDate {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case(Self::CANNOT_PREDICT) {
            return Ok(PredictedDate::CannotPredict);
        }
        NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .map(PredictedDate::Date)
            .map_err(|_| {
                format!(
                    "expected YYYY-MM-DD or \"{}\", got {value:?}",
                    Self::CANNOT_PREDICT
                )
            })
    }
}

impl From<PredictedDate> for String {
    fn from(value: PredictedDate) -> Self {
        value.to_string()
    }
}

impl fmt::Display for PredictedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictedDate::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            PredictedDate::CannotPredict => f.write_str(Self::CANNOT_PREDICT),
        }
    }
}

/// A validated prediction for one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Species the prediction is for.
    pub predicted_species: String,
    /// Phenophase the prediction is for.
    pub predicted_phenophase: String,
    /// Region the prediction is for.
    #[serde(alias = "predicted_state")]
    pub predicted_region: String,
    /// Predicted date, or the model's refusal.
    pub predicted_date: PredictedDate,
    /// Confidence in [0, 1], when the model offers one.
    #[serde(alias = "confidence_score", default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Reasoning or assumptions behind the prediction.
    #[serde(default)]
    pub notes: String,
}

/// Where an ingested prediction came from and where it goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Identifier of the producing component, e.g. `chronobloom-predict`.
    pub source: String,
    /// Model or service identifier that generated the predictions.
    pub model: String,
    /// When the predictions were generated.
    pub generated_at: DateTime<Utc>,
    /// Destination partition, distinct from the observation partition.
    pub partition: String,
}
