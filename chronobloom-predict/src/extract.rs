//! Response extraction: find the embedded JSON array and validate each record.

use std::fmt;
use std::str::FromStr;

use chronobloom_types::{PredictedDate, PredictionResult};
use serde_json::{Map, Value};

use crate::error::ParseError;

/// How per-record outcomes become the ingested batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestPolicy {
    /// Any failed record discards the whole response.
    #[default]
    AllOrNothing,
    /// Valid records are kept; failed ones are logged and dropped.
    BestEffort,
}

impl FromStr for IngestPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "all-or-nothing" => Ok(IngestPolicy::AllOrNothing),
            "best-effort" => Ok(IngestPolicy::BestEffort),
            other => Err(format!(
                "unknown ingest policy {other:?} (expected all-or-nothing or best-effort)"
            )),
        }
    }
}

impl fmt::Display for IngestPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IngestPolicy::AllOrNothing => "all-or-nothing",
            IngestPolicy::BestEffort => "best-effort",
        })
    }
}

/// Per-record outcomes of one response, in array order.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// One entry per array element.
    pub outcomes: Vec<Result<PredictionResult, ParseError>>,
}

impl Extraction {
    /// Records that validated.
    pub fn valid(&self) -> impl Iterator<Item = &PredictionResult> {
        self.outcomes.iter().filter_map(|o| o.as_ref().ok())
    }

    /// Records that failed, with their errors.
    pub fn rejected(&self) -> impl Iterator<Item = &ParseError> {
        self.outcomes.iter().filter_map(|o| o.as_ref().err())
    }

    /// Number of records in the response.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether the response array was empty.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Apply `policy`.
    ///
    /// All-or-nothing returns the first record error if there is one.
    /// Best-effort returns the valid records, or the first record error
    /// when none are valid.
    pub fn accept(self, policy: IngestPolicy) -> Result<Vec<PredictionResult>, ParseError> {
        let mut valid = Vec::with_capacity(self.outcomes.len());
        let mut first_error = None;
        for outcome in self.outcomes {
            match outcome {
                Ok(result) => valid.push(result),
                Err(err) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }
        match (policy, first_error) {
            (_, None) => Ok(valid),
            (IngestPolicy::AllOrNothing, Some(err)) => Err(err),
            (IngestPolicy::BestEffort, Some(err)) if valid.is_empty() => Err(err),
            (IngestPolicy::BestEffort, Some(_)) => Ok(valid),
        }
    }
}

/// Extract prediction records from raw service output.
///
/// The array is the slice from the first `[` to the last `]`, inclusive.
/// Prose around it is ignored. A second JSON array after the first one,
/// or a stray `]` in trailing prose, makes the slice unparseable.
pub fn extract(raw: &str) -> Result<Extraction, ParseError> {
    let (Some(start), Some(end)) = (raw.find('['), raw.rfind(']')) else {
        return Err(ParseError::DelimitersNotFound { raw: raw.to_string() });
    };
    if end < start {
        return Err(ParseError::DelimitersNotFound { raw: raw.to_string() });
    }

    let records: Vec<Value> =
        serde_json::from_str(&raw[start..=end]).map_err(|e| ParseError::InvalidStructure {
            message: e.to_string(),
            raw: raw.to_string(),
        })?;

    let outcomes = records
        .iter()
        .enumerate()
        .map(|(index, record)| validate(index, record))
        .collect();
    Ok(Extraction { outcomes })
}

/// Validate one record field by field, required fields first.
fn validate(index: usize, record: &Value) -> Result<PredictionResult, ParseError> {
    let Some(fields) = record.as_object() else {
        return Err(ParseError::InvalidField {
            index,
            field: "record",
            message: format!("expected an object, got {}", kind(record)),
        });
    };

    let predicted_species = required_str(index, fields, "predicted_species", &[])?;
    let predicted_phenophase = required_str(index, fields, "predicted_phenophase", &[])?;
    let predicted_region = required_str(index, fields, "predicted_region", &["predicted_state"])?;
    let date = required_str(index, fields, "predicted_date", &[])?;
    let predicted_date =
        PredictedDate::try_from(date).map_err(|message| ParseError::InvalidField {
            index,
            field: "predicted_date",
            message,
        })?;

    let confidence = confidence(index, lookup(fields, "confidence", &["confidence_score"]))?;
    let notes = match fields.get("notes") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            return Err(ParseError::InvalidField {
                index,
                field: "notes",
                message: format!("expected a string, got {}", kind(other)),
            });
        }
    };

    Ok(PredictionResult {
        predicted_species,
        predicted_phenophase,
        predicted_region,
        predicted_date,
        confidence,
        notes,
    })
}

fn lookup<'a>(fields: &'a Map<String, Value>, name: &str, aliases: &[&str]) -> Option<&'a Value> {
    std::iter::once(name)
        .chain(aliases.iter().copied())
        .find_map(|key| fields.get(key).filter(|v| !v.is_null()))
}

fn required_str(
    index: usize,
    fields: &Map<String, Value>,
    field: &'static str,
    aliases: &[&str],
) -> Result<String, ParseError> {
    match lookup(fields, field, aliases) {
        None => Err(ParseError::MissingField { index, field }),
        Some(Value::String(s)) if s.trim().is_empty() => {
            Err(ParseError::MissingField { index, field })
        }
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(other) => Err(ParseError::InvalidField {
            index,
            field,
            message: format!("expected a string, got {}", kind(other)),
        }),
    }
}

fn confidence(index: usize, value: Option<&Value>) -> Result<Option<f64>, ParseError> {
    let invalid = |message: String| ParseError::InvalidField {
        index,
        field: "confidence",
        message,
    };
    let score = match value {
        None => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        // Models sometimes quote numbers.
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(other) => return Err(invalid(format!("expected a number, got {}", kind(other)))),
    };
    match score {
        Some(score) if (0.0..=1.0).contains(&score) => Ok(Some(score)),
        Some(score) => Err(invalid(format!("{score} is outside [0, 1]"))),
        None => Err(invalid("not a number".into())),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
