//! Prediction request builder.

use chronobloom_types::{Observation, PredictedDate, PredictionRequest, TargetSpec};

use crate::error::BuildError;

/// Output schema version embedded in every prompt.
pub const SCHEMA_VERSION: &str = "chronobloom.prediction/v1";

/// Default cap on observations embedded in one prompt.
pub const DEFAULT_MAX_OBSERVATIONS: usize = 200;

/// Targets used when the caller supplies none.
pub fn default_targets() -> Vec<TargetSpec> {
    vec![
        TargetSpec::new("Lilac", "First flower", "New York"),
        TargetSpec::new("Red maple", "First leaf", "California"),
        TargetSpec::new("American robin", "First arrival", "Texas"),
    ]
}

/// Renders a [`PredictionRequest`] from observations and targets.
///
/// The prompt is a pure function of the inputs: no clock, no randomness,
/// observations serialized in a fixed field order.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    schema_version: String,
    max_observations: usize,
    default_targets: Vec<TargetSpec>,
}

impl PromptBuilder {
    /// Builder with the default schema version, bound and targets.
    pub fn new() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.into(),
            max_observations: DEFAULT_MAX_OBSERVATIONS,
            default_targets: default_targets(),
        }
    }

    /// Override the schema version string.
    #[must_use]
    pub fn schema_version(mut self, version: impl Into<String>) -> Self {
        self.schema_version = version.into();
        self
    }

    /// Cap the number of observations embedded (at least one is kept).
    #[must_use]
    pub fn max_observations(mut self, max: usize) -> Self {
        self.max_observations = max.max(1);
        self
    }

    /// Replace the targets used when [`build`](Self::build) gets none.
    #[must_use]
    pub fn default_targets(mut self, targets: Vec<TargetSpec>) -> Self {
        self.default_targets = targets;
        self
    }

    /// Build the request.
    ///
    /// Keeps the first `max_observations` observations in input order. An
    /// empty `targets` slice means the builder's default targets.
    pub fn build(
        &self,
        observations: &[Observation],
        targets: &[TargetSpec],
    ) -> Result<PredictionRequest, BuildError> {
        if observations.is_empty() {
            return Err(BuildError::EmptyInput);
        }
        let targets = if targets.is_empty() {
            self.default_targets.clone()
        } else {
            targets.to_vec()
        };
        if targets.is_empty() {
            return Err(BuildError::NoTargets);
        }

        let kept: Vec<Observation> = observations
            .iter()
            .take(self.max_observations)
            .cloned()
            .collect();
        if kept.len() < observations.len() {
            tracing::debug!(
                supplied = observations.len(),
                kept = kept.len(),
                "truncated observations for prompt"
            );
        }

        let prompt = self.render(&kept, &targets)?;
        Ok(PredictionRequest {
            observations: kept,
            schema_version: self.schema_version.clone(),
            targets,
            prompt,
        })
    }

    fn render(
        &self,
        observations: &[Observation],
        targets: &[TargetSpec],
    ) -> Result<String, BuildError> {
        let data = serde_json::to_string_pretty(observations)
            .map_err(|e| BuildError::Serialization(e.to_string()))?;
        let template = serde_json::to_string_pretty(&schema_template(targets))
            .map_err(|e| BuildError::Serialization(e.to_string()))?;

        let mut prompt = format!(
            "You are an AI assistant specializing in phenological predictions, \
             providing actionable insights for farmers.\n\
             Below is a JSON array of {count} recent phenological observations. \
             Each observation includes:\n\
             - `id`: unique observation identifier.\n\
             - `observation_date`: the recorded date of the observation (YYYY-MM-DD).\n\
             - `species_name`: the plant or animal species.\n\
             - `phenophase_name`: the phenophase observed.\n\
             - `status`: 1 when the phenophase was observed.\n\
             - `intensity`: Low, Medium, High or empty.\n\
             - `region_code`: the two-letter US state of the observation.\n\
             - `site_name`: the observation site.\n\
             - `latitude`, `longitude`: coordinates of the observation.\n\n\
             Recent phenological observations:\n```json\n{data}\n```\n\n\
             Based on this data, predict the following dates for the upcoming season:\n\n",
            count = observations.len(),
        );
        for (i, target) in targets.iter().enumerate() {
            prompt.push_str(&format!(
                "{}. For {} in {}: what is the most probable \"{}\" date?\n",
                i + 1,
                target.species_name,
                target.region_name,
                target.phenophase_name
            ));
        }
        prompt.push_str(&format!(
            "\nAnswer with a JSON array of objects following output schema {version}, \
             one object per target in the order above:\n```json\n{template}\n```\n\
             `predicted_date` must be an ISO date (YYYY-MM-DD). `confidence` is optional \
             and must lie between 0.0 and 1.0. If you cannot make a reasonable prediction \
             for a target, set `predicted_date` to \"{cannot}\" and give the reason in `notes`.\n",
            version = self.schema_version,
            cannot = PredictedDate::CANNOT_PREDICT,
        ));
        Ok(prompt)
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn schema_template(targets: &[TargetSpec]) -> serde_json::Value {
    targets
        .iter()
        .map(|t| {
            serde_json::json!({
                "predicted_species": t.species_name,
                "predicted_phenophase": t.phenophase_name,
                "predicted_region": t.region_name,
                "predicted_date": "YYYY-MM-DD",
                "confidence": 0.0,
                "notes": "reasoning or assumptions behind this prediction",
            })
        })
        .collect()
}

/// Build with a default [`PromptBuilder`].
pub fn build(
    observations: &[Observation],
    targets: &[TargetSpec],
) -> Result<PredictionRequest, BuildError> {
    PromptBuilder::new().build(observations, targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronobloom_types::test_utils::sample_observation;

    fn observations(n: usize) -> Vec<Observation> {
        (0..n).map(|i| sample_observation(&format!("obs-{i}"))).collect()
    }

    #[test]
    fn empty_observations_is_an_error() {
        let err = build(&[], &default_targets()).unwrap_err();
        assert!(matches!(err, BuildError::EmptyInput));
    }

    #[test]
    fn building_twice_is_byte_identical() {
        let obs = observations(3);
        let targets = vec![TargetSpec::new("Lilac", "First flower", "New York")];
        let a = build(&obs, &targets).unwrap();
        let b = build(&obs, &targets).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.prompt.as_bytes(), b.prompt.as_bytes());
    }

    #[test]
    fn embeds_observations_targets_and_instructions() {
        let request = build(
            &observations(2),
            &[TargetSpec::new("Red maple", "First leaf", "California")],
        )
        .unwrap();
        assert_eq!(request.schema_version, SCHEMA_VERSION);
        assert!(request.prompt.contains("\"id\": \"obs-0\""));
        assert!(request.prompt.contains("\"id\": \"obs-1\""));
        assert!(request.prompt.contains(
            "1. For Red maple in California: what is the most probable \"First leaf\" date?"
        ));
        assert!(request.prompt.contains(SCHEMA_VERSION));
        assert!(request.prompt.contains("\"Cannot predict\""));
        assert!(request.prompt.contains("`notes`"));
    }

    #[test]
    fn numbered_targets_are_one_per_line() {
        let request = build(
            &observations(1),
            &[
                TargetSpec::new("Lilac", "First flower", "New York"),
                TargetSpec::new("Red maple", "First leaf", "California"),
            ],
        )
        .unwrap();
        assert!(request.prompt.contains(
            "upcoming season:\n\n\
             1. For Lilac in New York: what is the most probable \"First flower\" date?\n\
             2. For Red maple in California: what is the most probable \"First leaf\" date?\n\
             \nAnswer with a JSON array"
        ));
        assert!(request.prompt.ends_with("`notes`.\n"));
    }

    #[test]
    fn empty_targets_use_defaults() {
        let request = build(&observations(1), &[]).unwrap();
        assert_eq!(request.targets, default_targets());
        assert!(request.prompt.contains("3. For American robin in Texas"));
    }

    #[test]
    fn no_targets_anywhere_is_an_error() {
        let err = PromptBuilder::new()
            .default_targets(vec![])
            .build(&observations(1), &[])
            .unwrap_err();
        assert!(matches!(err, BuildError::NoTargets));
    }

    #[test]
    fn bounds_observations_keeping_input_order() {
        let request = PromptBuilder::new()
            .max_observations(2)
            .build(&observations(5), &[])
            .unwrap();
        let ids: Vec<_> = request.observations.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, ["obs-0", "obs-1"]);
        assert!(!request.prompt.contains("obs-2"));
        assert!(request.prompt.contains("JSON array of 2 recent"));
    }
}
