//! Schema and range checks for extracted analysis objects.

use reflectify_core::{AnalysisRecord, OverallRating, ScoreCategory};
use serde_json::{Map, Value};

use crate::error::{SchemaError, SchemaViolation};

/// Scores this far outside `[0, 1]` are clamped instead of rejected.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Validates candidate analysis objects into [`AnalysisRecord`]s.
///
/// Fields are checked in a fixed order (the five scores, then `overall`,
/// then `summary`) and the first offending field is reported. Extra fields
/// are ignored.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisValidator {
    tolerance: f64,
}

impl Default for AnalysisValidator {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl AnalysisValidator {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance: tolerance.abs(),
        }
    }

    pub fn validate(&self, candidate: &Map<String, Value>) -> Result<AnalysisRecord, SchemaError> {
        let mut scores = [0.0f64; 5];
        for (slot, category) in scores.iter_mut().zip(ScoreCategory::ALL) {
            *slot = self.score(candidate, category.field_name())?;
        }
        let [toxicity, insult, profanity, identity_attack, threat] = scores;

        let overall_label = string_field(candidate, "overall")?;
        let overall = OverallRating::from_label(overall_label).ok_or_else(|| {
            SchemaError::new(
                "overall",
                SchemaViolation::UnknownCategory(overall_label.to_string()),
            )
        })?;

        let summary = string_field(candidate, "summary")?.to_string();
        if summary.trim().is_empty() {
            tracing::debug!("Analysis summary is empty");
        }

        Ok(AnalysisRecord {
            toxicity,
            insult,
            profanity,
            identity_attack,
            threat,
            overall,
            summary,
        })
    }

    fn score(&self, candidate: &Map<String, Value>, field: &'static str) -> Result<f64, SchemaError> {
        let value = candidate
            .get(field)
            .ok_or_else(|| SchemaError::new(field, SchemaViolation::Missing))?;
        let number = value
            .as_f64()
            .ok_or_else(|| SchemaError::new(field, SchemaViolation::NotANumber))?;

        if (0.0..=1.0).contains(&number) {
            Ok(number)
        } else if number >= -self.tolerance && number <= 1.0 + self.tolerance {
            tracing::debug!(field, value = number, "Clamping score within tolerance");
            Ok(number.clamp(0.0, 1.0))
        } else {
            Err(SchemaError::new(field, SchemaViolation::OutOfRange(number)))
        }
    }
}

fn string_field<'a>(
    candidate: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, SchemaError> {
    candidate
        .get(field)
        .ok_or_else(|| SchemaError::new(field, SchemaViolation::Missing))?
        .as_str()
        .ok_or_else(|| SchemaError::new(field, SchemaViolation::NotAString))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {}", other),
        }
    }

    fn valid() -> Value {
        json!({
            "toxicity": 0.92,
            "insult": 0.88,
            "profanity": 0.1,
            "identity_attack": 0.05,
            "threat": 0.02,
            "overall": "toxic",
            "summary": "Direct insult aimed at the reader."
        })
    }

    fn with(field: &str, value: Value) -> Map<String, Value> {
        let mut map = object(valid());
        map.insert(field.to_string(), value);
        map
    }

    fn without(field: &str) -> Map<String, Value> {
        let mut map = object(valid());
        map.remove(field);
        map
    }

    #[test]
    fn test_valid_record() {
        let record = AnalysisValidator::default().validate(&object(valid())).unwrap();
        assert_eq!(record.toxicity, 0.92);
        assert_eq!(record.identity_attack, 0.05);
        assert_eq!(record.overall, OverallRating::Toxic);
        assert_eq!(record.summary, "Direct insult aimed at the reader.");
    }

    #[test]
    fn test_record_round_trips_unchanged() {
        let validator = AnalysisValidator::default();
        let record = validator.validate(&object(valid())).unwrap();
        let again = validator
            .validate(&object(serde_json::to_value(&record).unwrap()))
            .unwrap();
        assert_eq!(record, again);
    }

    #[test]
    fn test_boundary_scores_accepted() {
        let mut map = with("toxicity", json!(0));
        map.insert("threat".into(), json!(1));
        let record = AnalysisValidator::default().validate(&map).unwrap();
        assert_eq!(record.toxicity, 0.0);
        assert_eq!(record.threat, 1.0);
    }

    #[test]
    fn test_out_of_range_names_field() {
        let err = AnalysisValidator::default()
            .validate(&with("toxicity", json!(1.4)))
            .unwrap_err();
        assert_eq!(err.field, "toxicity");
        assert_eq!(err.violation, SchemaViolation::OutOfRange(1.4));
    }

    #[test]
    fn test_negative_score_rejected() {
        let err = AnalysisValidator::default()
            .validate(&with("insult", json!(-0.2)))
            .unwrap_err();
        assert_eq!(err.field, "insult");
    }

    #[test]
    fn test_tiny_overshoot_clamped() {
        let mut map = with("profanity", json!(1.0000001));
        map.insert("threat".into(), json!(-0.0000005));
        let record = AnalysisValidator::default().validate(&map).unwrap();
        assert_eq!(record.profanity, 1.0);
        assert_eq!(record.threat, 0.0);
    }

    #[test]
    fn test_missing_field_reported_in_order() {
        let mut map = without("insult");
        map.remove("summary");
        let err = AnalysisValidator::default().validate(&map).unwrap_err();
        assert_eq!(err.field, "insult");
        assert_eq!(err.violation, SchemaViolation::Missing);
    }

    #[test]
    fn test_score_not_a_number() {
        let err = AnalysisValidator::default()
            .validate(&with("threat", json!("0.3")))
            .unwrap_err();
        assert_eq!(err.field, "threat");
        assert_eq!(err.violation, SchemaViolation::NotANumber);
    }

    #[test]
    fn test_overall_must_be_exact_label() {
        let validator = AnalysisValidator::default();

        let err = validator.validate(&with("overall", json!("Toxic"))).unwrap_err();
        assert_eq!(err.field, "overall");
        assert_eq!(
            err.violation,
            SchemaViolation::UnknownCategory("Toxic".to_string())
        );

        let err = validator.validate(&with("overall", json!(2))).unwrap_err();
        assert_eq!(err.violation, SchemaViolation::NotAString);

        let err = validator.validate(&without("overall")).unwrap_err();
        assert_eq!(err.violation, SchemaViolation::Missing);
    }

    #[test]
    fn test_summary_rules() {
        let validator = AnalysisValidator::default();

        let err = validator.validate(&without("summary")).unwrap_err();
        assert_eq!(err.field, "summary");
        assert_eq!(err.violation, SchemaViolation::Missing);

        let err = validator.validate(&with("summary", json!(null))).unwrap_err();
        assert_eq!(err.violation, SchemaViolation::NotAString);

        let record = validator.validate(&with("summary", json!(""))).unwrap();
        assert!(!record.has_summary());
        assert_eq!(record.summary_or_placeholder(), "No summary provided.");
    }

    #[test]
    fn test_extra_fields_ignored() {
        let record = AnalysisValidator::default()
            .validate(&with("confidence", json!("high")))
            .unwrap();
        assert_eq!(record.overall, OverallRating::Toxic);
    }
}
