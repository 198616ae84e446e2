//! JSON Schema validation for prediction batches.
//!
//! Documents are validated against `schemas/prediction.schema.json` before
//! they are deserialized, so shape errors come back as readable messages
//! with instance paths instead of a single serde error.

use std::sync::OnceLock;

use super::record::PredictionError;

/// Embedded prediction schema (loaded at compile time).
const PREDICTION_SCHEMA_JSON: &str = include_str!("../../schemas/prediction.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn compile() -> Result<jsonschema::Validator, String> {
    let schema: serde_json::Value = serde_json::from_str(PREDICTION_SCHEMA_JSON)
        .map_err(|e| format!("Invalid schema JSON: {}", e))?;
    jsonschema::options()
        .build(&schema)
        .map_err(|e| format!("Failed to compile schema: {}", e))
}

fn get_validator() -> Result<&'static jsonschema::Validator, PredictionError> {
    COMPILED_SCHEMA
        .get_or_init(compile)
        .as_ref()
        .map_err(|e| PredictionError::SchemaLoad(e.clone()))
}

/// Validate a prediction document. Collects every violation.
pub fn validate_prediction_schema(document: &serde_json::Value) -> Result<(), PredictionError> {
    let validator = get_validator()?;

    let errors: Vec<String> = validator
        .iter_errors(document)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(PredictionError::Invalid(errors))
    }
}
