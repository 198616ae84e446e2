//! The prediction boundary.
//!
//! Predictions come from external classifiers as string labels. This module
//! parses and validates them; name resolution against the schema happens at
//! ingestion in the store.

mod combine;
mod record;
mod validation;

pub use combine::{combine, combine_json, AttributeIndices, ITEM_ID_PREFIX, UNKNOWN_LABEL};
pub use record::{Entries, PredictionBatch, PredictionError, PredictionRecord};
pub use validation::validate_prediction_schema;
