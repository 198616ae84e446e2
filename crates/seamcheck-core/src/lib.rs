//! # seamcheck-core
//!
//! Consistency reasoning over clothing-taxonomy predictions.
//!
//! An image classifier predicts a category for each item and an attribute
//! model predicts its body part, weather type and edge shape. This crate
//! answers, per item:
//! - Do the predicted attributes agree with the predicted category?
//! - If not, which required facts are missing?
//! - What share of the batch survived?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same batch always produces the same report
//! 2. **Closed world**: An unasserted fact is false, never unknown
//! 3. **Order independent**: Each verdict depends only on that item's facts
//! 4. **Terminal**: Evicted items are never re-admitted within a pass
//!
//! ## Example
//!
//! ```rust,ignore
//! use seamcheck_core::{run_pass, PredictionBatch, Schema};
//!
//! let schema = Schema::standard()?;
//! let batch = PredictionBatch::from_json_file("predictions.json")?;
//! let pass = run_pass(schema, &batch)?;
//!
//! println!("{}", pass.report);
//! for id in pass.report.evicted_ids() {
//!     println!("drop {}", id);
//! }
//! ```

pub mod checker;
pub mod evaluator;
pub mod formula;
pub mod prediction;
pub mod report;
pub mod schema;
pub mod store;
pub mod types;

// Re-export main types at crate root
pub use checker::{assess, CheckOutcome, ConsistencyChecker};
pub use evaluator::{evaluate, unmet_conjuncts};
pub use formula::Formula;
pub use prediction::{
    combine, combine_json, AttributeIndices, Entries, PredictionBatch, PredictionError,
    PredictionRecord,
};
pub use report::{
    Report, ReportEntry, ReportError, ReportFormat, ReportGenerator, ReportItem, Summary,
};
pub use schema::{
    AttributeValue, Axis, Category, PropertyIndex, Schema, SchemaBuilder, SchemaError,
};
pub use store::{AssertionStore, IngestError, Item, ItemHandle};
pub use types::{EvictionReason, Facts, ItemId, ItemVerdict, Verdict};

use thiserror::Error;

/// Errors that can occur during a consistency pass
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Ingestion error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("Prediction error: {0}")]
    Prediction(#[from] PredictionError),
}

/// Everything one pass produced.
#[derive(Debug)]
pub struct PassResult {
    /// Store after eviction; only consistent items remain
    pub store: AssertionStore,
    pub outcome: CheckOutcome,
    pub report: Report,
    /// Records refused at ingestion, which never enter the ledger
    pub rejected: Vec<IngestError>,
}

/// Ingest a batch, check it, and build the report.
///
/// This is the main entry point for single-threaded use.
///
/// # Arguments
///
/// * `schema` - The taxonomy to check against
/// * `batch` - Predictions, checked in batch order
///
/// # Returns
///
/// A `PassResult`, or `EngineError::Report` when no record was ingested.
pub fn run_pass(schema: &Schema, batch: &PredictionBatch) -> Result<PassResult, EngineError> {
    let mut store = AssertionStore::new();
    let mut rejected = Vec::new();

    for record in batch.iter() {
        if let Err(e) = store.ingest_record(schema, record) {
            tracing::warn!(item_id = %record.item_id, error = %e, "Prediction rejected");
            rejected.push(e);
        }
    }

    let outcome = ConsistencyChecker::new(schema).check(&mut store);
    let report = ReportGenerator::new(schema).from_pass(&outcome, &store)?;

    Ok(PassResult {
        store,
        outcome,
        report,
        rejected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch_json() -> &'static str {
        r#"[
            { "item_id": "img_1", "category": "TshirtTop",
              "attributes": { "BodyPart": "TopPart", "WeatherType": "Warm", "EdgeShape": "CurveEdge" } },
            { "item_id": "img_2", "category": "TshirtTop",
              "attributes": { "BodyPart": "TopPart", "WeatherType": "Cold", "EdgeShape": "CurveEdge" } },
            { "item_id": "img_3", "category": "Hat",
              "attributes": { "BodyPart": "TopPart" } }
        ]"#
    }

    #[test]
    fn test_basic_pass() {
        let schema = Schema::standard().unwrap();
        let batch = PredictionBatch::from_json(batch_json()).unwrap();
        let pass = run_pass(schema, &batch).unwrap();

        assert_eq!(pass.report.summary().total_items, 3);
        assert_eq!(pass.report.summary().inconsistent_items, 2);
        assert_eq!(pass.store.all_item_ids(), vec![ItemId::from("img_1")]);
        assert!(pass.rejected.is_empty());
    }

    #[test]
    fn test_unknown_category_is_reported() {
        let schema = Schema::standard().unwrap();
        let batch = PredictionBatch::from_json(batch_json()).unwrap();
        let pass = run_pass(schema, &batch).unwrap();

        let text = &pass.report.entries()[2].text;
        assert!(text.contains("category 'Hat' is unknown"));
    }

    #[test]
    fn test_duplicate_axis_is_rejected_not_checked() {
        let schema = Schema::standard().unwrap();
        let batch = PredictionBatch::from_json(
            r#"[
                { "item_id": "ok", "category": "Bag",
                  "attributes": { "BodyPart": "Hands", "WeatherType": "Any", "EdgeShape": "StraightEdge" } },
                { "item_id": "dup", "category": "Bag",
                  "attributes": { "BodyPart": "Hands", "BodyPlacement": "Feet" } }
            ]"#,
        )
        .unwrap();
        let pass = run_pass(schema, &batch).unwrap();

        assert_eq!(pass.rejected.len(), 1);
        assert!(matches!(
            pass.rejected[0],
            IngestError::DuplicateAxisValue { axis: Axis::BodyPart, .. }
        ));
        assert_eq!(pass.report.summary().total_items, 1);
    }

    #[test]
    fn test_empty_batch_is_an_error() {
        let schema = Schema::standard().unwrap();
        let result = run_pass(schema, &PredictionBatch::new(Vec::new()));
        assert!(matches!(result, Err(EngineError::Report(ReportError::EmptyBatch))));
    }
}
