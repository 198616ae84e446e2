//! Merging raw classifier outputs into a prediction batch.
//!
//! The category classifier emits `{key: class_index}` and the attribute
//! model emits `{key: {body_part, weather_type, edge_shape}}` indices.
//! Indices are decoded through the classifier order of [`Category`] and the
//! schema's value order per axis.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::record::{Entries, PredictionBatch, PredictionError, PredictionRecord};
use crate::schema::{Axis, Category, Schema};

/// Label emitted for an index outside the vocabulary.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Prefix of item ids built from classifier keys.
pub const ITEM_ID_PREFIX: &str = "Image_";

/// Raw attribute model output for one key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeIndices {
    #[serde(default)]
    pub body_part: Option<usize>,

    #[serde(default)]
    pub weather_type: Option<usize>,

    #[serde(default)]
    pub edge_shape: Option<usize>,
}

impl AttributeIndices {
    pub fn get(&self, axis: Axis) -> Option<usize> {
        match axis {
            Axis::BodyPart => self.body_part,
            Axis::WeatherType => self.weather_type,
            Axis::EdgeShape => self.edge_shape,
        }
    }
}

/// Combine both model outputs, in category-classifier order.
///
/// Keys missing from the attribute output yield records with no
/// attributes; an axis missing for a key is left absent.
pub fn combine(
    schema: &Schema,
    categories: &Entries<usize>,
    attributes: &Entries<AttributeIndices>,
) -> PredictionBatch {
    let by_key: HashMap<&str, &AttributeIndices> = attributes
        .iter()
        .map(|(key, indices)| (key.as_str(), indices))
        .collect();

    categories
        .iter()
        .map(|(key, class_index)| {
            let category = Category::from_model_index(*class_index)
                .map(|c| c.name())
                .unwrap_or(UNKNOWN_LABEL);
            let mut record = PredictionRecord::new(format!("{}{}", ITEM_ID_PREFIX, key), category);

            if let Some(indices) = by_key.get(key.as_str()) {
                for axis in schema.all_axes() {
                    if let Some(index) = indices.get(axis) {
                        let label = schema
                            .axis_values(axis)
                            .get(index)
                            .map(|v| v.name())
                            .unwrap_or(UNKNOWN_LABEL);
                        record = record.with_attribute(axis.name(), label);
                    }
                }
            }

            record
        })
        .collect()
}

/// [`combine`] over the two raw JSON documents.
pub fn combine_json(
    schema: &Schema,
    categories_json: &str,
    attributes_json: &str,
) -> Result<PredictionBatch, PredictionError> {
    let categories: Entries<usize> = serde_json::from_str(categories_json)?;
    let attributes: Entries<AttributeIndices> = serde_json::from_str(attributes_json)?;

    let batch = combine(schema, &categories, &attributes);
    tracing::info!(records = batch.len(), "Combined classifier outputs");
    Ok(batch)
}
