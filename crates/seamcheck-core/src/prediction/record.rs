//! Prediction records and batches as they arrive from the classifiers.

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::Path;
use thiserror::Error;

use super::validation::validate_prediction_schema;

/// Errors from reading a prediction batch.
#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("Failed to read predictions: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Predictions failed schema validation: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("Failed to load prediction schema: {0}")]
    SchemaLoad(String),
}

/// A JSON object read as an ordered list of entries.
///
/// Keeps key order and duplicate keys, both of which a map would lose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entries<V>(pub Vec<(String, V)>);

impl<V> Entries<V> {
    pub fn iter(&self) -> std::slice::Iter<'_, (String, V)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<V> Default for Entries<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<V> FromIterator<(String, V)> for Entries<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<V: Serialize> Serialize for Entries<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for Entries<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
            type Value = Entries<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, V>()? {
                    entries.push((key, value));
                }
                Ok(Entries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}

/// One item's prediction: a category label and raw attribute labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub item_id: String,

    pub category: String,

    /// Axis name to value name, in input order
    #[serde(default)]
    pub attributes: Entries<String>,
}

impl PredictionRecord {
    pub fn new(item_id: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            category: category.into(),
            attributes: Entries::default(),
        }
    }

    /// Add an attribute label.
    pub fn with_attribute(mut self, axis: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.0.push((axis.into(), value.into()));
        self
    }
}

/// The combined-output shape keyed by image id.
#[derive(Debug, Deserialize)]
struct LegacyEntry {
    #[serde(rename = "Clothes")]
    clothes: String,

    #[serde(rename = "Properties", default)]
    properties: Entries<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BatchRepr {
    Records(Vec<PredictionRecord>),
    Legacy(Entries<LegacyEntry>),
}

/// An ordered batch of predictions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PredictionBatch {
    records: Vec<PredictionRecord>,
}

impl PredictionBatch {
    pub fn new(records: Vec<PredictionRecord>) -> Self {
        Self { records }
    }

    /// Parse a batch from JSON, either a record array or the object keyed by
    /// image id. The document is validated against the prediction schema
    /// first.
    pub fn from_json(json: &str) -> Result<Self, PredictionError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        validate_prediction_schema(&value)?;

        // Re-read from the text: `Value` would drop order and duplicates.
        let batch = match serde_json::from_str::<BatchRepr>(json)? {
            BatchRepr::Records(records) => Self { records },
            BatchRepr::Legacy(entries) => Self {
                records: entries
                    .0
                    .into_iter()
                    .map(|(item_id, entry)| PredictionRecord {
                        item_id,
                        category: entry.clothes,
                        attributes: entry.properties,
                    })
                    .collect(),
            },
        };

        tracing::debug!(records = batch.len(), "Parsed prediction batch");
        Ok(batch)
    }

    /// Parse a batch from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PredictionError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Serialize as a record array.
    pub fn to_json(&self) -> Result<String, PredictionError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn records(&self) -> &[PredictionRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PredictionRecord> {
        self.records.iter()
    }

    pub fn push(&mut self, record: PredictionRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<PredictionRecord> {
        self.records
    }
}

impl FromIterator<PredictionRecord> for PredictionBatch {
    fn from_iter<I: IntoIterator<Item = PredictionRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record_array() {
        let json = r#"[
            {"item_id": "img_1", "category": "TshirtTop",
             "attributes": {"BodyPart": "TopPart", "WeatherType": "Warm"}},
            {"item_id": "img_2", "category": "Bag"}
        ]"#;

        let batch = PredictionBatch::from_json(json).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.records()[0].attributes.len(), 2);
        assert!(batch.records()[1].attributes.is_empty());
    }

    #[test]
    fn test_parse_legacy_object_keeps_order() {
        let json = r#"{
            "Image_9": {"Clothes": "AnkleBoot", "Properties": {"BodyPart": "Feet"}},
            "Image_1": {"Clothes": "Trouser", "Properties": {}},
            "Image_5": {"Clothes": "Bag"}
        }"#;

        let batch = PredictionBatch::from_json(json).unwrap();
        let ids: Vec<&str> = batch.iter().map(|r| r.item_id.as_str()).collect();
        assert_eq!(ids, vec!["Image_9", "Image_1", "Image_5"]);
        assert_eq!(batch.records()[0].category, "AnkleBoot");
        assert_eq!(
            batch.records()[0].attributes,
            Entries(vec![("BodyPart".to_string(), "Feet".to_string())])
        );
    }

    #[test]
    fn test_duplicate_attribute_keys_survive_parsing() {
        let json = r#"[{"item_id": "a", "category": "Coat",
            "attributes": {"BodyPart": "TopPart", "BodyPart": "Feet"}}]"#;

        let batch = PredictionBatch::from_json(json).unwrap();
        assert_eq!(batch.records()[0].attributes.len(), 2);
    }

    #[test]
    fn test_schema_violation_reported() {
        let json = r#"[{"item_id": "a"}]"#;
        let result = PredictionBatch::from_json(json);
        assert!(matches!(result, Err(PredictionError::Invalid(_))));

        let json = r#"[{"item_id": "a", "category": "Coat", "attributes": {"BodyPart": 3}}]"#;
        assert!(matches!(
            PredictionBatch::from_json(json),
            Err(PredictionError::Invalid(_))
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            PredictionBatch::from_json("[{"),
            Err(PredictionError::JsonError(_))
        ));
    }

    #[test]
    fn test_serializes_as_record_array() {
        let batch: PredictionBatch = [PredictionRecord::new("a", "Coat")
            .with_attribute("WeatherType", "Cold")]
        .into_iter()
        .collect();

        let value: serde_json::Value = serde_json::from_str(&batch.to_json().unwrap()).unwrap();
        assert_eq!(value[0]["item_id"], "a");
        assert_eq!(value[0]["attributes"]["WeatherType"], "Cold");
        assert_eq!(PredictionBatch::from_json(&batch.to_json().unwrap()).unwrap(), batch);
    }
}
