//! The assertion store: per-item facts derived from predictions.
//!
//! The store exclusively owns every item. It also keeps the ingestion
//! ledger, the order in which ids were first ingested, which survives
//! eviction so a report can still list every item that entered the pass.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::prediction::PredictionRecord;
use crate::schema::{AttributeValue, Axis, Category, Schema};
use crate::types::{Facts, ItemId};

/// Problems with a prediction at ingestion time.
///
/// `DuplicateAxisValue` rejects the record outright. The two unknown-name
/// variants never fail ingestion; they are attached to the item as flags and
/// the item is evicted when checked.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IngestError {
    #[error("Item '{item_id}' asserts more than one value for axis {axis}")]
    DuplicateAxisValue { item_id: ItemId, axis: Axis },

    #[error("Item '{item_id}' has unknown category '{name}'")]
    UnknownCategory { item_id: ItemId, name: String },

    #[error("Item '{item_id}' has unknown attribute {axis}={value}")]
    UnknownAxisOrValue {
        item_id: ItemId,
        axis: String,
        value: String,
    },
}

/// One classified item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    id: ItemId,
    category: Option<Category>,
    facts: Facts,
    flags: Vec<IngestError>,
}

impl Item {
    pub fn new(id: ItemId, category: Option<Category>, facts: Facts) -> Self {
        Self {
            id,
            category,
            facts,
            flags: Vec::new(),
        }
    }

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn category(&self) -> Option<Category> {
        self.category
    }

    pub fn facts(&self) -> &Facts {
        &self.facts
    }

    /// Unknown-name problems recorded at ingestion.
    pub fn flags(&self) -> &[IngestError] {
        &self.flags
    }
}

/// Position of an item in the ingestion ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemHandle(usize);

impl ItemHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Owns every item of one pass.
#[derive(Debug, Clone, Default)]
pub struct AssertionStore {
    ledger: Vec<ItemId>,
    positions: HashMap<ItemId, usize>,
    items: HashMap<ItemId, Item>,
}

impl AssertionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or overwrite an item from resolved facts.
    ///
    /// Overwriting replaces the category and every fact; the item keeps its
    /// original ledger position.
    pub fn ingest(
        &mut self,
        item_id: impl Into<ItemId>,
        category: Option<Category>,
        attribute_facts: &[(Axis, AttributeValue)],
    ) -> Result<ItemHandle, IngestError> {
        let item_id = item_id.into();
        let facts = Facts::from_pairs(attribute_facts).map_err(|axis| {
            IngestError::DuplicateAxisValue {
                item_id: item_id.clone(),
                axis,
            }
        })?;
        Ok(self.insert(Item::new(item_id, category, facts)))
    }

    /// Create or overwrite an item from a raw prediction record, resolving
    /// names against `schema`.
    ///
    /// Unknown names are flagged on the item rather than rejected. A record
    /// naming the same axis twice, even through an alias, is rejected and
    /// nothing is ingested.
    pub fn ingest_record(
        &mut self,
        schema: &Schema,
        record: &PredictionRecord,
    ) -> Result<ItemHandle, IngestError> {
        let item_id = ItemId::new(record.item_id.as_str());
        let mut flags = Vec::new();

        let category = match record.category.as_str() {
            "" => None,
            name => match name.parse::<Category>() {
                Ok(category) => Some(category),
                Err(_) => {
                    flags.push(IngestError::UnknownCategory {
                        item_id: item_id.clone(),
                        name: name.to_string(),
                    });
                    None
                }
            },
        };

        let mut seen = HashSet::new();
        let mut facts = Facts::new();
        for (axis_name, value_name) in record.attributes.iter() {
            let Ok(axis) = axis_name.parse::<Axis>() else {
                flags.push(IngestError::UnknownAxisOrValue {
                    item_id: item_id.clone(),
                    axis: axis_name.clone(),
                    value: value_name.clone(),
                });
                continue;
            };

            if !seen.insert(axis) {
                return Err(IngestError::DuplicateAxisValue { item_id, axis });
            }

            match value_name.parse::<AttributeValue>() {
                Ok(value) if schema.declares(axis, value) => {
                    // `seen` guarantees the axis is still unset.
                    let _ = facts.assert(axis, value);
                }
                _ => flags.push(IngestError::UnknownAxisOrValue {
                    item_id: item_id.clone(),
                    axis: axis.name().to_string(),
                    value: value_name.clone(),
                }),
            }
        }

        for flag in &flags {
            tracing::warn!(item_id = %item_id, flag = %flag, "Prediction outside schema vocabulary");
        }

        let mut item = Item::new(item_id, category, facts);
        item.flags = flags;
        Ok(self.insert(item))
    }

    /// Insert a fully built item, replacing any item with the same id.
    pub fn insert(&mut self, item: Item) -> ItemHandle {
        let position = match self.positions.get(&item.id) {
            Some(&position) => position,
            None => {
                let position = self.ledger.len();
                self.ledger.push(item.id.clone());
                self.positions.insert(item.id.clone(), position);
                position
            }
        };
        self.items.insert(item.id.clone(), item);
        ItemHandle(position)
    }

    /// Remove an item and all its facts. Unknown or already evicted ids are
    /// a no-op. The id stays in the ledger.
    pub fn evict(&mut self, item_id: &ItemId) -> Option<Item> {
        let removed = self.items.remove(item_id);
        if removed.is_some() {
            tracing::debug!(item_id = %item_id, "Item evicted");
        }
        removed
    }

    /// Facts of an item; empty if the item is unknown.
    pub fn facts_of(&self, item_id: &ItemId) -> Facts {
        self.items
            .get(item_id)
            .map(|item| item.facts.clone())
            .unwrap_or_default()
    }

    pub fn item(&self, item_id: &ItemId) -> Option<&Item> {
        self.items.get(item_id)
    }

    pub fn contains(&self, item_id: &ItemId) -> bool {
        self.items.contains_key(item_id)
    }

    /// Ids of live items, in ingestion order.
    pub fn all_item_ids(&self) -> Vec<ItemId> {
        self.ledger
            .iter()
            .filter(|id| self.items.contains_key(*id))
            .cloned()
            .collect()
    }

    /// Every id ever ingested, evicted or not, in ingestion order.
    pub fn ledger(&self) -> &[ItemId] {
        &self.ledger
    }

    /// Number of live items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Split into the ledger and the live items, in ledger order.
    pub fn into_parts(mut self) -> (Vec<ItemId>, Vec<Item>) {
        let items = self
            .ledger
            .iter()
            .filter_map(|id| self.items.remove(id))
            .collect();
        (self.ledger, items)
    }

    /// Reassemble a store from a ledger and live items. Items whose id is
    /// missing from the ledger are appended to it.
    pub fn from_parts(ledger: Vec<ItemId>, items: impl IntoIterator<Item = Item>) -> Self {
        let mut store = Self::new();
        for id in ledger {
            if !store.positions.contains_key(&id) {
                store.positions.insert(id.clone(), store.ledger.len());
                store.ledger.push(id);
            }
        }
        for item in items {
            store.insert(item);
        }
        store
    }
}
