//! Shared types for items, facts and verdicts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::formula::Formula;
use crate::schema::{AttributeValue, Axis, Category};

/// Stable identifier of one classified item (an image).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for ItemId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Asserted attribute facts of one item: at most one value per axis.
///
/// An axis with no entry was not predicted. Under closed-world reading the
/// item then has none of that axis's values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Facts(BTreeMap<Axis, AttributeValue>);

impl Facts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from pairs, rejecting a second value for any axis.
    ///
    /// On failure returns the first axis asserted twice.
    pub fn from_pairs(pairs: &[(Axis, AttributeValue)]) -> Result<Self, Axis> {
        let mut facts = Self::new();
        for &(axis, value) in pairs {
            facts.assert(axis, value).map_err(|_| axis)?;
        }
        Ok(facts)
    }

    /// Assert `value` on `axis`. Facts are write-once per axis; a second
    /// assertion fails with the value already held.
    pub fn assert(&mut self, axis: Axis, value: AttributeValue) -> Result<(), AttributeValue> {
        match self.0.get(&axis) {
            Some(existing) => Err(*existing),
            None => {
                self.0.insert(axis, value);
                Ok(())
            }
        }
    }

    pub fn get(&self, axis: Axis) -> Option<AttributeValue> {
        self.0.get(&axis).copied()
    }

    /// Whether the item has exactly `value` on `axis`.
    pub fn has(&self, axis: Axis, value: AttributeValue) -> bool {
        self.get(axis) == Some(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Axis, AttributeValue)> + '_ {
        self.0.iter().map(|(a, v)| (*a, *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Why an item was evicted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvictionReason {
    /// The category's defining formula evaluated to false.
    FormulaViolated {
        category: Category,
        /// Top-level conjuncts that were false (diagnostic only)
        unmet: Vec<Formula>,
    },

    /// The predicted category is outside the schema.
    UnknownCategory { name: String },

    /// An attribute name or value is outside the schema.
    UnknownAttribute { axis: String, value: String },

    /// The item carries no category.
    Unclassified,

    /// The item was no longer in the store when checked.
    Absent,
}

impl fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionReason::FormulaViolated { category, unmet } => {
                write!(f, "violates the definition of {}", category)?;
                if !unmet.is_empty() {
                    let unmet: Vec<String> = unmet.iter().map(|c| c.to_string()).collect();
                    write!(f, " (unmet: {})", unmet.join(", "))?;
                }
                Ok(())
            }
            EvictionReason::UnknownCategory { name } => write!(f, "unknown category '{}'", name),
            EvictionReason::UnknownAttribute { axis, value } => {
                write!(f, "unknown attribute {}={}", axis, value)
            }
            EvictionReason::Unclassified => f.write_str("no category asserted"),
            EvictionReason::Absent => f.write_str("not present in the store"),
        }
    }
}

/// Terminal outcome of checking one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Consistent,
    Evicted { reason: EvictionReason },
}

impl Verdict {
    pub fn evicted(reason: EvictionReason) -> Self {
        Verdict::Evicted { reason }
    }

    pub fn is_consistent(&self) -> bool {
        matches!(self, Verdict::Consistent)
    }

    pub fn is_evicted(&self) -> bool {
        matches!(self, Verdict::Evicted { .. })
    }

    pub fn reason(&self) -> Option<&EvictionReason> {
        match self {
            Verdict::Consistent => None,
            Verdict::Evicted { reason } => Some(reason),
        }
    }
}

/// The verdict for one item in a pass, with the category it was checked
/// against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemVerdict {
    pub item_id: ItemId,

    pub category: Option<Category>,

    #[serde(flatten)]
    pub verdict: Verdict,
}
