//! Consistency checker: evaluates each item against its category and evicts
//! failures.
//!
//! Each item's verdict depends only on its own facts, so items can be
//! checked in any order, or in parallel, with the same result. Verdicts are
//! terminal: a checker never re-checks an item it has already settled.

use std::collections::HashMap;

use crate::evaluator::{evaluate, unmet_conjuncts};
use crate::schema::Schema;
use crate::store::{AssertionStore, IngestError, Item};
use crate::types::{EvictionReason, ItemId, ItemVerdict, Verdict};

/// Assess one item. Pure; never touches the store.
///
/// Unknown-name flags win over formula evaluation: an item carrying one is
/// evicted with that reason whatever its facts say.
pub fn assess(schema: &Schema, item: &Item) -> Verdict {
    if let Some(reason) = item.flags().iter().find_map(reason_for_flag) {
        return Verdict::evicted(reason);
    }

    let Some(category) = item.category() else {
        return Verdict::evicted(EvictionReason::Unclassified);
    };

    let Some(formula) = schema.formula_for(category) else {
        return Verdict::evicted(EvictionReason::UnknownCategory {
            name: category.name().to_string(),
        });
    };

    if evaluate(formula, item.facts()) {
        Verdict::Consistent
    } else {
        Verdict::evicted(EvictionReason::FormulaViolated {
            category,
            unmet: unmet_conjuncts(formula, item.facts())
                .into_iter()
                .cloned()
                .collect(),
        })
    }
}

fn reason_for_flag(flag: &IngestError) -> Option<EvictionReason> {
    match flag {
        IngestError::UnknownCategory { name, .. } => Some(EvictionReason::UnknownCategory {
            name: name.clone(),
        }),
        IngestError::UnknownAxisOrValue { axis, value, .. } => {
            Some(EvictionReason::UnknownAttribute {
                axis: axis.clone(),
                value: value.clone(),
            })
        }
        IngestError::DuplicateAxisValue { .. } => None,
    }
}

/// Verdict for an item that may be missing from the store.
pub fn assess_slot(schema: &Schema, item: Option<&Item>) -> Verdict {
    match item {
        Some(item) => assess(schema, item),
        None => Verdict::evicted(EvictionReason::Absent),
    }
}

/// Verdicts of one pass, in ingestion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckOutcome {
    verdicts: Vec<ItemVerdict>,
}

impl CheckOutcome {
    pub fn from_verdicts(verdicts: Vec<ItemVerdict>) -> Self {
        Self { verdicts }
    }

    pub fn verdicts(&self) -> &[ItemVerdict] {
        &self.verdicts
    }

    pub fn len(&self) -> usize {
        self.verdicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }

    pub fn consistent_count(&self) -> usize {
        self.verdicts.iter().filter(|v| v.verdict.is_consistent()).count()
    }

    pub fn evicted_count(&self) -> usize {
        self.verdicts.iter().filter(|v| v.verdict.is_evicted()).count()
    }

    /// Ids of evicted items, in ingestion order.
    pub fn evicted_ids(&self) -> Vec<ItemId> {
        self.verdicts
            .iter()
            .filter(|v| v.verdict.is_evicted())
            .map(|v| v.item_id.clone())
            .collect()
    }

    pub fn verdict_of(&self, item_id: &ItemId) -> Option<&Verdict> {
        self.verdicts
            .iter()
            .find(|v| &v.item_id == item_id)
            .map(|v| &v.verdict)
    }
}

/// Runs consistency passes over a store, remembering settled verdicts.
pub struct ConsistencyChecker<'s> {
    schema: &'s Schema,
    settled: HashMap<ItemId, ItemVerdict>,
}

impl<'s> ConsistencyChecker<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            settled: HashMap::new(),
        }
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    /// Check every ingested item in ledger order. Failures are evicted from
    /// `store`; consistent items are left untouched.
    ///
    /// Items settled by an earlier pass keep their verdict and are not
    /// re-evaluated, so a second pass evicts nothing new.
    pub fn check(&mut self, store: &mut AssertionStore) -> CheckOutcome {
        let ledger = store.ledger().to_vec();
        let mut verdicts = Vec::with_capacity(ledger.len());

        for item_id in ledger {
            let previous = self.settled.get(&item_id).cloned();
            let settled = match previous {
                Some(previous) => settle_again(previous, store.contains(&item_id)),
                None => {
                    let item = store.item(&item_id);
                    ItemVerdict {
                        item_id: item_id.clone(),
                        category: item.and_then(|i| i.category()),
                        verdict: assess_slot(self.schema, item),
                    }
                }
            };
            if self.settled.get(&item_id) != Some(&settled) {
                log_verdict(&settled);
                self.settled.insert(item_id.clone(), settled.clone());
            }

            if settled.verdict.is_evicted() {
                store.evict(&item_id);
            }
            verdicts.push(settled);
        }

        let outcome = CheckOutcome::from_verdicts(verdicts);
        tracing::info!(
            total = outcome.len(),
            consistent = outcome.consistent_count(),
            evicted = outcome.evicted_count(),
            "Consistency pass complete"
        );
        outcome
    }
}

/// Reuse a verdict from an earlier pass. A consistent item that has since
/// left the store is no longer consistent: it becomes `Absent`.
pub fn settle_again(previous: ItemVerdict, present: bool) -> ItemVerdict {
    if previous.verdict.is_consistent() && !present {
        ItemVerdict {
            verdict: Verdict::evicted(EvictionReason::Absent),
            ..previous
        }
    } else {
        previous
    }
}

/// Per-item verdict logging shared by the sequential and parallel checkers.
pub fn log_verdict(verdict: &ItemVerdict) {
    match &verdict.verdict {
        Verdict::Consistent => tracing::debug!(
            item_id = %verdict.item_id,
            category = ?verdict.category,
            "Item consistent"
        ),
        Verdict::Evicted { reason } if matches!(reason, EvictionReason::FormulaViolated { .. }) => {
            tracing::debug!(
                item_id = %verdict.item_id,
                category = ?verdict.category,
                reason = %reason,
                "Item evicted"
            )
        }
        Verdict::Evicted { reason } => tracing::warn!(
            item_id = %verdict.item_id,
            reason = %reason,
            "Item evicted"
        ),
    }
}
