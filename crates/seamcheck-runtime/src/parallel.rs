//! Parallel consistency checking over a sharded store.
//!
//! Verdicts are independent per item, so the ledger is striped across
//! blocking workers: worker `w` owns every position `i` with
//! `i % workers == w`. Results are put back in ledger order, which makes
//! the outcome identical to [`ConsistencyChecker`] on the same store.
//!
//! [`ConsistencyChecker`]: seamcheck_core::ConsistencyChecker

use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use seamcheck_core::checker::{log_verdict, settle_again};
use seamcheck_core::{AssertionStore, CheckOutcome, ItemId, ItemVerdict, Schema};

use crate::sharded::ShardedStore;
use crate::RuntimeError;

/// Checks stores on a pool of tokio blocking workers.
pub struct ParallelChecker {
    schema: Arc<Schema>,
    workers: usize,
    shards: usize,
    /// Terminal verdicts from earlier passes
    settled: Mutex<HashMap<ItemId, ItemVerdict>>,
}

impl ParallelChecker {
    pub fn new(schema: Arc<Schema>, workers: usize, shards: usize) -> Self {
        Self {
            schema,
            workers: workers.max(1),
            shards: shards.max(1),
            settled: Mutex::new(HashMap::new()),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Check every ingested item, evicting failures.
    ///
    /// Takes the store by value and hands it back after the pass. Items
    /// settled by an earlier pass keep their verdict.
    pub async fn check(
        &self,
        store: AssertionStore,
    ) -> Result<(AssertionStore, CheckOutcome), RuntimeError> {
        let sharded = Arc::new(ShardedStore::from_store(store, self.shards));
        let ledger: Arc<Vec<ItemId>> = Arc::new(sharded.ledger().to_vec());
        let settled: Arc<HashMap<ItemId, ItemVerdict>> = Arc::new(self.settled.lock().clone());

        tracing::debug!(
            items = ledger.len(),
            workers = self.workers,
            shards = sharded.shard_count(),
            "Starting parallel pass"
        );

        let handles: Vec<_> = (0..self.workers)
            .map(|worker| {
                let schema = Arc::clone(&self.schema);
                let sharded = Arc::clone(&sharded);
                let ledger = Arc::clone(&ledger);
                let settled = Arc::clone(&settled);
                let stride = self.workers;

                tokio::task::spawn_blocking(move || {
                    ledger
                        .iter()
                        .enumerate()
                        .skip(worker)
                        .step_by(stride)
                        .map(|(position, item_id)| {
                            let verdict = match settled.get(item_id) {
                                Some(previous) => {
                                    let again =
                                        settle_again(previous.clone(), sharded.contains(item_id));
                                    if again.verdict.is_evicted() {
                                        sharded.evict(item_id);
                                    }
                                    if &again != previous {
                                        log_verdict(&again);
                                    }
                                    again
                                }
                                None => sharded.check_item(&schema, item_id),
                            };
                            (position, verdict)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut slots: Vec<Option<ItemVerdict>> = vec![None; ledger.len()];
        for joined in join_all(handles).await {
            let results = joined.map_err(|e| RuntimeError::Worker(e.to_string()))?;
            for (position, verdict) in results {
                slots[position] = Some(verdict);
            }
        }

        let verdicts: Vec<ItemVerdict> = slots.into_iter().flatten().collect();
        if verdicts.len() != ledger.len() {
            return Err(RuntimeError::Worker(format!(
                "{} of {} items were not checked",
                ledger.len() - verdicts.len(),
                ledger.len()
            )));
        }

        {
            let mut remembered = self.settled.lock();
            for verdict in &verdicts {
                remembered.insert(verdict.item_id.clone(), verdict.clone());
            }
        }

        let sharded = Arc::try_unwrap(sharded)
            .map_err(|_| RuntimeError::Worker("store still shared after pass".to_string()))?;

        let outcome = CheckOutcome::from_verdicts(verdicts);
        tracing::info!(
            total = outcome.len(),
            consistent = outcome.consistent_count(),
            evicted = outcome.evicted_count(),
            workers = self.workers,
            "Consistency pass complete"
        );
        Ok((sharded.into_store(), outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seamcheck_core::{
        AttributeValue, Axis, Category, ConsistencyChecker, EvictionReason, Verdict,
    };

    fn mixed_store() -> AssertionStore {
        let schema = Schema::standard().unwrap();
        let mut store = AssertionStore::new();
        for i in 0..60 {
            let category = Category::ALL[i % Category::ALL.len()];
            let body = schema.axis_values(Axis::BodyPart)[i % 5];
            let weather = schema.axis_values(Axis::WeatherType)[i % 3];
            let edge = schema.axis_values(Axis::EdgeShape)[i % 2];
            let facts: Vec<(Axis, AttributeValue)> = vec![
                (Axis::BodyPart, body),
                (Axis::WeatherType, weather),
                (Axis::EdgeShape, edge),
            ];
            store.ingest(format!("img_{}", i), Some(category), &facts).unwrap();
        }
        store.ingest("unclassified", None, &[]).unwrap();
        store
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_matches_sequential_checker() {
        let schema = Schema::standard().unwrap();

        let mut sequential_store = mixed_store();
        let sequential = ConsistencyChecker::new(schema).check(&mut sequential_store);

        let checker = ParallelChecker::new(Arc::new(schema.clone()), 4, 7);
        let (parallel_store, parallel) = checker.check(mixed_store()).await.unwrap();

        assert_eq!(parallel, sequential);
        assert_eq!(parallel_store.all_item_ids(), sequential_store.all_item_ids());
        assert_eq!(parallel_store.ledger(), sequential_store.ledger());
    }

    #[tokio::test]
    async fn test_more_workers_than_items() {
        let schema = Schema::standard().unwrap();
        let mut store = AssertionStore::new();
        store.ingest("only", None, &[]).unwrap();

        let checker = ParallelChecker::new(Arc::new(schema.clone()), 8, 2);
        let (store, outcome) = checker.check(store).await.unwrap();
        assert_eq!(outcome.len(), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_item_removed_between_passes_becomes_absent() {
        let schema = Schema::standard().unwrap();
        let checker = ParallelChecker::new(Arc::new(schema.clone()), 2, 3);

        let mut store = AssertionStore::new();
        store
            .ingest(
                "bag",
                Some(Category::Bag),
                &[
                    (Axis::BodyPart, AttributeValue::Hands),
                    (Axis::WeatherType, AttributeValue::Any),
                    (Axis::EdgeShape, AttributeValue::StraightEdge),
                ],
            )
            .unwrap();

        let (mut store, first) = checker.check(store).await.unwrap();
        assert_eq!(first.consistent_count(), 1);

        store.evict(&"bag".into());
        let (_, second) = checker.check(store).await.unwrap();
        assert_eq!(
            second.verdict_of(&"bag".into()),
            Some(&Verdict::evicted(EvictionReason::Absent))
        );
    }

    #[tokio::test]
    async fn test_second_pass_reuses_verdicts() {
        let schema = Schema::standard().unwrap();
        let checker = ParallelChecker::new(Arc::new(schema.clone()), 3, 4);

        let (store, first) = checker.check(mixed_store()).await.unwrap();
        let live = store.all_item_ids();
        let (store, second) = checker.check(store).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.all_item_ids(), live);
    }
}
