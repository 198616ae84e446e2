//! A store split into lock-protected shards for concurrent checking.

use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use seamcheck_core::checker::{assess_slot, log_verdict};
use seamcheck_core::{AssertionStore, Item, ItemId, ItemVerdict, Schema};

/// Items spread over shards by id hash. The ingestion ledger is kept whole
/// and never changes while sharded.
pub struct ShardedStore {
    ledger: Vec<ItemId>,
    shards: Vec<Mutex<HashMap<ItemId, Item>>>,
}

impl ShardedStore {
    /// Split `store` into `shard_count` shards (at least one).
    pub fn from_store(store: AssertionStore, shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        let (ledger, items) = store.into_parts();

        let mut shards: Vec<HashMap<ItemId, Item>> =
            (0..shard_count).map(|_| HashMap::new()).collect();
        for item in items {
            let shard = shard_index(item.id(), shard_count);
            shards[shard].insert(item.id().clone(), item);
        }

        Self {
            ledger,
            shards: shards.into_iter().map(Mutex::new).collect(),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn ledger(&self) -> &[ItemId] {
        &self.ledger
    }

    fn shard(&self, item_id: &ItemId) -> &Mutex<HashMap<ItemId, Item>> {
        &self.shards[shard_index(item_id, self.shards.len())]
    }

    pub fn contains(&self, item_id: &ItemId) -> bool {
        self.shard(item_id).lock().contains_key(item_id)
    }

    /// Number of live items across all shards.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove an item. Unknown or already evicted ids are a no-op.
    pub fn evict(&self, item_id: &ItemId) -> Option<Item> {
        self.shard(item_id).lock().remove(item_id)
    }

    /// Assess one item and evict it on failure, holding its shard lock
    /// throughout, so no reader sees an assessed-but-not-yet-evicted item.
    pub fn check_item(&self, schema: &Schema, item_id: &ItemId) -> ItemVerdict {
        let mut shard = self.shard(item_id).lock();
        let item = shard.get(item_id);

        let verdict = ItemVerdict {
            item_id: item_id.clone(),
            category: item.and_then(|i| i.category()),
            verdict: assess_slot(schema, item),
        };
        if verdict.verdict.is_evicted() {
            shard.remove(item_id);
        }
        drop(shard);

        log_verdict(&verdict);
        verdict
    }

    /// Merge the shards back into one store in ingestion order.
    pub fn into_store(self) -> AssertionStore {
        let mut shards: Vec<HashMap<ItemId, Item>> =
            self.shards.into_iter().map(Mutex::into_inner).collect();
        let shard_count = shards.len();

        let items: Vec<Item> = self
            .ledger
            .iter()
            .filter_map(|id| shards[shard_index(id, shard_count)].remove(id))
            .collect();
        AssertionStore::from_parts(self.ledger, items)
    }
}

fn shard_index(item_id: &ItemId, shard_count: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    item_id.hash(&mut hasher);
    (hasher.finish() % shard_count as u64) as usize
}
