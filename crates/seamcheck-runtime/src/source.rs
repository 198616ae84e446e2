//! Prediction sources: where a pass gets its records from.
//!
//! A source lists the item ids it can predict and answers one prediction per
//! id. The classifiers themselves live outside this crate; sources only
//! adapt their output.

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::OnceCell;

use seamcheck_core::{ItemId, PredictionBatch, PredictionError, PredictionRecord};

/// Errors from prediction sources.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to read predictions: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid predictions: {0}")]
    Prediction(#[from] PredictionError),

    #[error("No prediction for item '{0}'")]
    NotFound(ItemId),

    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

/// Supplies predictions for a pass.
///
/// Implementations must be safe to query concurrently.
#[async_trait]
pub trait PredictionSource: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Every id this source can predict, in batch order, without repeats.
    async fn item_ids(&self) -> Result<Vec<ItemId>, SourceError>;

    /// The prediction for one id.
    async fn predict(&self, item_id: &ItemId) -> Result<PredictionRecord, SourceError>;
}

/// Records indexed by id. An id seen more than once keeps its first
/// position and its last record, the same rule the store applies.
#[derive(Debug, Default)]
struct IndexedRecords {
    order: Vec<ItemId>,
    by_id: HashMap<ItemId, PredictionRecord>,
}

impl IndexedRecords {
    fn from_batch(batch: PredictionBatch) -> Self {
        let mut indexed = Self::default();
        for record in batch.into_records() {
            let id = ItemId::new(record.item_id.as_str());
            if indexed.by_id.insert(id.clone(), record).is_none() {
                indexed.order.push(id);
            }
        }
        indexed
    }

    fn get(&self, item_id: &ItemId) -> Result<PredictionRecord, SourceError> {
        self.by_id
            .get(item_id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(item_id.clone()))
    }
}

/// Predictions held in memory.
pub struct MemorySource {
    records: IndexedRecords,
}

impl MemorySource {
    pub fn new(batch: PredictionBatch) -> Self {
        Self {
            records: IndexedRecords::from_batch(batch),
        }
    }
}

#[async_trait]
impl PredictionSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn item_ids(&self) -> Result<Vec<ItemId>, SourceError> {
        Ok(self.records.order.clone())
    }

    async fn predict(&self, item_id: &ItemId) -> Result<PredictionRecord, SourceError> {
        self.records.get(item_id)
    }
}

/// Predictions read from a JSON file on first use, then served from memory.
pub struct JsonFileSource {
    path: PathBuf,
    records: OnceCell<IndexedRecords>,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            records: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn records(&self) -> Result<&IndexedRecords, SourceError> {
        self.records
            .get_or_try_init(|| async {
                let contents = tokio::fs::read_to_string(&self.path).await?;
                let batch = PredictionBatch::from_json(&contents)?;
                tracing::info!(
                    path = %self.path.display(),
                    records = batch.len(),
                    "Loaded predictions"
                );
                Ok::<_, SourceError>(IndexedRecords::from_batch(batch))
            })
            .await
    }
}

#[async_trait]
impl PredictionSource for JsonFileSource {
    fn name(&self) -> &str {
        "json-file"
    }

    async fn item_ids(&self) -> Result<Vec<ItemId>, SourceError> {
        Ok(self.records().await?.order.clone())
    }

    async fn predict(&self, item_id: &ItemId) -> Result<PredictionRecord, SourceError> {
        self.records().await?.get(item_id)
    }
}

/// Fetch every prediction from `source`, at most `concurrency` at a time.
/// Records come back in id order whatever order the fetches finish in.
pub async fn collect_batch(
    source: &dyn PredictionSource,
    concurrency: usize,
) -> Result<PredictionBatch, SourceError> {
    let ids = source.item_ids().await?;
    tracing::debug!(source = source.name(), items = ids.len(), "Collecting predictions");

    let records: Vec<PredictionRecord> = stream::iter(ids)
        .map(|id| async move { source.predict(&id).await })
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    Ok(PredictionBatch::new(records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn batch() -> PredictionBatch {
        PredictionBatch::new(vec![
            PredictionRecord::new("a", "Bag"),
            PredictionRecord::new("b", "Coat"),
            PredictionRecord::new("a", "Dress"),
        ])
    }

    #[tokio::test]
    async fn test_memory_source_keeps_first_position_last_record() {
        let source = MemorySource::new(batch());
        assert_eq!(
            source.item_ids().await.unwrap(),
            vec![ItemId::from("a"), ItemId::from("b")]
        );
        assert_eq!(source.predict(&"a".into()).await.unwrap().category, "Dress");
    }

    #[tokio::test]
    async fn test_unknown_id_not_found() {
        let source = MemorySource::new(batch());
        let result = source.predict(&"zzz".into()).await;
        assert!(matches!(result, Err(SourceError::NotFound(_))));
    }

    /// Answers later ids faster so completion order is reversed.
    struct SlowFirst {
        inner: MemorySource,
    }

    #[async_trait]
    impl PredictionSource for SlowFirst {
        fn name(&self) -> &str {
            "slow-first"
        }

        async fn item_ids(&self) -> Result<Vec<ItemId>, SourceError> {
            self.inner.item_ids().await
        }

        async fn predict(&self, item_id: &ItemId) -> Result<PredictionRecord, SourceError> {
            let delay = if item_id.as_str() == "a" { 50 } else { 1 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.inner.predict(item_id).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_preserves_order() {
        let source = SlowFirst {
            inner: MemorySource::new(batch()),
        };
        let collected = collect_batch(&source, 4).await.unwrap();
        let ids: Vec<&str> = collected.iter().map(|r| r.item_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_json_file_source() {
        let dir = std::env::temp_dir().join(format!("seamcheck-source-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("predictions.json");
        tokio::fs::write(
            &path,
            r#"[{ "item_id": "img_1", "category": "Bag", "attributes": { "BodyPart": "Hands" } }]"#,
        )
        .await
        .unwrap();

        let source = JsonFileSource::new(&path);
        let collected = collect_batch(&source, 2).await.unwrap();
        assert_eq!(collected.len(), 1);
        assert_eq!(collected.records()[0].category, "Bag");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let source = JsonFileSource::new("/nonexistent/seamcheck/predictions.json");
        assert!(matches!(source.item_ids().await, Err(SourceError::IoError(_))));
    }
}
