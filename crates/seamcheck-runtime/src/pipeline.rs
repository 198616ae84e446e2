//! End-to-end batch runs: source, store, parallel check, report.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use seamcheck_core::{
    AssertionStore, CheckOutcome, IngestError, PredictionBatch, Report, ReportGenerator, Schema,
};

use crate::config::RuntimeConfig;
use crate::parallel::ParallelChecker;
use crate::source::{collect_batch, PredictionSource};
use crate::RuntimeError;

/// Everything one run produced.
#[derive(Debug)]
pub struct PassOutput {
    /// Store after eviction; only consistent items remain
    pub store: AssertionStore,
    pub outcome: CheckOutcome,
    pub report: Report,
    /// Records refused at ingestion
    pub rejected: Vec<IngestError>,
}

/// Runs a full pass per call. Every run starts from a fresh store.
pub struct Pipeline {
    schema: Arc<Schema>,
    config: RuntimeConfig,
}

impl Pipeline {
    pub fn new(schema: Arc<Schema>, config: RuntimeConfig) -> Result<Self, RuntimeError> {
        config.validate()?;
        Ok(Self { schema, config })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Fetch every prediction from `source` and check it.
    pub async fn run(&self, source: &dyn PredictionSource) -> Result<PassOutput, RuntimeError> {
        let batch = collect_batch(source, self.config.fetch_concurrency).await?;
        self.run_batch(&batch).await
    }

    /// Check an already collected batch.
    pub async fn run_batch(&self, batch: &PredictionBatch) -> Result<PassOutput, RuntimeError> {
        let mut store = AssertionStore::new();
        let mut rejected = Vec::new();
        for record in batch.iter() {
            if let Err(e) = store.ingest_record(&self.schema, record) {
                tracing::warn!(item_id = %record.item_id, error = %e, "Prediction rejected");
                rejected.push(e);
            }
        }

        let checker =
            ParallelChecker::new(Arc::clone(&self.schema), self.config.workers, self.config.shards);
        let (store, outcome) = checker.check(store).await?;
        let report = ReportGenerator::new(&self.schema).from_pass(&outcome, &store)?;

        Ok(PassOutput {
            store,
            outcome,
            report,
            rejected,
        })
    }

    /// Write the configured outputs. Both are rendered before anything is
    /// written, and either both files are replaced or neither is.
    pub async fn persist(&self, report: &Report) -> Result<(), RuntimeError> {
        let output = &self.config.output;
        let rendered = output
            .report_path
            .as_ref()
            .map(|path| report.render(output.format).map(|text| (path, text)))
            .transpose()?;
        let evicted = output
            .evicted_path
            .as_ref()
            .map(|path| serde_json::to_string_pretty(report.evicted_ids()).map(|json| (path, json)))
            .transpose()?;

        let files: Vec<(&Path, &str)> = rendered
            .iter()
            .chain(evicted.iter())
            .map(|(path, contents)| (path.as_path(), contents.as_str()))
            .collect();
        write_all_atomic(&files).await?;

        if let Some((path, _)) = &rendered {
            tracing::info!(path = %path.display(), format = %output.format, "Report written");
        }
        if let Some((path, _)) = &evicted {
            tracing::info!(
                path = %path.display(),
                evicted = report.evicted_ids().len(),
                "Evicted ids written"
            );
        }
        Ok(())
    }
}

static SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write `contents` to a sibling temp file, then rename it over `path`.
pub async fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    write_all_atomic(&[(path, contents)]).await
}

/// Replace every target in `files`, or none of them.
///
/// All contents are staged in temp files before any target is touched.
/// Existing targets are moved aside while the temps are renamed in; if a
/// rename fails, earlier targets get their previous contents back and every
/// scratch file is removed.
pub async fn write_all_atomic(files: &[(&Path, &str)]) -> std::io::Result<()> {
    let mut staged: Vec<(&Path, PathBuf)> = Vec::with_capacity(files.len());
    for (path, contents) in files {
        match stage(path, contents).await {
            Ok(tmp) => staged.push((*path, tmp)),
            Err(e) => {
                for (_, tmp) in &staged {
                    let _ = tokio::fs::remove_file(tmp).await;
                }
                return Err(e);
            }
        }
    }

    let mut committed: Vec<(&Path, Option<PathBuf>)> = Vec::with_capacity(staged.len());
    for (position, (path, tmp)) in staged.iter().enumerate() {
        match commit(path, tmp).await {
            Ok(backup) => committed.push((*path, backup)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Rolling back output files");
                rollback(&committed).await;
                for (_, tmp) in &staged[position..] {
                    let _ = tokio::fs::remove_file(tmp).await;
                }
                return Err(e);
            }
        }
    }

    for (_, backup) in committed {
        if let Some(backup) = backup {
            let _ = tokio::fs::remove_file(&backup).await;
        }
    }
    Ok(())
}

async fn stage(path: &Path, contents: &str) -> std::io::Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = scratch_path(path, "tmp");
    if let Err(e) = tokio::fs::write(&tmp, contents).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(tmp)
}

/// Rename `tmp` over `path`. A regular file already at `path` is kept at the
/// returned backup path until the whole write succeeds.
async fn commit(path: &Path, tmp: &Path) -> std::io::Result<Option<PathBuf>> {
    let backup = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => {
            let backup = scratch_path(path, "bak");
            tokio::fs::rename(path, &backup).await?;
            Some(backup)
        }
        _ => None,
    };

    if let Err(e) = tokio::fs::rename(tmp, path).await {
        if let Some(backup) = &backup {
            let _ = tokio::fs::rename(backup, path).await;
        }
        return Err(e);
    }
    Ok(backup)
}

async fn rollback(committed: &[(&Path, Option<PathBuf>)]) {
    for (path, backup) in committed.iter().rev() {
        let _ = match backup {
            Some(backup) => tokio::fs::rename(backup, path).await,
            None => tokio::fs::remove_file(path).await,
        };
    }
}

/// Hidden sibling of `path`, unique per process and call.
fn scratch_path(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let n = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{}.{}.{}.{}", name, std::process::id(), n, suffix))
}
