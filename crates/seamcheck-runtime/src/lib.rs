//! # seamcheck-runtime
//!
//! Batch runtime for seamcheck.
//!
//! `seamcheck-core` decides every verdict; this crate only moves work
//! around it:
//! - Fetching predictions from a [`PredictionSource`] with bounded
//!   concurrency
//! - Checking a sharded store on tokio blocking workers
//! - Persisting reports with atomic file replacement
//!
//! Parallel runs produce exactly the outcome of the sequential checker.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use seamcheck_core::Schema;
//! use seamcheck_runtime::{JsonFileSource, Pipeline, RuntimeConfig};
//!
//! let config = RuntimeConfig::from_yaml_file("seamcheck.yaml")?.with_env_overrides()?;
//! let pipeline = Pipeline::new(Arc::new(Schema::standard()?.clone()), config)?;
//!
//! let output = pipeline.run(&JsonFileSource::new("predictions.json")).await?;
//! pipeline.persist(&output.report).await?;
//! ```

pub mod config;
pub mod parallel;
pub mod pipeline;
pub mod sharded;
pub mod source;

pub use config::{ConfigError, OutputConfig, RuntimeConfig, SHARDS_ENV, WORKERS_ENV};
pub use parallel::ParallelChecker;
pub use pipeline::{write_atomic, PassOutput, Pipeline};
pub use sharded::ShardedStore;
pub use source::{collect_batch, JsonFileSource, MemorySource, PredictionSource, SourceError};

use thiserror::Error;

/// Errors from the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Report error: {0}")]
    Report(#[from] seamcheck_core::ReportError),

    #[error("Worker failed: {0}")]
    Worker(String),

    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),
}
