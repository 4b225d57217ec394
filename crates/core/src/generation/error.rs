use std::time::Duration;

use thiserror::Error;

use crate::cache::{CacheError, EntityKind};
use crate::database::StoreError;
use crate::output::OutputError;

/// Errors from ticket generation and dispatch.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The order, position or event could not be loaded.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The output failed to render.
    #[error("Output {provider} failed: {source}")]
    Output {
        provider: String,
        #[source]
        source: OutputError,
    },

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// The caller stopped waiting.
    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    /// The worker queue is closed or the job was dropped.
    #[error("Generation worker unavailable")]
    WorkerUnavailable,

    /// A job panicked on the worker.
    #[error("Generation panicked: {0}")]
    Panicked(String),

    /// No enabled output matched the requested provider.
    #[error("No enabled output {provider}")]
    NoOutput { provider: String },

    /// The entry created by a generation has disappeared.
    #[error("Generated entry {kind} {id} not found")]
    EntryMissing { kind: EntityKind, id: i64 },
}

impl GenerationError {
    /// Whether the error is an expected per-item failure rather than a bug.
    pub fn is_expected(&self) -> bool {
        !matches!(self, GenerationError::Panicked(_))
    }

    /// Whether the requested entity does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, GenerationError::Store(e) if e.is_not_found())
    }

    /// Short label for metrics.
    pub fn category(&self) -> &'static str {
        match self {
            GenerationError::Store(e) if e.is_not_found() => "not_found",
            GenerationError::Store(_) => "database",
            GenerationError::Output { .. } => "output",
            GenerationError::Cache(_) => "cache",
            GenerationError::Timeout(_) => "timeout",
            GenerationError::WorkerUnavailable => "worker_unavailable",
            GenerationError::Panicked(_) => "panicked",
            GenerationError::NoOutput { .. } => "no_output",
            GenerationError::EntryMissing { .. } => "entry_missing",
        }
    }
}
