//! Progress reporting hook for callers of the orchestrator.

use crate::models::ItemResult;
use std::path::PathBuf;

/// Events emitted while a batch runs.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Inputs discovered and checks passed.
    Started {
        /// Number of images in the batch.
        total: usize,
    },
    /// Processing of one image is about to begin.
    ItemStarted {
        /// Position in discovery order (0-based).
        index: usize,
        path: PathBuf,
    },
    /// One image finished successfully.
    ItemCompleted { result: ItemResult },
    /// All items done; summaries are being written.
    Aggregating,
    /// Summaries written.
    Finished { processed: usize },
}

/// Receives progress events.
pub trait ProgressSink {
    fn on_event(&self, event: ProgressEvent);
}
