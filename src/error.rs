//! Error types for batch runs.
//!
//! Every variant is fatal to the whole run: there is no skip-and-continue
//! path anywhere in the batch.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while discovering, processing or aggregating a batch.
#[derive(Debug, Error)]
pub enum BatchError {
    /// The source directory is missing or holds no matching images.
    #[error("no input images found in {}", .directory.display())]
    NoInputFiles { directory: PathBuf },

    /// The output directory is missing, unreadable or not empty.
    #[error("output directory {} must exist and be empty", .directory.display())]
    DirtyOutput { directory: PathBuf },

    /// The item pipeline cannot run in this environment.
    #[error("item pipeline unavailable: {0}")]
    PipelineUnavailable(String),

    /// Two inputs would write artifacts under the same name.
    #[error(
        "identifier '{identifier}' is shared by {} and {}",
        .first.display(),
        .second.display()
    )]
    DuplicateIdentifier {
        identifier: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// An input image could not be decoded.
    #[error("failed to load image {}: {source}", .path.display())]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The item pipeline failed for one image.
    #[error("processing '{identifier}' failed: {message}")]
    ItemProcessing { identifier: String, message: String },

    /// An expected per-item artifact is absent.
    #[error("missing artifact for '{identifier}': {}", .path.display())]
    MissingArtifact { identifier: String, path: PathBuf },

    /// An artifact exists but cannot be interpreted.
    #[error("malformed artifact {}: {reason}", .path.display())]
    MalformedArtifact { path: PathBuf, reason: String },

    /// Read or write failure on an artifact or summary file.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BatchError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BatchError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type BatchResult<T> = std::result::Result<T, BatchError>;
