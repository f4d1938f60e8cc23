//! Error types shared by every stage of the deflicker run.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DeflickerError>;

#[derive(Debug, Error)]
pub enum DeflickerError {
    /// Source image could not be read or is corrupt.
    #[error("{} | failed to decode image: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Camera RAW file rejected by the RAW decoder.
    #[error("{} | failed to decode raw image: {message}", path.display())]
    RawDecode { path: PathBuf, message: String },

    #[error("{} | failed to save image: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("invalid configuration:\n{0}")]
    Configuration(String),

    #[error("{} | invalid input manifest: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} | io error: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Failure reported by a caller-supplied batch transform.
    #[error("task failed: {0}")]
    Task(String),
}

impl DeflickerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DeflickerError::Io { path: path.into(), source }
    }
}
