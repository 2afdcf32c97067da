//! Custom error types for hazepair.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the hazepair library.
#[derive(Error, Debug)]
pub enum Error {
    /// The dataset mode is not one of `train`, `valid`, `test`.
    #[error("invalid mode {0:?}: expected one of train, valid, test")]
    InvalidMode(String),

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// The ground-truth directory could not be listed.
    #[error("failed to read image directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Sample index past the end of the dataset.
    #[error("index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// One half of a pair is missing on disk.
    #[error("image not found: {path}")]
    ImageNotFound { path: PathBuf },

    /// Failed to load an image file.
    #[error("failed to load image from {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Failed to save an image file.
    #[error("failed to save image to {path}: {source}")]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for hazepair operations.
pub type Result<T> = std::result::Result<T, Error>;
