//! Error types for the layoutrecon pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for dataset generation operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid coordinates: {0}")]
    InvalidCoordinate(String),

    #[error("missing or unreadable image {}: {reason}", path.display())]
    MissingImage { path: PathBuf, reason: String },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("annotation export error: {0}")]
    Annotation(String),

    #[error("token source error for page {page}: {reason}")]
    TokenSource { page: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image encode error: {0}")]
    Image(#[from] image::ImageError),
}

/// Convenience Result type alias for Error.
pub type Result<T> = std::result::Result<T, Error>;
