//! Error types for the rangi engine.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The request itself is malformed (empty prompt, zero dimensions, ...).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The colorization input image does not exist. Raised before any model
    /// work happens.
    #[error("Input image not found: {}", .0.display())]
    InputNotFound(PathBuf),

    /// A model failed to load. For generation this pins the backend to
    /// remote; for colorization it triggers the one-shot artistic fallback.
    #[error("Failed to load model {key}: {cause}")]
    ModelLoadFailed { key: String, cause: String },

    /// Local inference failed. Surfaced verbatim, never retried.
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// Both the requested colorizer and the artistic fallback failed.
    #[error("Colorization failed: {primary} (artistic fallback: {fallback})")]
    ColorizationFailed { primary: String, fallback: String },

    /// The colorization library produced no file in its results directory.
    #[error("No colorization result found in {}", .0.display())]
    ResultNotFound(PathBuf),

    /// Copying the located result to the caller's destination failed.
    #[error("Failed to copy result {} -> {}: {cause}", .from.display(), .to.display())]
    ResultCopyFailed {
        from: PathBuf,
        to: PathBuf,
        cause: String,
    },

    /// Restoring the working directory after a colorize call failed.
    #[error("Failed to restore working directory: {0}")]
    DirectoryRestoreFailed(String),

    /// Model-internal inference error, wrapped by the callers above.
    #[error("Inference error: {0}")]
    InferenceError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}
