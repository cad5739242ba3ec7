//! Errors from the rendering layer.

use thiserror::Error;

/// Convenience alias for results within the render crate.
pub type Result<T> = std::result::Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("unknown output format: '{name}'. Available formats: rust, json")]
    UnknownFormat { name: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
