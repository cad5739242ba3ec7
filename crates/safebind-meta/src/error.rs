//! Metadata error types.

/// Errors that can occur while loading or querying metadata.
#[derive(Debug, thiserror::Error)]
pub enum MetaError {
    /// A type string could not be parsed.
    #[error("invalid type string '{input}': {detail}")]
    InvalidTypeString { input: String, detail: String },

    /// The metadata document is structurally invalid.
    #[error("invalid metadata document: {detail}")]
    InvalidDocument { detail: String },

    /// The document declares a format version this crate cannot read.
    #[error("unsupported metadata format {version} (supported: {supported})")]
    UnsupportedFormat { version: String, supported: String },

    /// A function's parameter annotations are inconsistent.
    #[error("invalid signature for '{function}': {detail}")]
    InvalidSignature { function: String, detail: String },

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for metadata operations.
pub type Result<T> = std::result::Result<T, MetaError>;
