//! Generation error types.

use safebind_meta::MetaError;

/// Errors raised while generating bindings.
///
/// Only [`GenerationError::PlatformIncompatible`] is recoverable: it rolls
/// back the enclosing transaction and bulk generation skips the item that
/// raised it. Every other variant is fatal for the request that produced it.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// A required entity does not exist for the target architecture.
    #[error("'{entity}' is not available on {architecture}")]
    PlatformIncompatible {
        entity: String,
        architecture: String,
    },

    /// An internal invariant was violated while building a declaration.
    #[error("failed to generate '{entity}': {detail}")]
    GenerationFailed {
        entity: String,
        detail: String,
        #[source]
        source: Option<Box<GenerationError>>,
    },

    /// A recognized metadata shape this generator does not implement.
    #[error("'{entity}' uses an unsupported shape: {detail}")]
    Unsupported { entity: String, detail: String },

    /// A name lookup matched more than one entity.
    #[error("'{name}' is ambiguous; qualify it as one of: {}", candidates.join(", "))]
    Ambiguous {
        name: String,
        candidates: Vec<String>,
    },

    #[error("no API named '{name}'")]
    NotFound { name: String },

    /// A type reference resolved in no loaded metadata scope.
    #[error("unresolved type reference '{reference}'")]
    UnresolvedReference { reference: String },

    #[error("generation cancelled")]
    Cancelled,

    #[error("invalid documentation file: {0}")]
    Documentation(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Metadata(#[from] MetaError),
}

impl GenerationError {
    pub fn failed(entity: impl ToString, detail: impl Into<String>) -> Self {
        Self::GenerationFailed {
            entity: entity.to_string(),
            detail: detail.into(),
            source: None,
        }
    }

    pub fn unsupported(entity: impl ToString, detail: impl Into<String>) -> Self {
        Self::Unsupported {
            entity: entity.to_string(),
            detail: detail.into(),
        }
    }

    /// Wrap a metadata error raised while generating `entity`.
    pub fn from_metadata(entity: impl ToString, error: MetaError) -> Self {
        Self::GenerationFailed {
            entity: entity.to_string(),
            detail: "invalid metadata".to_string(),
            source: Some(Box::new(Self::Metadata(error))),
        }
    }

    pub fn is_platform_incompatible(&self) -> bool {
        matches!(self, Self::PlatformIncompatible { .. })
    }
}

/// Result type alias for generation operations.
pub type Result<T> = std::result::Result<T, GenerationError>;
