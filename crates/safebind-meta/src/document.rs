//! Metadata document (`.meta.toml`) parsing.
//!
//! A metadata document declares one scope of native API surface: a header
//! naming the scope and format version, followed by namespaces holding the
//! entity tables.

use std::collections::HashSet;

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

use crate::error::{MetaError, Result};
use crate::model::Namespace;

/// Format versions this crate can read.
pub const SUPPORTED_FORMAT: &str = "^1";

/// A complete metadata document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataDocument {
    pub metadata: MetadataHeader,
    #[serde(default)]
    pub namespaces: Vec<Namespace>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MetadataHeader {
    /// Scope name used by cross-scope references (`scope:Ns.Name`).
    pub scope: String,
    #[serde(default = "default_format")]
    pub format_version: Version,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_format() -> Version {
    Version::new(1, 0, 0)
}

impl MetadataDocument {
    /// Parse a metadata document from a TOML string.
    pub fn parse(input: &str) -> Result<Self> {
        let doc: MetadataDocument = toml::from_str(input)?;
        doc.validate()?;
        Ok(doc)
    }

    /// Parse a metadata document from a file path.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    fn validate(&self) -> Result<()> {
        if self.metadata.scope.is_empty() {
            return Err(MetaError::InvalidDocument {
                detail: "metadata.scope is required".to_string(),
            });
        }

        let req = VersionReq::parse(SUPPORTED_FORMAT).map_err(|e| MetaError::InvalidDocument {
            detail: e.to_string(),
        })?;
        if !req.matches(&self.metadata.format_version) {
            return Err(MetaError::UnsupportedFormat {
                version: self.metadata.format_version.to_string(),
                supported: SUPPORTED_FORMAT.to_string(),
            });
        }

        for ns in &self.namespaces {
            if ns.name.is_empty() {
                return Err(MetaError::InvalidDocument {
                    detail: "namespace with empty name".to_string(),
                });
            }
            // Types, functions, constants and macros share one name space per namespace.
            let mut seen = HashSet::new();
            let names = ns
                .functions
                .iter()
                .map(|f| &f.name)
                .chain(ns.structs.iter().map(|s| &s.name))
                .chain(ns.enums.iter().map(|e| &e.name))
                .chain(ns.constants.iter().map(|c| &c.name))
                .chain(ns.typedefs.iter().map(|t| &t.name))
                .chain(ns.interfaces.iter().map(|i| &i.name))
                .chain(ns.callbacks.iter().map(|c| &c.name))
                .chain(ns.macros.iter().map(|m| &m.name));
            for name in names {
                if name.is_empty() {
                    return Err(MetaError::InvalidDocument {
                        detail: format!("unnamed entity in namespace '{}'", ns.name),
                    });
                }
                if !seen.insert(name.as_str()) {
                    return Err(MetaError::InvalidDocument {
                        detail: format!("duplicate entity '{}.{name}'", ns.name),
                    });
                }
            }
        }
        Ok(())
    }
}
