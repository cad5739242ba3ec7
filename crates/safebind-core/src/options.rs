//! Generator options.
//!
//! Read from the `[options]` table of a project manifest. Every field has a
//! default, so an empty table is a valid configuration.

use std::collections::BTreeSet;

use safebind_meta::Architecture;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct GeneratorOptions {
    /// Let extern declarations use marshaled (non-blittable) representations.
    pub allow_marshaling: bool,
    /// Wrap releasable handles in owning wrapper types.
    pub use_safe_handles: bool,
    /// Never fall back to the narrow-character (`A`) variant of an API.
    pub wide_char_only: bool,
    /// Emit public rather than crate-visible declarations.
    pub public: bool,
    /// Target architecture; `None` generates only architecture-neutral entities.
    pub architecture: Option<Architecture>,
    pub com_interop: ComInteropOptions,
    pub friendly_overloads: FriendlyOverloadOptions,
    pub capabilities: Capabilities,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            allow_marshaling: true,
            use_safe_handles: true,
            wide_char_only: true,
            public: false,
            architecture: None,
            com_interop: ComInteropOptions::default(),
            friendly_overloads: FriendlyOverloadOptions::default(),
            capabilities: Capabilities::default(),
        }
    }
}

impl GeneratorOptions {
    /// Target name for diagnostics.
    pub fn architecture_name(&self) -> String {
        match self.architecture {
            Some(arch) => arch.to_string(),
            None => "any CPU".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ComInteropOptions {
    /// Interface methods keeping their native return value, written as
    /// `Interface.Method`, `Interface.*` or fully qualified.
    pub preserve_sig_methods: BTreeSet<String>,
}

impl ComInteropOptions {
    pub fn preserves_sig(&self, namespace: &str, interface: &str, method: &str) -> bool {
        let patterns = [
            format!("{interface}.{method}"),
            format!("{interface}.*"),
            format!("{namespace}.{interface}.{method}"),
            format!("{namespace}.{interface}.*"),
        ];
        patterns
            .iter()
            .any(|p| self.preserve_sig_methods.contains(p))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FriendlyOverloadOptions {
    pub enabled: bool,
}

impl Default for FriendlyOverloadOptions {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Features of the target runtime that gate individual overload rewrites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Capabilities {
    /// Contiguous range (slice) types.
    pub slices: bool,
    /// Native-width integer types.
    pub native_int: bool,
    /// References to value types that need no real null pointer.
    pub null_ref: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            slices: true,
            native_int: true,
            null_ref: true,
        }
    }
}
