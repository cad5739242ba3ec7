//! Target architectures and platform compatibility.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A CPU architecture an entity may be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    X86,
    X64,
    Arm64,
}

impl Architecture {
    /// Parse an architecture name (case-insensitive, with common aliases).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "x86" | "i686" => Some(Self::X86),
            "x64" | "x86_64" | "amd64" => Some(Self::X64),
            "arm64" | "aarch64" => Some(Self::Arm64),
            _ => None,
        }
    }

    /// Pointer width in bits.
    pub fn word_bits(&self) -> u32 {
        match self {
            Self::X86 => 32,
            Self::X64 | Self::Arm64 => 64,
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X86 => write!(f, "x86"),
            Self::X64 => write!(f, "x64"),
            Self::Arm64 => write!(f, "arm64"),
        }
    }
}

/// Whether an entity restricted to `supported` exists when generating for `target`.
///
/// An empty `supported` list means the entity exists everywhere. Generating
/// for no particular architecture (`target == None`) excludes every
/// architecture-specific entity, since its shape differs between targets.
pub fn is_compatible(supported: &[Architecture], target: Option<Architecture>) -> bool {
    if supported.is_empty() {
        return true;
    }
    match target {
        Some(arch) => supported.contains(&arch),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_aliases() {
        assert_eq!(Architecture::parse("AMD64"), Some(Architecture::X64));
        assert_eq!(Architecture::parse("aarch64"), Some(Architecture::Arm64));
        assert_eq!(Architecture::parse("x86"), Some(Architecture::X86));
        assert_eq!(Architecture::parse("mips"), None);
    }

    #[test]
    fn word_bits() {
        assert_eq!(Architecture::X86.word_bits(), 32);
        assert_eq!(Architecture::Arm64.word_bits(), 64);
    }

    #[test]
    fn compatibility_rules() {
        assert!(is_compatible(&[], None));
        assert!(is_compatible(&[], Some(Architecture::X86)));
        assert!(is_compatible(&[Architecture::X64], Some(Architecture::X64)));
        assert!(!is_compatible(&[Architecture::X64], Some(Architecture::Arm64)));
        assert!(!is_compatible(&[Architecture::X64], None));
    }
}
