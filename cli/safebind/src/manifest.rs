//! `safebind.toml` manifest parsing and project configuration.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use safebind_core::GeneratorOptions;
use safebind_meta::{MetadataIndex, MetadataSet};
use safebind_render::OutputFormat;
use serde::{Deserialize, Serialize};

pub const MANIFEST_FILE: &str = "safebind.toml";

/// The top-level manifest structure for a binding project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SafebindManifest {
    /// APIs to generate: short or qualified names, or `Ns.*`.
    #[serde(default)]
    pub apis: Vec<String>,
    /// Libraries whose every export is generated.
    #[serde(default)]
    pub modules: Vec<String>,
    /// Project metadata (required).
    pub project: ProjectConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub options: GeneratorOptions,
    #[serde(default)]
    pub docs: Option<DocsConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Project metadata section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

/// Metadata documents to load. The first is the local scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataConfig {
    #[serde(default)]
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocsConfig {
    pub file: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output file; stdout when absent.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub format: OutputFormat,
}

impl SafebindManifest {
    /// Search upward from `start_dir` for a `safebind.toml` file, parse and
    /// return it along with the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(MANIFEST_FILE);
            if candidate.is_file() {
                let content = std::fs::read_to_string(&candidate)
                    .with_context(|| format!("reading {}", candidate.display()))?;
                let manifest: SafebindManifest = toml::from_str(&content)
                    .with_context(|| format!("parsing {}", candidate.display()))?;
                return Ok(Some((manifest, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// Parse a manifest from a TOML string.
    #[cfg(test)]
    pub fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing safebind.toml")
    }

    /// Generate the default template for `safebind init`.
    pub fn template(name: &str) -> String {
        format!(
            r#"apis = []

[project]
name = "{name}"
version = "0.1.0"

[metadata]
files = ["metadata/{name}.meta.toml"]

[options]
allow-marshaling = true
use-safe-handles = true
wide-char-only = true

[output]
path = "out/bindings.rs"
format = "rust"
"#
        )
    }
}

/// Load and index metadata documents relative to `base`.
pub fn load_metadata(base: &Path, files: &[String]) -> Result<MetadataSet> {
    if files.is_empty() {
        bail!("no metadata files given (use --metadata or [metadata] files in {MANIFEST_FILE})");
    }
    let mut set = MetadataSet::default();
    for file in files {
        let path = base.join(file);
        let index = MetadataIndex::load(&path)
            .with_context(|| format!("loading metadata {}", path.display()))?;
        tracing::debug!(scope = index.scope(), entities = index.len(), path = %path.display(), "loaded metadata");
        set.push(index);
    }
    Ok(set)
}
