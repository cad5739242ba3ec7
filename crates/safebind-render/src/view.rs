//! Output formats and the rendered result.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RenderError;

/// The output format for rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Rust,
    Json,
}

impl OutputFormat {
    /// Parse an output format from a string.
    pub fn parse(s: &str) -> Result<Self, RenderError> {
        match s {
            "rust" | "rs" => Ok(OutputFormat::Rust),
            "json" => Ok(OutputFormat::Json),
            _ => Err(RenderError::UnknownFormat {
                name: s.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Rust => "rust",
            OutputFormat::Json => "json",
        }
    }

    /// Conventional file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Rust => "rs",
            OutputFormat::Json => "json",
        }
    }
}

/// The output of a render.
#[derive(Debug)]
pub struct RenderOutput {
    /// Rust source text.
    pub text: String,
    /// Machine-readable JSON (always populated).
    pub data: Value,
}

impl RenderOutput {
    /// Render in the requested format.
    pub fn render(&self, format: OutputFormat) -> Result<String, RenderError> {
        match format {
            OutputFormat::Rust => Ok(self.text.clone()),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&self.data)?),
        }
    }
}
