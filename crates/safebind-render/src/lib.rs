//! Renderers for generated bindings.
//!
//! Consumes the neutral declarations produced by `safebind-core` and writes
//! them out as Rust-flavoured source text or JSON. No synthesis happens here.
//!
//! ## Modules
//!
//! - [`format`]: Type, path and expression text
//! - [`rust`]: Rust source rendering
//! - [`view`]: Output formats and the rendered result

pub mod error;
pub mod format;
pub mod rust;
pub mod view;

pub use error::RenderError;
pub use view::{OutputFormat, RenderOutput};

use safebind_core::Bindings;
use tracing::debug;

/// Render bindings into both Rust text and JSON data.
pub fn render(bindings: &Bindings) -> error::Result<RenderOutput> {
    let text = rust::render_bindings(bindings);
    let data = serde_json::to_value(bindings)?;
    debug!(
        declarations = bindings.declarations.len(),
        bytes = text.len(),
        "rendered bindings"
    );
    Ok(RenderOutput { text, data })
}
