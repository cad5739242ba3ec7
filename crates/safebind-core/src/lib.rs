//! Binding generation for native APIs.
//!
//! Turns metadata entities into neutral declarations: raw extern
//! signatures, the types they depend on, owning handle wrappers and
//! friendly overloads that replace pointer, length and handle parameters
//! with safe equivalents.
//!
//! ## Modules
//!
//! - [`options`]: Generator configuration
//! - [`mapping`]: Descriptor to target type mapping
//! - [`managed`]: Cycle-safe "requires marshaling" analysis for structs
//! - [`store`]: Memoized, transactional generation store
//! - [`raii`]: Owning handle wrapper synthesis
//! - [`friendly`]: Friendly overload synthesis
//! - [`decl`]: The neutral declaration representation
//! - [`generator`]: Name lookup plus single and bulk generation
//! - [`docs`]: Documentation lookup

pub mod decl;
pub mod docs;
mod emit;
pub mod error;
pub mod friendly;
pub mod generator;
pub mod managed;
pub mod mapping;
pub mod options;
pub mod raii;
pub mod store;

pub use decl::{Declaration, FriendlyOverload, HandleWrapperSpec, Item};
pub use docs::{DocumentationMap, DocumentationProvider};
pub use error::GenerationError;
pub use generator::{Bindings, BulkReport, CancellationToken, Generator};
pub use mapping::{map_type, MappingSettings, TypeExpr};
pub use options::GeneratorOptions;
pub use store::{EntityId, GenerationStore};
