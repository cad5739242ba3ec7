//! Metadata model and query facade for native API descriptions.
//!
//! A metadata document describes the surface of a native (C-style) API:
//! functions with per-parameter annotations, structs, enums, constants,
//! handle typedefs with their release functions, COM-style interfaces,
//! callbacks and macros. This crate loads such documents and answers the
//! read-only questions the binding generator asks of them.
//!
//! ## Modules
//!
//! - [`descriptor`]: Tagged type descriptors and type references
//! - [`typestr`]: Parser for C-flavoured type strings
//! - [`signature`]: Parameter and method signature descriptors
//! - [`arch`]: Target architectures and platform compatibility
//! - [`model`]: Entity definitions as they appear in a metadata document
//! - [`document`]: `.meta.toml` document parsing and validation
//! - [`query`]: The query facade and its single- and multi-scope indexes

pub mod arch;
pub mod descriptor;
pub mod document;
pub mod error;
pub mod model;
pub mod query;
pub mod signature;
pub mod typestr;

pub use arch::Architecture;
pub use descriptor::{DescriptorFlags, PrimitiveCode, TypeDescriptor, TypeRef};
pub use document::MetadataDocument;
pub use error::MetaError;
pub use query::{
    EntityKind, MetadataIndex, MetadataQuery, MetadataSet, QualifiedName, ResolvedType,
    TypeEntity,
};
pub use signature::{ArrayLength, CharWidth, Direction, MethodSignature, ParamFlags, ParameterDescriptor};
