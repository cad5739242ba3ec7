//! The metadata query facade.
//!
//! [`MetadataQuery`] is the read-only interface the generator consumes.
//! [`MetadataIndex`] answers it for one loaded document (one scope);
//! [`MetadataSet`] chains several scopes, delegating references the local
//! scope cannot resolve to the others.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::arch::Architecture;
use crate::descriptor::TypeRef;
use crate::document::MetadataDocument;
use crate::error::Result;
use crate::model::{
    CallbackDef, ConstantDef, EnumDef, FunctionDef, InterfaceDef, MacroDef, StructDef, TypedefDef,
};
use crate::signature::MethodSignature;

/// Namespace-qualified entity name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedName {
    pub namespace: String,
    pub name: String,
}

impl QualifiedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Split `Namespace.Name` at the last dot.
    pub fn parse(text: &str) -> Option<Self> {
        let (ns, name) = text.rsplit_once('.')?;
        if ns.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(ns, name))
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// Kind of a declared entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Function,
    Struct,
    Enum,
    Constant,
    Typedef,
    Interface,
    Callback,
    Macro,
}

impl EntityKind {
    pub fn is_type(&self) -> bool {
        matches!(
            self,
            Self::Struct | Self::Enum | Self::Typedef | Self::Interface | Self::Callback
        )
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Function => "function",
            Self::Struct => "struct",
            Self::Enum => "enum",
            Self::Constant => "constant",
            Self::Typedef => "typedef",
            Self::Interface => "interface",
            Self::Callback => "callback",
            Self::Macro => "macro",
        };
        write!(f, "{s}")
    }
}

/// A borrowed type entity.
#[derive(Debug, Clone, Copy)]
pub enum TypeEntity<'a> {
    Struct(&'a StructDef),
    Enum(&'a EnumDef),
    Typedef(&'a TypedefDef),
    Interface(&'a InterfaceDef),
    Callback(&'a CallbackDef),
}

impl<'a> TypeEntity<'a> {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Struct(_) => EntityKind::Struct,
            Self::Enum(_) => EntityKind::Enum,
            Self::Typedef(_) => EntityKind::Typedef,
            Self::Interface(_) => EntityKind::Interface,
            Self::Callback(_) => EntityKind::Callback,
        }
    }

    pub fn architectures(&self) -> &'a [Architecture] {
        match self {
            Self::Struct(s) => &s.architectures,
            Self::Enum(e) => &e.architectures,
            Self::Typedef(t) => &t.architectures,
            Self::Interface(i) => &i.architectures,
            Self::Callback(c) => &c.architectures,
        }
    }
}

/// A type reference resolved to its declaring entity.
#[derive(Debug, Clone)]
pub struct ResolvedType<'a> {
    pub name: QualifiedName,
    pub scope: &'a str,
    pub entity: TypeEntity<'a>,
}

/// Read-only access to metadata entities.
pub trait MetadataQuery {
    /// Names of the scopes this query answers for.
    fn scopes(&self) -> Vec<&str>;

    /// All namespaces, sorted.
    fn namespaces(&self) -> Vec<&str>;

    /// Resolve a type reference. Unqualified names are looked up in
    /// `context_namespace` first.
    fn resolve_type(&self, reference: &TypeRef, context_namespace: Option<&str>)
        -> Option<ResolvedType<'_>>;

    fn function(&self, name: &QualifiedName) -> Option<&FunctionDef>;

    fn constant(&self, name: &QualifiedName) -> Option<&ConstantDef>;

    fn macro_def(&self, name: &QualifiedName) -> Option<&MacroDef>;

    /// Every entity with the given short name, across namespaces.
    fn find_short_name(&self, name: &str) -> Vec<(QualifiedName, EntityKind)>;

    /// Every entity declared in a namespace.
    fn entities_in_namespace(&self, namespace: &str) -> Vec<(QualifiedName, EntityKind)>;

    /// Functions exported by a library (case-insensitive match).
    fn functions_in_library(&self, library: &str) -> Vec<QualifiedName>;

    fn all_constants(&self) -> Vec<QualifiedName>;

    fn all_macros(&self) -> Vec<QualifiedName>;

    fn type_by_name(&self, name: &QualifiedName) -> Option<ResolvedType<'_>> {
        self.resolve_type(&TypeRef::qualified(&name.namespace, &name.name), None)
    }

    /// Decode a function's parameter annotations.
    fn decode_signature(&self, function: &FunctionDef) -> Result<MethodSignature> {
        MethodSignature::decode(function)
    }

    /// Resolve a function named by `text` (qualified or short), preferring
    /// `context_namespace` for short names.
    fn resolve_function(&self, text: &str, context_namespace: &str) -> Option<QualifiedName> {
        if let Some(qn) = QualifiedName::parse(text) {
            if self.function(&qn).is_some() {
                return Some(qn);
            }
        }
        let local = QualifiedName::new(context_namespace, text);
        if self.function(&local).is_some() {
            return Some(local);
        }
        self.find_short_name(text)
            .into_iter()
            .find(|(_, kind)| *kind == EntityKind::Function)
            .map(|(qn, _)| qn)
    }

    /// The release function registered for a handle typedef.
    fn release_method(&self, handle: &QualifiedName) -> Option<QualifiedName> {
        let resolved = self.type_by_name(handle)?;
        let TypeEntity::Typedef(typedef) = resolved.entity else {
            return None;
        };
        let release = typedef.release_with.as_deref()?;
        self.resolve_function(release, &handle.namespace)
    }

    /// Declared "no resource" values of a handle typedef, in declaration order.
    fn invalid_sentinels(&self, handle: &QualifiedName) -> Vec<i64> {
        match self.type_by_name(handle).map(|r| r.entity) {
            Some(TypeEntity::Typedef(t)) => t.invalid_values.clone(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Function(usize, usize),
    Struct(usize, usize),
    Enum(usize, usize),
    Constant(usize, usize),
    Typedef(usize, usize),
    Interface(usize, usize),
    Callback(usize, usize),
    Macro(usize, usize),
}

impl Slot {
    fn kind(&self) -> EntityKind {
        match self {
            Slot::Function(..) => EntityKind::Function,
            Slot::Struct(..) => EntityKind::Struct,
            Slot::Enum(..) => EntityKind::Enum,
            Slot::Constant(..) => EntityKind::Constant,
            Slot::Typedef(..) => EntityKind::Typedef,
            Slot::Interface(..) => EntityKind::Interface,
            Slot::Callback(..) => EntityKind::Callback,
            Slot::Macro(..) => EntityKind::Macro,
        }
    }
}

/// Index over a single metadata document.
#[derive(Debug, Clone)]
pub struct MetadataIndex {
    document: MetadataDocument,
    entries: BTreeMap<QualifiedName, Slot>,
    by_short_name: HashMap<String, Vec<QualifiedName>>,
}

impl MetadataIndex {
    /// Build an index over a parsed document.
    pub fn new(document: MetadataDocument) -> Self {
        let mut entries = BTreeMap::new();
        for (n, ns) in document.namespaces.iter().enumerate() {
            let mut add = |name: &str, slot: Slot| {
                entries.insert(QualifiedName::new(&ns.name, name), slot);
            };
            for (i, f) in ns.functions.iter().enumerate() {
                add(&f.name, Slot::Function(n, i));
            }
            for (i, s) in ns.structs.iter().enumerate() {
                add(&s.name, Slot::Struct(n, i));
            }
            for (i, e) in ns.enums.iter().enumerate() {
                add(&e.name, Slot::Enum(n, i));
            }
            for (i, c) in ns.constants.iter().enumerate() {
                add(&c.name, Slot::Constant(n, i));
            }
            for (i, t) in ns.typedefs.iter().enumerate() {
                add(&t.name, Slot::Typedef(n, i));
            }
            for (i, it) in ns.interfaces.iter().enumerate() {
                add(&it.name, Slot::Interface(n, i));
            }
            for (i, c) in ns.callbacks.iter().enumerate() {
                add(&c.name, Slot::Callback(n, i));
            }
            for (i, m) in ns.macros.iter().enumerate() {
                add(&m.name, Slot::Macro(n, i));
            }
        }

        let mut by_short_name: HashMap<String, Vec<QualifiedName>> = HashMap::new();
        for qn in entries.keys() {
            by_short_name
                .entry(qn.name.clone())
                .or_default()
                .push(qn.clone());
        }

        Self {
            document,
            entries,
            by_short_name,
        }
    }

    /// Parse and index a metadata document from a TOML string.
    pub fn parse(input: &str) -> Result<Self> {
        Ok(Self::new(MetadataDocument::parse(input)?))
    }

    /// Load and index a metadata document from a file.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        Ok(Self::new(MetadataDocument::load(path)?))
    }

    pub fn scope(&self) -> &str {
        &self.document.metadata.scope
    }

    pub fn document(&self) -> &MetadataDocument {
        &self.document
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn type_entity(&self, slot: Slot) -> Option<TypeEntity<'_>> {
        let ns = &self.document.namespaces;
        match slot {
            Slot::Struct(n, i) => Some(TypeEntity::Struct(&ns[n].structs[i])),
            Slot::Enum(n, i) => Some(TypeEntity::Enum(&ns[n].enums[i])),
            Slot::Typedef(n, i) => Some(TypeEntity::Typedef(&ns[n].typedefs[i])),
            Slot::Interface(n, i) => Some(TypeEntity::Interface(&ns[n].interfaces[i])),
            Slot::Callback(n, i) => Some(TypeEntity::Callback(&ns[n].callbacks[i])),
            Slot::Function(..) | Slot::Constant(..) | Slot::Macro(..) => None,
        }
    }

    fn resolved(&self, name: &QualifiedName) -> Option<ResolvedType<'_>> {
        let slot = *self.entries.get(name)?;
        let entity = self.type_entity(slot)?;
        Some(ResolvedType {
            name: name.clone(),
            scope: self.scope(),
            entity,
        })
    }
}

impl MetadataQuery for MetadataIndex {
    fn scopes(&self) -> Vec<&str> {
        vec![self.scope()]
    }

    fn namespaces(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .document
            .namespaces
            .iter()
            .map(|n| n.name.as_str())
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    fn resolve_type(
        &self,
        reference: &TypeRef,
        context_namespace: Option<&str>,
    ) -> Option<ResolvedType<'_>> {
        if let Some(scope) = &reference.scope {
            if scope != self.scope() {
                return None;
            }
        }

        if let Some(ns) = &reference.namespace {
            return self.resolved(&QualifiedName::new(ns, &reference.name));
        }

        if let Some(ns) = context_namespace {
            if let Some(found) = self.resolved(&QualifiedName::new(ns, &reference.name)) {
                return Some(found);
            }
        }

        // Unqualified and not local: first type with that short name, in namespace order.
        self.by_short_name
            .get(&reference.name)
            .into_iter()
            .flatten()
            .find_map(|qn| self.resolved(qn))
    }

    fn function(&self, name: &QualifiedName) -> Option<&FunctionDef> {
        match self.entries.get(name)? {
            Slot::Function(n, i) => Some(&self.document.namespaces[*n].functions[*i]),
            _ => None,
        }
    }

    fn constant(&self, name: &QualifiedName) -> Option<&ConstantDef> {
        match self.entries.get(name)? {
            Slot::Constant(n, i) => Some(&self.document.namespaces[*n].constants[*i]),
            _ => None,
        }
    }

    fn macro_def(&self, name: &QualifiedName) -> Option<&MacroDef> {
        match self.entries.get(name)? {
            Slot::Macro(n, i) => Some(&self.document.namespaces[*n].macros[*i]),
            _ => None,
        }
    }

    fn find_short_name(&self, name: &str) -> Vec<(QualifiedName, EntityKind)> {
        let mut found: Vec<(QualifiedName, EntityKind)> = self
            .by_short_name
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|qn| self.entries.get(qn).map(|slot| (qn.clone(), slot.kind())))
            .collect();
        found.sort();
        found
    }

    fn entities_in_namespace(&self, namespace: &str) -> Vec<(QualifiedName, EntityKind)> {
        self.entries
            .iter()
            .filter(|(qn, _)| qn.namespace == namespace)
            .map(|(qn, slot)| (qn.clone(), slot.kind()))
            .collect()
    }

    fn functions_in_library(&self, library: &str) -> Vec<QualifiedName> {
        self.entries
            .iter()
            .filter_map(|(qn, slot)| match slot {
                Slot::Function(n, i) => {
                    let f = &self.document.namespaces[*n].functions[*i];
                    f.library.eq_ignore_ascii_case(library).then(|| qn.clone())
                }
                _ => None,
            })
            .collect()
    }

    fn all_constants(&self) -> Vec<QualifiedName> {
        self.entries
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Constant(..)))
            .map(|(qn, _)| qn.clone())
            .collect()
    }

    fn all_macros(&self) -> Vec<QualifiedName> {
        self.entries
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Macro(..)))
            .map(|(qn, _)| qn.clone())
            .collect()
    }
}

/// Several scopes queried together.
///
/// The first index is the local scope. A reference it cannot resolve is handed
/// to the remaining scopes in order; a reference that names its scope
/// explicitly goes straight to that scope.
#[derive(Debug, Clone, Default)]
pub struct MetadataSet {
    indexes: Vec<MetadataIndex>,
}

impl MetadataSet {
    pub fn new(indexes: Vec<MetadataIndex>) -> Self {
        Self { indexes }
    }

    pub fn push(&mut self, index: MetadataIndex) {
        self.indexes.push(index);
    }

    pub fn indexes(&self) -> &[MetadataIndex] {
        &self.indexes
    }

    fn collect<'a, T: Ord>(&'a self, f: impl Fn(&'a MetadataIndex) -> Vec<T>) -> Vec<T> {
        let mut out: Vec<T> = self.indexes.iter().flat_map(f).collect();
        out.sort();
        out.dedup();
        out
    }
}

impl MetadataQuery for MetadataSet {
    fn scopes(&self) -> Vec<&str> {
        self.indexes.iter().map(|i| i.scope()).collect()
    }

    fn namespaces(&self) -> Vec<&str> {
        self.collect(|i| i.namespaces())
    }

    fn resolve_type(
        &self,
        reference: &TypeRef,
        context_namespace: Option<&str>,
    ) -> Option<ResolvedType<'_>> {
        if let Some(scope) = &reference.scope {
            return self
                .indexes
                .iter()
                .find(|i| i.scope() == scope)
                .and_then(|i| i.resolve_type(reference, context_namespace));
        }

        let (local, others) = self.indexes.split_first()?;
        if let Some(found) = local.resolve_type(reference, context_namespace) {
            return Some(found);
        }
        for index in others {
            if let Some(found) = index.resolve_type(reference, context_namespace) {
                debug!(reference = %reference, scope = index.scope(), "resolved outside local scope");
                return Some(found);
            }
        }
        None
    }

    fn function(&self, name: &QualifiedName) -> Option<&FunctionDef> {
        self.indexes.iter().find_map(|i| i.function(name))
    }

    fn constant(&self, name: &QualifiedName) -> Option<&ConstantDef> {
        self.indexes.iter().find_map(|i| i.constant(name))
    }

    fn macro_def(&self, name: &QualifiedName) -> Option<&MacroDef> {
        self.indexes.iter().find_map(|i| i.macro_def(name))
    }

    fn find_short_name(&self, name: &str) -> Vec<(QualifiedName, EntityKind)> {
        self.collect(|i| i.find_short_name(name))
    }

    fn entities_in_namespace(&self, namespace: &str) -> Vec<(QualifiedName, EntityKind)> {
        self.collect(|i| i.entities_in_namespace(namespace))
    }

    fn functions_in_library(&self, library: &str) -> Vec<QualifiedName> {
        self.collect(|i| i.functions_in_library(library))
    }

    fn all_constants(&self) -> Vec<QualifiedName> {
        self.collect(|i| i.all_constants())
    }

    fn all_macros(&self) -> Vec<QualifiedName> {
        self.collect(|i| i.all_macros())
    }
}
