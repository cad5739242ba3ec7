//! "Requires marshaling" analysis for structs.
//!
//! A struct needs a managed (non-blittable) representation when any field
//! holds a marshaled interface or delegate, directly, through an inline
//! array, or through a pointer to another such struct. Pointers make the
//! struct graph cyclic, so the walk keeps an explicit visited set: re-entering
//! a struct that is still being visited yields `Unknown`, and the dependency
//! is recorded. After the walk, correction passes settle each `Unknown`
//! node from the nodes it waited on, repeating until no answer changes.

use std::collections::{HashMap, HashSet};

use safebind_meta::model::Layout;
use safebind_meta::{MetadataQuery, QualifiedName, TypeDescriptor, TypeEntity};

/// Typedef chains longer than this are treated as blittable.
const MAX_ALIAS_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tri {
    Yes,
    No,
    Unknown,
}

impl From<bool> for Tri {
    fn from(value: bool) -> Self {
        if value {
            Tri::Yes
        } else {
            Tri::No
        }
    }
}

#[derive(Default)]
struct Walk {
    visiting: HashSet<QualifiedName>,
    results: HashMap<QualifiedName, Tri>,
    /// `waiting_on[a]` holds the structs whose answer `a` is waiting for.
    waiting_on: HashMap<QualifiedName, HashSet<QualifiedName>>,
}

impl Walk {
    /// Propagate `Yes` backwards along recorded dependencies until nothing
    /// changes. Whatever is still `Unknown` only reaches blittable structs.
    fn settle(mut self) -> HashMap<QualifiedName, Tri> {
        loop {
            let resolved: Vec<QualifiedName> = self
                .results
                .iter()
                .filter(|(_, tri)| **tri == Tri::Unknown)
                .filter(|(node, _)| {
                    self.waiting_on.get(*node).is_some_and(|deps| {
                        deps.iter().any(|d| self.results.get(d) == Some(&Tri::Yes))
                    })
                })
                .map(|(node, _)| node.clone())
                .collect();
            if resolved.is_empty() {
                break;
            }
            for node in resolved {
                self.results.insert(node, Tri::Yes);
            }
        }
        self.results
    }
}

/// Cached per-struct marshaling analysis.
#[derive(Debug, Clone)]
pub struct ManagedAnalysis {
    allow_marshaling: bool,
    cache: HashMap<QualifiedName, bool>,
}

impl ManagedAnalysis {
    /// With marshaling disallowed, no struct is ever managed.
    pub fn new(allow_marshaling: bool) -> Self {
        Self {
            allow_marshaling,
            cache: HashMap::new(),
        }
    }

    /// Whether the named struct requires a managed representation.
    pub fn is_managed(&mut self, query: &dyn MetadataQuery, name: &QualifiedName) -> bool {
        if !self.allow_marshaling {
            return false;
        }
        if let Some(&cached) = self.cache.get(name) {
            return cached;
        }

        let mut walk = Walk::default();
        self.visit_struct(query, name, &mut walk);

        let settled = walk.settle();
        for (node, tri) in settled {
            self.cache.entry(node).or_insert(tri == Tri::Yes);
        }

        self.cache.get(name).copied().unwrap_or(false)
    }

    /// Whether a descriptor (as a field or pointee) makes its owner managed.
    pub fn descriptor_is_managed(
        &mut self,
        query: &dyn MetadataQuery,
        descriptor: &TypeDescriptor,
        namespace: &str,
    ) -> bool {
        if !self.allow_marshaling {
            return false;
        }
        let mut walk = Walk::default();
        let (tri, dep) = self.visit_descriptor(query, descriptor, namespace, &mut walk, 0);
        match tri {
            Tri::Yes => true,
            Tri::No => false,
            Tri::Unknown => dep.is_some_and(|d| self.is_managed(query, &d)),
        }
    }

    fn visit_struct(
        &self,
        query: &dyn MetadataQuery,
        name: &QualifiedName,
        walk: &mut Walk,
    ) -> Tri {
        if let Some(&cached) = self.cache.get(name) {
            return cached.into();
        }
        if let Some(&done) = walk.results.get(name) {
            return done;
        }
        if walk.visiting.contains(name) {
            return Tri::Unknown;
        }
        let Some(TypeEntity::Struct(def)) = query.type_by_name(name).map(|r| r.entity) else {
            return Tri::No;
        };
        if def.layout == Layout::Explicit {
            walk.results.insert(name.clone(), Tri::No);
            return Tri::No;
        }

        walk.visiting.insert(name.clone());
        let mut outcome = Tri::No;
        for field in &def.fields {
            let (tri, dep) = self.visit_descriptor(query, &field.ty, &name.namespace, walk, 0);
            match tri {
                Tri::Yes => {
                    outcome = Tri::Yes;
                    break;
                }
                Tri::Unknown => {
                    outcome = Tri::Unknown;
                    if let Some(dep) = dep {
                        walk.waiting_on
                            .entry(name.clone())
                            .or_default()
                            .insert(dep);
                    }
                }
                Tri::No => {}
            }
        }
        walk.visiting.remove(name);
        walk.results.insert(name.clone(), outcome);
        outcome
    }

    fn visit_descriptor(
        &self,
        query: &dyn MetadataQuery,
        descriptor: &TypeDescriptor,
        namespace: &str,
        walk: &mut Walk,
        depth: usize,
    ) -> (Tri, Option<QualifiedName>) {
        if depth > MAX_ALIAS_DEPTH {
            return (Tri::No, None);
        }
        match descriptor {
            TypeDescriptor::Primitive(_) | TypeDescriptor::FunctionPointer { .. } => {
                (Tri::No, None)
            }
            TypeDescriptor::Array { element, .. } => {
                self.visit_descriptor(query, element, namespace, walk, depth + 1)
            }
            TypeDescriptor::Pointer { element, .. } => {
                let Some(r) = element.type_ref() else {
                    return (Tri::No, None);
                };
                match query.resolve_type(r, Some(namespace)) {
                    Some(resolved) => match resolved.entity {
                        TypeEntity::Interface(_) => (Tri::Yes, None),
                        TypeEntity::Struct(def) if def.flexible_array => (Tri::No, None),
                        TypeEntity::Struct(_) => {
                            let tri = self.visit_struct(query, &resolved.name, walk);
                            (tri, Some(resolved.name))
                        }
                        _ => (Tri::No, None),
                    },
                    None => (Tri::No, None),
                }
            }
            TypeDescriptor::Handle(r) => match query.resolve_type(r, Some(namespace)) {
                Some(resolved) => match resolved.entity {
                    TypeEntity::Struct(_) => {
                        let tri = self.visit_struct(query, &resolved.name, walk);
                        (tri, Some(resolved.name))
                    }
                    TypeEntity::Interface(_) | TypeEntity::Callback(_) => (Tri::Yes, None),
                    TypeEntity::Enum(_) => (Tri::No, None),
                    TypeEntity::Typedef(t) if t.kind.char_width().is_some() => (Tri::No, None),
                    TypeEntity::Typedef(t) => self.visit_descriptor(
                        query,
                        &t.underlying,
                        &resolved.name.namespace,
                        walk,
                        depth + 1,
                    ),
                },
                None => (Tri::No, None),
            },
        }
    }
}
