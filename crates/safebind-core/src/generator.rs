//! Top-level generation operations.
//!
//! A [`Generator`] owns one [`GenerationStore`] and answers name-based
//! requests against a metadata query. Single requests run as one
//! transaction each; bulk requests run one transaction per item and skip
//! items that do not exist for the target architecture.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use safebind_meta::{arch, Architecture, EntityKind, MetadataQuery, QualifiedName};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::decl::{Declaration, Item, Visibility};
use crate::docs::DocumentationProvider;
use crate::error::{GenerationError, Result};
use crate::friendly::WrapperSource;
use crate::managed::ManagedAnalysis;
use crate::mapping::TypeExpr;
use crate::options::GeneratorOptions;
use crate::raii;
use crate::store::{self, EntityId, GenerationStore, StoreContext};

/// Namespace holding generated inline-array helper types.
pub const INLINE_ARRAY_NAMESPACE: &str = "InlineArrays";

/// Cooperative cancellation for bulk generation, checked between items.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a bulk generation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkReport {
    pub generated: Vec<QualifiedName>,
    /// Items that do not exist for the target architecture.
    pub skipped: Vec<QualifiedName>,
}

/// Everything generated so far, in commit order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bindings {
    pub declarations: Vec<Declaration>,
    /// SHA-256 of the serialized declarations.
    pub fingerprint: String,
}

pub struct Generator<'q> {
    pub(crate) query: &'q dyn MetadataQuery,
    pub(crate) options: GeneratorOptions,
    pub(crate) store: GenerationStore,
    pub(crate) managed: ManagedAnalysis,
    docs: Option<&'q dyn DocumentationProvider>,
    cancel: CancellationToken,
}

impl StoreContext for Generator<'_> {
    fn store(&self) -> &GenerationStore {
        &self.store
    }

    fn store_mut(&mut self) -> &mut GenerationStore {
        &mut self.store
    }
}

impl<'q> Generator<'q> {
    pub fn new(query: &'q dyn MetadataQuery, options: GeneratorOptions) -> Self {
        let managed = ManagedAnalysis::new(options.allow_marshaling);
        Self {
            query,
            options,
            store: GenerationStore::new(),
            managed,
            docs: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_documentation(mut self, docs: &'q dyn DocumentationProvider) -> Self {
        self.docs = Some(docs);
        self
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    pub fn store(&self) -> &GenerationStore {
        &self.store
    }

    /// A handle that cancels bulk generation from elsewhere.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Resolve a user-supplied name to one entity.
    ///
    /// Interpretations are tried in order: the name as given (qualified or
    /// short), then with a `W` suffix, then with an `A` suffix unless
    /// `wide-char-only` is set. The first interpretation with any match
    /// wins; more than one match is an error listing the candidates.
    pub fn lookup(&self, text: &str) -> Result<(QualifiedName, EntityKind)> {
        let mut interpretations = vec![text.to_string(), format!("{text}W")];
        if !self.options.wide_char_only {
            interpretations.push(format!("{text}A"));
        }
        for candidate in interpretations {
            let found = self.matches(&candidate);
            match found.as_slice() {
                [] => continue,
                [single] => return Ok(single.clone()),
                _ => {
                    return Err(GenerationError::Ambiguous {
                        name: candidate,
                        candidates: found.iter().map(|(qn, _)| qn.to_string()).collect(),
                    })
                }
            }
        }
        Err(GenerationError::NotFound {
            name: text.to_string(),
        })
    }

    fn matches(&self, text: &str) -> Vec<(QualifiedName, EntityKind)> {
        match QualifiedName::parse(text) {
            Some(qn) => self
                .query
                .find_short_name(&qn.name)
                .into_iter()
                .filter(|(found, _)| *found == qn)
                .collect(),
            None => self.query.find_short_name(text),
        }
    }

    /// Generate the entity named by `text`, or every entity of a namespace
    /// for `Ns.*`. Returns the canonical names generated.
    pub fn try_generate(&mut self, text: &str) -> Result<Vec<QualifiedName>> {
        let text = text.trim();
        if let Some(namespace) = text.strip_suffix(".*") {
            let entities = self.query.entities_in_namespace(namespace);
            if entities.is_empty() {
                return Err(GenerationError::NotFound {
                    name: text.to_string(),
                });
            }
            let report = self.bulk(namespace, entities)?;
            return Ok(report.generated);
        }

        let (name, kind) = self.lookup(text)?;
        self.generate_entity(&name, kind)?;
        info!(requested = text, generated = %name, %kind, "generated");
        Ok(vec![name])
    }

    fn generate_entity(&mut self, name: &QualifiedName, kind: EntityKind) -> Result<()> {
        match kind {
            EntityKind::Function => self.generate_api(name),
            EntityKind::Constant => self.generate_constant(name),
            EntityKind::Macro => self.generate_macro(name),
            _ => self.generate_type(name),
        }
    }

    pub fn generate_api(&mut self, name: &QualifiedName) -> Result<()> {
        store::transaction(self, |g| g.request_method(name))
    }

    pub fn generate_type(&mut self, name: &QualifiedName) -> Result<()> {
        store::transaction(self, |g| g.request_type(name))
    }

    pub fn generate_constant(&mut self, name: &QualifiedName) -> Result<()> {
        store::transaction(self, |g| g.request_constant(name))
    }

    pub fn generate_macro(&mut self, name: &QualifiedName) -> Result<()> {
        store::transaction(self, |g| g.request_macro(name))
    }

    /// Every function exported by `library`.
    pub fn generate_all_for_module(&mut self, library: &str) -> Result<BulkReport> {
        let items = self
            .query
            .functions_in_library(library)
            .into_iter()
            .map(|qn| (qn, EntityKind::Function))
            .collect();
        self.bulk(library, items)
    }

    pub fn generate_all_in_namespace(&mut self, namespace: &str) -> Result<BulkReport> {
        let items = self.query.entities_in_namespace(namespace);
        self.bulk(namespace, items)
    }

    pub fn generate_all_constants(&mut self) -> Result<BulkReport> {
        let items = self
            .query
            .all_constants()
            .into_iter()
            .map(|qn| (qn, EntityKind::Constant))
            .collect();
        self.bulk("constants", items)
    }

    pub fn generate_all_macros(&mut self) -> Result<BulkReport> {
        let items = self
            .query
            .all_macros()
            .into_iter()
            .map(|qn| (qn, EntityKind::Macro))
            .collect();
        self.bulk("macros", items)
    }

    fn bulk(&mut self, what: &str, items: Vec<(QualifiedName, EntityKind)>) -> Result<BulkReport> {
        let mut report = BulkReport::default();
        for (name, kind) in items {
            if self.cancel.is_cancelled() {
                return Err(GenerationError::Cancelled);
            }
            match self.generate_entity(&name, kind) {
                Ok(()) => report.generated.push(name),
                Err(e) if e.is_platform_incompatible() => {
                    warn!(entity = %name, error = %e, "skipping");
                    report.skipped.push(name);
                }
                Err(e) => return Err(e),
            }
        }
        info!(
            what,
            generated = report.generated.len(),
            skipped = report.skipped.len(),
            "bulk generation finished"
        );
        Ok(report)
    }

    /// The committed declaration for an entity of the given kind.
    pub fn declaration(&self, name: &QualifiedName, kind: EntityKind) -> Option<&Declaration> {
        let id = match kind {
            EntityKind::Function => EntityId::Method(name.clone()),
            EntityKind::Constant => EntityId::Constant(name.clone()),
            EntityKind::Macro => EntityId::Macro(name.clone()),
            _ => EntityId::Type(name.clone()),
        };
        self.store.get(&id)
    }

    pub fn bindings(&self) -> Result<Bindings> {
        let declarations: Vec<Declaration> =
            self.store.committed().map(|(_, d)| d.clone()).collect();
        let bytes = serde_json::to_vec(&declarations)
            .map_err(|e| GenerationError::failed("bindings", e.to_string()))?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(Bindings {
            declarations,
            fingerprint: format!("{:x}", hasher.finalize()),
        })
    }

    pub(crate) fn check_platform(
        &self,
        name: &QualifiedName,
        architectures: &[Architecture],
    ) -> Result<()> {
        if arch::is_compatible(architectures, self.options.architecture) {
            return Ok(());
        }
        Err(GenerationError::PlatformIncompatible {
            entity: name.to_string(),
            architecture: self.options.architecture_name(),
        })
    }

    pub(crate) fn visibility(&self) -> Visibility {
        if self.options.public {
            Visibility::Public
        } else {
            Visibility::Internal
        }
    }

    pub(crate) fn declaration_of(&self, name: QualifiedName, item: Item) -> Declaration {
        let docs = self
            .docs
            .and_then(|d| d.describe(&name))
            .map(str::to_string);
        Declaration {
            name,
            visibility: self.visibility(),
            docs,
            item,
        }
    }

    pub(crate) fn request_type(&mut self, name: &QualifiedName) -> Result<()> {
        let query = self.query;
        let resolved = query
            .type_by_name(name)
            .ok_or_else(|| GenerationError::UnresolvedReference {
                reference: name.to_string(),
            })?;
        self.check_platform(name, resolved.entity.architectures())?;
        let outcome = store::request(self, EntityId::Type(name.clone()), |g| g.emit_type(name))?;
        debug!(entity = %name, ?outcome, "requested type");
        Ok(())
    }

    pub(crate) fn request_method(&mut self, name: &QualifiedName) -> Result<()> {
        let query = self.query;
        let function = query
            .function(name)
            .ok_or_else(|| GenerationError::NotFound {
                name: name.to_string(),
            })?;
        self.check_platform(name, &function.architectures)?;
        let outcome = store::request(self, EntityId::Method(name.clone()), |g| {
            g.emit_function(name, function)
        })?;
        debug!(entity = %name, ?outcome, "requested method");
        Ok(())
    }

    pub(crate) fn request_constant(&mut self, name: &QualifiedName) -> Result<()> {
        let query = self.query;
        let constant = query
            .constant(name)
            .ok_or_else(|| GenerationError::NotFound {
                name: name.to_string(),
            })?;
        self.check_platform(name, &constant.architectures)?;
        let outcome = store::request(self, EntityId::Constant(name.clone()), |g| {
            g.emit_constant(name, constant)
        })?;
        debug!(entity = %name, ?outcome, "requested constant");
        Ok(())
    }

    pub(crate) fn request_macro(&mut self, name: &QualifiedName) -> Result<()> {
        let query = self.query;
        let def = query
            .macro_def(name)
            .ok_or_else(|| GenerationError::NotFound {
                name: name.to_string(),
            })?;
        self.check_platform(name, &def.architectures)?;
        let outcome =
            store::request(self, EntityId::Macro(name.clone()), |g| g.emit_macro(name, def))?;
        debug!(entity = %name, ?outcome, "requested macro");
        Ok(())
    }

    /// Request every declaration a mapped type refers to.
    pub(crate) fn require_expr(&mut self, ty: &TypeExpr) -> Result<()> {
        match ty {
            TypeExpr::Named { name, .. } | TypeExpr::Interface(name) => {
                if name.namespace == INLINE_ARRAY_NAMESPACE {
                    return Ok(());
                }
                self.request_type(name)
            }
            TypeExpr::Pointer { pointee: inner, .. }
            | TypeExpr::Array(inner)
            | TypeExpr::FixedArray { element: inner, .. }
            | TypeExpr::Slice { element: inner, .. }
            | TypeExpr::Nullable(inner) => self.require_expr(inner),
            TypeExpr::FunctionPointer { params, ret } => {
                for param in params {
                    self.require_expr(param)?;
                }
                self.require_expr(ret)
            }
            TypeExpr::Primitive(_)
            | TypeExpr::NativeInt { .. }
            | TypeExpr::String
            | TypeExpr::SafeHandle(_)
            | TypeExpr::AnySafeHandle => Ok(()),
        }
    }
}

impl WrapperSource for Generator<'_> {
    fn handle_wrapper(&mut self, release: &QualifiedName) -> Result<Option<QualifiedName>> {
        if !raii::can_wrap(self.query, release) {
            return Ok(None);
        }
        let name = raii::wrapper_name(release);
        store::request(self, EntityId::HandleWrapper(release.clone()), |g| {
            let spec = raii::synthesize_wrapper(g.query, &mut g.managed, &g.options, release)?
                .ok_or_else(|| GenerationError::failed(release, "release function cannot back a wrapper"))?;
            // The wrapper calls the release function, so its extern must exist.
            g.request_method(release)?;
            if let Some(handle) = &spec.handle_type {
                g.request_type(handle)?;
            }
            Ok(g.declaration_of(name.clone(), Item::HandleWrapper(spec)))
        })?;
        Ok(Some(name))
    }
}
