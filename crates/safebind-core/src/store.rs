//! Memoized, transactional generation store.
//!
//! Every generated declaration is keyed by an [`EntityId`]. The first
//! [`request`] for an id runs its synthesizer; later requests are no-ops.
//! Requests made while an id is still being synthesized see it as in flight,
//! which is how self-referencing structs and interfaces terminate.
//!
//! Synthesized declarations stay pending until the outermost
//! [`transaction`] completes. If anything inside it fails, every pending and
//! in-flight entry of that transaction is discarded and the store is left as
//! it was before the transaction began.

use std::collections::{HashMap, HashSet};
use std::fmt;

use safebind_meta::QualifiedName;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decl::Declaration;
use crate::error::Result;

/// Stable identity of a generated entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityId {
    Type(QualifiedName),
    Method(QualifiedName),
    Constant(QualifiedName),
    Macro(QualifiedName),
    /// Owning wrapper, one per release function.
    HandleWrapper(QualifiedName),
    /// Inline array helper, one per element shape and length.
    InlineArray { element: String, length: u32 },
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type(n) => write!(f, "type {n}"),
            Self::Method(n) => write!(f, "method {n}"),
            Self::Constant(n) => write!(f, "constant {n}"),
            Self::Macro(n) => write!(f, "macro {n}"),
            Self::HandleWrapper(n) => write!(f, "handle wrapper for {n}"),
            Self::InlineArray { element, length } => write!(f, "inline array {element}[{length}]"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Being synthesized.
    InFlight,
    /// Synthesized; waiting for its transaction to commit.
    Pending,
    Committed,
}

/// What a [`request`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The synthesizer ran and produced the declaration.
    Generated,
    /// The declaration already existed.
    Existing,
    /// The entity is being synthesized further up the call stack.
    InFlight,
}

#[derive(Debug, Clone, Default)]
pub struct GenerationStore {
    committed: HashMap<EntityId, Declaration>,
    commit_order: Vec<EntityId>,
    in_flight: HashSet<EntityId>,
    pending: HashMap<EntityId, Declaration>,
    pending_order: Vec<EntityId>,
    depth: usize,
    synthesis_counts: HashMap<EntityId, usize>,
}

impl GenerationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, id: &EntityId) -> Option<EntryState> {
        if self.committed.contains_key(id) {
            Some(EntryState::Committed)
        } else if self.pending.contains_key(id) {
            Some(EntryState::Pending)
        } else if self.in_flight.contains(id) {
            Some(EntryState::InFlight)
        } else {
            None
        }
    }

    /// A committed or pending declaration.
    pub fn get(&self, id: &EntityId) -> Option<&Declaration> {
        self.committed.get(id).or_else(|| self.pending.get(id))
    }

    /// Committed declarations in commit order.
    pub fn committed(&self) -> impl Iterator<Item = (&EntityId, &Declaration)> {
        self.commit_order
            .iter()
            .filter_map(|id| self.committed.get(id).map(|d| (id, d)))
    }

    pub fn len(&self) -> usize {
        self.committed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }

    /// How many times the synthesizer for `id` has run.
    pub fn synthesis_count(&self, id: &EntityId) -> usize {
        self.synthesis_counts.get(id).copied().unwrap_or(0)
    }

    pub fn in_transaction(&self) -> bool {
        self.depth > 0
    }

    /// Open a transaction. Nested transactions join the outermost one.
    pub fn begin(&mut self) {
        self.depth += 1;
    }

    /// Close a transaction; closing the outermost one commits its entries.
    pub fn commit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        if self.depth > 0 {
            return;
        }
        for id in self.pending_order.drain(..) {
            if let Some(declaration) = self.pending.remove(&id) {
                self.committed.insert(id.clone(), declaration);
                self.commit_order.push(id);
            }
        }
        self.in_flight.clear();
    }

    /// Abort a transaction, discarding every uncommitted entry.
    pub fn rollback(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        let discarded = self.pending.len() + self.in_flight.len();
        if discarded > 0 {
            debug!(discarded, "rolled back generation transaction");
        }
        self.pending.clear();
        self.pending_order.clear();
        self.in_flight.clear();
    }

    fn start(&mut self, id: EntityId) {
        *self.synthesis_counts.entry(id.clone()).or_insert(0) += 1;
        self.in_flight.insert(id);
    }

    fn finish(&mut self, id: EntityId, declaration: Declaration) {
        self.in_flight.remove(&id);
        self.pending_order.push(id.clone());
        self.pending.insert(id, declaration);
    }

    fn abandon(&mut self, id: &EntityId) {
        self.in_flight.remove(id);
    }
}

/// Anything that owns a generation store and can synthesize into it.
pub trait StoreContext {
    fn store(&self) -> &GenerationStore;
    fn store_mut(&mut self) -> &mut GenerationStore;
}

/// Request the declaration for `id`, running `synthesize` at most once.
///
/// Outside a transaction the request runs in its own.
pub fn request<C, F>(ctx: &mut C, id: EntityId, synthesize: F) -> Result<RequestOutcome>
where
    C: StoreContext + ?Sized,
    F: FnOnce(&mut C) -> Result<Declaration>,
{
    match ctx.store().state(&id) {
        Some(EntryState::InFlight) => return Ok(RequestOutcome::InFlight),
        Some(EntryState::Pending | EntryState::Committed) => return Ok(RequestOutcome::Existing),
        None => {}
    }
    if !ctx.store().in_transaction() {
        return transaction(ctx, |ctx| request(ctx, id, synthesize));
    }

    ctx.store_mut().start(id.clone());
    match synthesize(ctx) {
        Ok(declaration) => {
            ctx.store_mut().finish(id, declaration);
            Ok(RequestOutcome::Generated)
        }
        Err(e) => {
            ctx.store_mut().abandon(&id);
            Err(e)
        }
    }
}

/// Run `body` as one transaction: commit on success, roll back on any error.
pub fn transaction<C, T, F>(ctx: &mut C, body: F) -> Result<T>
where
    C: StoreContext + ?Sized,
    F: FnOnce(&mut C) -> Result<T>,
{
    ctx.store_mut().begin();
    match body(ctx) {
        Ok(value) => {
            ctx.store_mut().commit();
            Ok(value)
        }
        Err(e) => {
            ctx.store_mut().rollback();
            Err(e)
        }
    }
}
