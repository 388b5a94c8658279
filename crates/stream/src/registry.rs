use orbfield_common::ModulePath;
use orbfield_kernel::{Continuation, Latch, Outcome, TaskError};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::module::Export;

/// Errors from direct registry writes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("module already defined: {0}")]
    AlreadyDefined(ModulePath),
    #[error("module is being loaded: {0}")]
    InFlight(ModulePath),
}

/// Counters for registry traffic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Claims answered from the cache.
    pub hits: usize,
    /// Claims that joined a load already in flight.
    pub joins: usize,
    /// Claims that started a new load.
    pub fetches: usize,
    /// Loads that settled with an error.
    pub failures: usize,
}

#[derive(Default)]
struct RegistryState {
    modules: BTreeMap<ModulePath, Export>,
    loading: HashMap<ModulePath, Latch<Export>>,
    /// In-flight load -> the dependency it is currently waiting for.
    waiting_on: HashMap<ModulePath, ModulePath>,
    stats: RegistryStats,
}

/// Session-wide module cache.
///
/// Entries are write-once. Loads go through [`ModuleRegistry::claim`],
/// which in one step either answers from the cache, joins the load already
/// in flight for that path, or makes the caller the owner of a new load.
/// Handles are cheap clones of the same registry.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    inner: Rc<RefCell<RegistryState>>,
}

/// Result of [`ModuleRegistry::claim`].
pub enum Claim {
    Cached(Export),
    /// Another caller owns the load; this resolves when it settles.
    Joined(Continuation<Export>),
    /// The caller must fetch the module and settle the ticket.
    Owned(LoadTicket),
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&self, path: &ModulePath) -> Claim {
        let mut state = self.inner.borrow_mut();
        if let Some(export) = state.modules.get(path).cloned() {
            state.stats.hits += 1;
            return Claim::Cached(export);
        }
        if let Some(latch) = state.loading.get(path).cloned() {
            state.stats.joins += 1;
            tracing::debug!(module = %path, "joining load in flight");
            return Claim::Joined(latch.wait());
        }
        let latch = Latch::new();
        state.loading.insert(path.clone(), latch.clone());
        state.stats.fetches += 1;
        tracing::debug!(module = %path, "claimed load");
        Claim::Owned(LoadTicket {
            registry: self.clone(),
            path: path.clone(),
            latch,
            settled: false,
        })
    }

    /// Store a module without loading it.
    pub fn define(&self, path: ModulePath, export: Export) -> Result<(), RegistryError> {
        let mut state = self.inner.borrow_mut();
        if state.modules.contains_key(&path) {
            return Err(RegistryError::AlreadyDefined(path));
        }
        if state.loading.contains_key(&path) {
            return Err(RegistryError::InFlight(path));
        }
        state.modules.insert(path, export);
        Ok(())
    }

    pub fn get(&self, path: &ModulePath) -> Option<Export> {
        self.inner.borrow().modules.get(path).cloned()
    }

    pub fn contains(&self, path: &ModulePath) -> bool {
        self.inner.borrow().modules.contains_key(path)
    }

    pub fn is_loading(&self, path: &ModulePath) -> bool {
        self.inner.borrow().loading.contains_key(path)
    }

    /// Number of cached modules.
    pub fn len(&self) -> usize {
        self.inner.borrow().modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().modules.is_empty()
    }

    /// Cached paths in order.
    pub fn paths(&self) -> Vec<ModulePath> {
        self.inner.borrow().modules.keys().cloned().collect()
    }

    pub fn stats(&self) -> RegistryStats {
        self.inner.borrow().stats.clone()
    }

    /// Record that the in-flight load of `waiter` is blocked on `dependency`.
    /// Replaces any earlier edge from `waiter`; ignored if `waiter` is not
    /// loading.
    pub fn wait_on(&self, waiter: &ModulePath, dependency: &ModulePath) {
        let mut state = self.inner.borrow_mut();
        if state.loading.contains_key(waiter) {
            state
                .waiting_on
                .insert(waiter.clone(), dependency.clone());
        }
    }

    /// The loads `from` is transitively blocked on, nearest first.
    pub fn wait_chain(&self, from: &ModulePath) -> Vec<ModulePath> {
        let state = self.inner.borrow();
        let mut chain: Vec<ModulePath> = Vec::new();
        let mut current = from;
        while let Some(next) = state.waiting_on.get(current) {
            if next == from || chain.contains(next) {
                break;
            }
            chain.push(next.clone());
            current = next;
        }
        chain
    }
}

/// Ownership of one in-flight load.
///
/// Settling it caches a successful export and wakes every joined waiter.
/// A failed load is not cached, so a later claim fetches again. Dropping an
/// unsettled ticket settles it with [`TaskError::Abandoned`].
pub struct LoadTicket {
    registry: ModuleRegistry,
    path: ModulePath,
    latch: Latch<Export>,
    settled: bool,
}

impl LoadTicket {
    pub fn path(&self) -> &ModulePath {
        &self.path
    }

    pub fn complete(mut self, outcome: Outcome<Export>) {
        self.settle(outcome);
    }

    fn settle(&mut self, outcome: Outcome<Export>) {
        self.settled = true;
        {
            let mut state = self.registry.inner.borrow_mut();
            state.loading.remove(&self.path);
            state.waiting_on.remove(&self.path);
            match &outcome {
                Ok(export) => {
                    state.modules.insert(self.path.clone(), Rc::clone(export));
                    tracing::debug!(module = %self.path, "module cached");
                }
                Err(error) => {
                    state.stats.failures += 1;
                    tracing::warn!(module = %self.path, %error, "module load failed");
                }
            }
        }
        self.latch.settle(outcome);
    }
}

impl Drop for LoadTicket {
    fn drop(&mut self) {
        if !self.settled {
            let path = self.path.to_string();
            self.settle(Err(TaskError::Abandoned(path)));
        }
    }
}
