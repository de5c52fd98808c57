//! Registry of live execution contexts
//!
//! Host functions are invoked by the engine with nothing more than a small
//! numeric reference. The registry resolves that reference to the shared
//! state of the owning context: its callback table, interrupt flag and owning
//! thread.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};

use parking_lot::RwLock;
use scopeguard::ScopeGuard;
use tracing::debug;

use crate::callback::Callback;
use crate::error::Result;

/// Opaque numeric reference to a registered context
pub type ContextRef = u32;

/// Cross-thread state of one execution context
///
/// This is the only part of a context that is shared across threads. The
/// callback table is written when functions are defined and read on every
/// dispatch; nested dispatches only ever take read locks.
pub struct ContextState {
    id: ContextRef,
    owner: ThreadId,
    functions: RwLock<HashMap<String, Callback>>,
    interrupt: AtomicBool,
}

impl ContextState {
    fn new(id: ContextRef) -> Self {
        Self {
            id,
            owner: thread::current().id(),
            functions: RwLock::new(HashMap::new()),
            interrupt: AtomicBool::new(false),
        }
    }

    /// Reference under which the context is registered
    pub fn id(&self) -> ContextRef {
        self.id
    }

    /// Thread the context was created on
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Whether the calling thread owns the context
    pub fn is_owner_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    pub(crate) fn register_callback(&self, name: &str, callback: Callback) {
        self.functions.write().insert(name.to_string(), callback);
    }

    /// Clone a callback out of the table; the read lock is released on return
    pub(crate) fn callback(&self, name: &str) -> Option<Callback> {
        self.functions.read().get(name).cloned()
    }

    /// Number of registered host functions
    pub fn function_count(&self) -> usize {
        self.functions.read().len()
    }

    pub(crate) fn request_interrupt(&self) {
        self.interrupt.store(true, Ordering::Release);
    }

    pub(crate) fn clear_interrupt(&self) {
        self.interrupt.store(false, Ordering::Release);
    }

    /// Consume a pending interrupt request
    pub(crate) fn take_interrupt(&self) -> bool {
        self.interrupt.swap(false, Ordering::AcqRel)
    }
}

impl std::fmt::Debug for ContextState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextState")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("functions", &self.function_count())
            .finish()
    }
}

#[derive(Default)]
struct RegistryInner {
    seq: ContextRef,
    contexts: HashMap<ContextRef, Arc<ContextState>>,
}

/// Table of live contexts keyed by reference
///
/// Lookups happen on every callback dispatch and take the read lock;
/// registration and removal are rare and take the write lock.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<RegistryInner>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by [`Context::new`](crate::Context::new)
    pub fn global() -> Arc<Registry> {
        static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(Registry::new())).clone()
    }

    /// Allocate the next reference and store fresh state under it
    ///
    /// References start at 1 and are never reused by this registry.
    pub fn register(&self) -> Arc<ContextState> {
        let mut inner = self.inner.write();
        inner.seq += 1;
        let state = Arc::new(ContextState::new(inner.seq));
        inner.contexts.insert(state.id, state.clone());
        state
    }

    /// Register fresh state, then run `init` with it
    ///
    /// If `init` fails the registration is rolled back, so a failed
    /// construction never leaves an entry behind.
    pub(crate) fn register_with<T>(
        &self,
        init: impl FnOnce(Arc<ContextState>) -> Result<T>,
    ) -> Result<T> {
        let state = self.register();
        let id = state.id();
        let guard = scopeguard::guard(id, |id| {
            self.remove(id);
            debug!(context_ref = id, "registration rolled back");
        });
        let value = init(state)?;
        ScopeGuard::into_inner(guard);
        Ok(value)
    }

    /// Resolve a reference; `None` once the context has been removed
    pub fn lookup(&self, id: ContextRef) -> Option<Arc<ContextState>> {
        self.inner.read().contexts.get(&id).cloned()
    }

    /// Remove a reference; returns whether it was present
    pub fn remove(&self, id: ContextRef) -> bool {
        self.inner.write().contexts.remove(&id).is_some()
    }

    /// Number of live contexts
    pub fn len(&self) -> usize {
        self.inner.read().contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Registry")
            .field("seq", &inner.seq)
            .field("live", &inner.contexts.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_lookup_remove() {
        let registry = Registry::new();
        let state = registry.register();
        assert_eq!(state.id(), 1);
        assert!(state.is_owner_thread());

        let found = registry.lookup(state.id()).unwrap();
        assert!(Arc::ptr_eq(&found, &state));

        assert!(registry.remove(state.id()));
        assert!(registry.lookup(state.id()).is_none());
        assert!(!registry.remove(state.id()));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_references_are_not_reused() {
        let registry = Registry::new();
        let first = registry.register().id();
        registry.remove(first);
        let second = registry.register().id();
        assert!(second > first);
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(Registry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || {
                    (0..100)
                        .map(|_| registry.register().id())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids: Vec<ContextRef> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.sort_unstable();
        ids.dedup();

        assert_eq!(ids.len(), 800);
        assert_eq!(registry.len(), 800);
    }

    #[test]
    fn test_register_with_rolls_back_on_failure() {
        let registry = Registry::new();
        let result: Result<()> = registry.register_with(|state| {
            assert!(registry.lookup(state.id()).is_some());
            Err(crate::Error::binding("new context"))
        });
        assert_eq!(result.unwrap_err().to_string(), "new context");
        assert!(registry.is_empty());

        let id = registry.register_with(|state| Ok(state.id())).unwrap();
        assert!(registry.lookup(id).is_some());
    }

    #[test]
    fn test_interrupt_flag() {
        let registry = Registry::new();
        let state = registry.register();
        assert!(!state.take_interrupt());
        state.request_interrupt();
        assert!(state.take_interrupt());
        assert!(!state.take_interrupt());
        state.request_interrupt();
        state.clear_interrupt();
        assert!(!state.take_interrupt());
    }
}
