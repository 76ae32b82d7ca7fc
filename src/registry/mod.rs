//! Backend registry module.
//!
//! Provides the per-backend state record and the thread-safe server pool
//! that strategies select from.

mod backend;
mod error;

pub use backend::*;
pub use error::*;

use parking_lot::RwLock;
use std::sync::Arc;

/// The server pool stores every known backend in insertion order.
///
/// Membership is guarded by a single lock. Snapshot queries copy the
/// `Arc` handles out and release the lock before returning, so callers
/// iterating a snapshot never race with `add`/`remove`.
///
/// # Examples
///
/// ```
/// use fulcrum::registry::{Backend, ServerPool};
///
/// let pool = ServerPool::new();
/// pool.add(Backend::parse("http://127.0.0.1:9001", 1).unwrap()).unwrap();
/// assert_eq!(pool.len(), 1);
/// assert_eq!(pool.alive_backends().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct ServerPool {
    backends: RwLock<Vec<Arc<Backend>>>,
}

impl ServerPool {
    /// Create a new empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a backend to the pool.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateBackend` if a backend with the same
    /// identity is already registered.
    pub fn add(&self, backend: Backend) -> Result<Arc<Backend>, RegistryError> {
        self.add_shared(Arc::new(backend))
    }

    /// Add an already shared backend handle to the pool.
    pub fn add_shared(&self, backend: Arc<Backend>) -> Result<Arc<Backend>, RegistryError> {
        let mut backends = self.backends.write();
        if backends.iter().any(|b| b.id() == backend.id()) {
            return Err(RegistryError::DuplicateBackend(backend.id().to_string()));
        }
        backends.push(Arc::clone(&backend));
        Ok(backend)
    }

    /// Remove a backend by identity.
    ///
    /// Removing an identity that is not present is a no-op and returns `None`.
    pub fn remove(&self, id: &str) -> Option<Arc<Backend>> {
        let mut backends = self.backends.write();
        let index = backends.iter().position(|b| b.id() == id)?;
        Some(backends.remove(index))
    }

    /// Look up a backend by identity.
    pub fn get(&self, id: &str) -> Option<Arc<Backend>> {
        self.backends.read().iter().find(|b| b.id() == id).cloned()
    }

    /// Snapshot of all backends, in insertion order.
    pub fn all_backends(&self) -> Vec<Arc<Backend>> {
        self.backends.read().clone()
    }

    /// Snapshot of the backends currently marked alive, in insertion order.
    ///
    /// Computed fresh on every call. An empty vector means no backend can
    /// be selected.
    pub fn alive_backends(&self) -> Vec<Arc<Backend>> {
        self.backends
            .read()
            .iter()
            .filter(|b| b.is_alive())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.backends.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.read().is_empty()
    }
}
