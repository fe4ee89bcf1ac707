/// Persistence gateway for per-scope review progress.
use std::collections::HashMap;
use std::sync::Mutex;

use super::data::{Decision, ScopeId};
use super::error::{PersistError, Result};

/// Durable key/value storage for a scope's position and pending decisions.
///
/// Every call is best-effort: callers log failures and carry on, and the
/// next resume starts from whatever was last written successfully.
pub trait PersistenceGateway: Send + Sync + 'static {
    fn save_position(&self, scope: &ScopeId, index: usize) -> Result<()>;

    /// Last saved position, `0` when nothing was saved.
    fn get_position(&self, scope: &ScopeId) -> Result<usize>;

    fn save_pending_decisions(&self, scope: &ScopeId, decisions: &[Decision]) -> Result<()>;

    /// Last saved decisions, empty when nothing was saved.
    fn get_pending_decisions(&self, scope: &ScopeId) -> Result<Vec<Decision>>;

    fn clear_pending_decisions(&self, scope: &ScopeId) -> Result<()>;
}

/// Volatile store, useful for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    positions: HashMap<ScopeId, usize>,
    pending: HashMap<ScopeId, Vec<Decision>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut MemoryInner) -> T) -> Result<T> {
        let mut inner = self.inner.lock().map_err(|_| PersistError::Poisoned)?;
        Ok(f(&mut inner))
    }
}

impl PersistenceGateway for MemoryStore {
    fn save_position(&self, scope: &ScopeId, index: usize) -> Result<()> {
        self.with(|inner| {
            inner.positions.insert(scope.clone(), index);
        })
    }

    fn get_position(&self, scope: &ScopeId) -> Result<usize> {
        self.with(|inner| inner.positions.get(scope).copied().unwrap_or(0))
    }

    fn save_pending_decisions(&self, scope: &ScopeId, decisions: &[Decision]) -> Result<()> {
        self.with(|inner| {
            inner.pending.insert(scope.clone(), decisions.to_vec());
        })
    }

    fn get_pending_decisions(&self, scope: &ScopeId) -> Result<Vec<Decision>> {
        self.with(|inner| inner.pending.get(scope).cloned().unwrap_or_default())
    }

    fn clear_pending_decisions(&self, scope: &ScopeId) -> Result<()> {
        self.with(|inner| {
            inner.pending.remove(scope);
        })
    }
}
