/// Background writer for session persistence.
///
/// Writes are queued and applied in order by a single task, so the last
/// write for a key always wins. Callers never wait on storage.
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task;
use tracing::{debug, warn};

use crate::state::data::{Decision, ScopeId};
use crate::state::store::PersistenceGateway;

enum WriteOp {
    Position(ScopeId, usize),
    Pending(ScopeId, Vec<Decision>),
    ClearPending(ScopeId),
    Flush(oneshot::Sender<()>),
}

impl WriteOp {
    fn name(&self) -> &'static str {
        match self {
            WriteOp::Position(..) => "save_position",
            WriteOp::Pending(..) => "save_pending_decisions",
            WriteOp::ClearPending(..) => "clear_pending_decisions",
            WriteOp::Flush(..) => "flush",
        }
    }
}

/// Fire-and-forget handle onto the writer task
#[derive(Debug, Clone)]
pub struct PersistWriter {
    tx: mpsc::UnboundedSender<WriteOp>,
}

impl std::fmt::Debug for WriteOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl PersistWriter {
    /// Start the writer task. Must be called inside a tokio runtime.
    pub fn spawn<P: PersistenceGateway>(gateway: Arc<P>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<WriteOp>();

        tokio::spawn(async move {
            while let Some(op) = rx.recv().await {
                if let WriteOp::Flush(done) = op {
                    let _ = done.send(());
                    continue;
                }

                let gateway = Arc::clone(&gateway);
                let name = op.name();
                match task::spawn_blocking(move || apply(gateway.as_ref(), op)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(op = name, error = %e, "persistence write failed"),
                    Err(e) => warn!(op = name, error = %e, "persistence task failed"),
                }
            }
            debug!("persistence writer stopped");
        });

        Self { tx }
    }

    pub fn save_position(&self, scope: &ScopeId, index: usize) {
        self.send(WriteOp::Position(scope.clone(), index));
    }

    pub fn save_pending(&self, scope: &ScopeId, decisions: &[Decision]) {
        self.send(WriteOp::Pending(scope.clone(), decisions.to_vec()));
    }

    pub fn clear_pending(&self, scope: &ScopeId) {
        self.send(WriteOp::ClearPending(scope.clone()));
    }

    /// Wait until every write queued before this call has been applied
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        self.send(WriteOp::Flush(done));
        let _ = wait.await;
    }

    fn send(&self, op: WriteOp) {
        if let Err(e) = self.tx.send(op) {
            warn!(op = e.0.name(), "persistence writer is gone, dropping write");
        }
    }
}

fn apply<P: PersistenceGateway>(gateway: &P, op: WriteOp) -> crate::state::error::Result<()> {
    match op {
        WriteOp::Position(scope, index) => gateway.save_position(&scope, index),
        WriteOp::Pending(scope, decisions) => gateway.save_pending_decisions(&scope, &decisions),
        WriteOp::ClearPending(scope) => gateway.clear_pending_decisions(&scope),
        WriteOp::Flush(done) => {
            let _ = done.send(());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::{DecisionKind, MediaId};
    use crate::state::error::{PersistError, Result};
    use crate::state::store::MemoryStore;
    use std::sync::Mutex;

    /// Fails every write and counts the attempts.
    #[derive(Default)]
    struct BrokenStore {
        attempts: Mutex<usize>,
    }

    impl BrokenStore {
        fn fail(&self) -> Result<()> {
            *self.attempts.lock().unwrap() += 1;
            Err(PersistError::Poisoned)
        }
    }

    impl PersistenceGateway for BrokenStore {
        fn save_position(&self, _scope: &ScopeId, _index: usize) -> Result<()> {
            self.fail()
        }

        fn get_position(&self, _scope: &ScopeId) -> Result<usize> {
            Ok(0)
        }

        fn save_pending_decisions(&self, _scope: &ScopeId, _decisions: &[Decision]) -> Result<()> {
            self.fail()
        }

        fn get_pending_decisions(&self, _scope: &ScopeId) -> Result<Vec<Decision>> {
            Ok(Vec::new())
        }

        fn clear_pending_decisions(&self, _scope: &ScopeId) -> Result<()> {
            self.fail()
        }
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let store = Arc::new(MemoryStore::new());
        let writer = PersistWriter::spawn(Arc::clone(&store));
        let scope = ScopeId::new("2023-7");

        for i in 0..=20 {
            writer.save_position(&scope, i);
        }
        writer.save_position(&scope, 4);
        writer.flush().await;

        assert_eq!(store.get_position(&scope).unwrap(), 4);
    }

    #[tokio::test]
    async fn test_pending_then_clear() {
        let store = Arc::new(MemoryStore::new());
        let writer = PersistWriter::spawn(Arc::clone(&store));
        let scope = ScopeId::new("2023-7");
        let decisions = vec![Decision::new(0, MediaId::new("a"), DecisionKind::Kept)];

        writer.save_pending(&scope, &decisions);
        writer.flush().await;
        assert_eq!(store.get_pending_decisions(&scope).unwrap(), decisions);

        writer.clear_pending(&scope);
        writer.flush().await;
        assert!(store.get_pending_decisions(&scope).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_writer() {
        let store = Arc::new(BrokenStore::default());
        let writer = PersistWriter::spawn(Arc::clone(&store));
        let scope = ScopeId::new("2023-7");

        writer.save_position(&scope, 1);
        writer.save_pending(&scope, &[]);
        writer.clear_pending(&scope);
        writer.flush().await;

        assert_eq!(*store.attempts.lock().unwrap(), 3);
    }
}
