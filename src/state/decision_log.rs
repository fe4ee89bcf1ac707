/// Append-only decision log with a single undo step
use thiserror::Error;
use tracing::debug;

use super::data::{Collection, Decision, DecisionKind};

/// Errors raised by the decision log
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogError {
    /// Decisions must be contiguous by traversal index.
    #[error("decision for index {got} does not follow a log of length {expected}")]
    OutOfOrder { expected: usize, got: usize },
}

/// One decision per visited index, in traversal order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecisionLog {
    decisions: Vec<Decision>,
}

impl DecisionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a log from persisted decisions.
    ///
    /// The first entry that is out of order, out of range, or whose media
    /// no longer sits at its recorded index in `collection` ends the log.
    pub fn restore(persisted: Vec<Decision>, collection: &Collection) -> Self {
        let total = persisted.len();
        let mut log = Self::new();

        for decision in persisted {
            let live = collection.get(decision.index).map(|item| &item.id);
            if decision.index != log.len() || live != Some(&decision.media_id) {
                debug!(
                    scope = %collection.scope(),
                    index = decision.index,
                    media_id = %decision.media_id,
                    "dropping stale decision and everything after it"
                );
                break;
            }
            log.decisions.push(decision);
        }

        if log.len() < total {
            debug!(
                scope = %collection.scope(),
                kept = log.len(),
                dropped = total - log.len(),
                "restored decision log truncated"
            );
        }

        log
    }

    /// Append the decision for the next index
    pub fn append(&mut self, decision: Decision) -> Result<(), LogError> {
        if decision.index != self.decisions.len() {
            return Err(LogError::OutOfOrder {
                expected: self.decisions.len(),
                got: decision.index,
            });
        }
        self.decisions.push(decision);
        Ok(())
    }

    /// Remove and return the most recent decision
    pub fn undo_last(&mut self) -> Option<Decision> {
        self.decisions.pop()
    }

    pub fn count_by_kind(&self, kind: DecisionKind) -> usize {
        self.decisions.iter().filter(|d| d.kind == kind).count()
    }

    /// Kept plus favourited
    pub fn kept_count(&self) -> usize {
        self.decisions.iter().filter(|d| d.kind.counts_as_kept()).count()
    }

    pub fn all(&self) -> &[Decision] {
        &self.decisions
    }

    pub fn last(&self) -> Option<&Decision> {
        self.decisions.last()
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    pub fn truncate(&mut self, len: usize) {
        self.decisions.truncate(len);
    }

    pub fn clear(&mut self) {
        self.decisions.clear();
    }
}
