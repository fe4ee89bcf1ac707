/// Session error types.
use thiserror::Error;

use super::SessionPhase;
use crate::media::delete::DeletionError;
use crate::state::decision_log::LogError;

/// Errors surfaced by the session engine.
///
/// None of these are fatal: traversal errors leave state untouched, and a
/// failed deletion keeps every decision so the batch can be retried.
#[derive(Debug, Error)]
pub enum SessionError {
    /// `decide` was called with no item left to review.
    #[error("no current item to decide on")]
    NoCurrentItem,

    /// `undo` was called with no decision to take back.
    #[error("nothing to undo")]
    NothingToUndo,

    /// The operation needs a finished session.
    #[error("session is {phase}, not finished")]
    NotFinished { phase: SessionPhase },

    /// The deletion gateway failed; decisions are left untouched.
    #[error("deletion failed: {0}")]
    DeletionExecutionFailed(#[source] DeletionError),

    /// The decision log rejected an entry.
    #[error("decision log error: {0}")]
    Log(#[from] LogError),
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
