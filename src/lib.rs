//! Swipe review engine
//!
//! Reviews a photo library one calendar month at a time: each item gets a
//! keep, delete or favourite decision, progress survives restarts, and the
//! items marked for deletion are removed in one batch at the end.

pub mod config;
pub mod media;
pub mod session;
pub mod state;

pub use config::{Config, EngineConfig};
pub use media::loader::{MediaLoader, TargetSize};
pub use session::{SessionEngine, SessionError, SessionPhase, Signal};
pub use state::data::{Collection, Decision, DecisionKind, DeletionBatch, MediaId, MediaKind, MediaRef, ScopeId};
pub use state::store::PersistenceGateway;
