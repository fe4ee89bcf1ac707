/// State management module
///
/// This module handles all review state that outlives a single session:
/// - Shared data structures (data.rs)
/// - The per-scope decision log (decision_log.rs)
/// - The persistence gateway and an in-memory store (store.rs)
/// - The SQLite progress database (library.rs)
/// - Lifetime statistics and achievements (stats.rs)

pub mod data;
pub mod decision_log;
pub mod error;
pub mod library;
pub mod stats;
pub mod store;
