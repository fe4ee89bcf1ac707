use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use super::data::{Decision, ScopeId};
use super::error::{PersistError, Result};
use super::stats::LifetimeStats;
use super::store::PersistenceGateway;
use crate::media::scan::MonthScope;

/// The Library manages the SQLite progress database.
/// It stores per-scope positions, pending decisions and lifetime statistics.
pub struct Library {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Library {
    /// Open the library at the default location.
    ///
    /// The database file is created in the user's data directory:
    /// - Linux: ~/.local/share/swipe-review/swipe_review.db
    /// - macOS: ~/Library/Application Support/swipe-review/swipe_review.db
    /// - Windows: %APPDATA%\swipe-review\swipe_review.db
    pub fn new() -> Result<Self> {
        let db_path = Self::default_db_path().ok_or(PersistError::NoDataDir)?;
        Self::open(&db_path)
    }

    /// Open or create a library at the given path
    pub fn open(db_path: &Path) -> Result<Self> {
        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PersistError::io(parent, e))?;
        }

        let conn = Connection::open(db_path)?;

        info!(path = %db_path.display(), "progress database opened");

        let library = Library {
            conn: Mutex::new(conn),
            db_path: db_path.to_path_buf(),
        };
        library.init_schema()?;

        Ok(library)
    }

    /// Open an in-memory library (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let library = Library {
            conn: Mutex::new(Connection::open_in_memory()?),
            db_path: PathBuf::from(":memory:"),
        };
        library.init_schema()?;
        Ok(library)
    }

    /// Get the path where the database should be stored
    pub fn default_db_path() -> Option<PathBuf> {
        let mut path = dirs::data_dir().or_else(dirs::home_dir)?;

        path.push("swipe-review");
        path.push("swipe_review.db");
        Some(path)
    }

    /// Initialize the database schema.
    /// Creates all necessary tables if they don't exist.
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;

        // Last position reached in each scope
        conn.execute(
            "CREATE TABLE IF NOT EXISTS scope_progress (
                scope_id        TEXT PRIMARY KEY,
                position        INTEGER NOT NULL,
                updated_at      INTEGER NOT NULL
            )",
            [],
        )?;

        // Decisions not yet executed, stored as JSON
        conn.execute(
            "CREATE TABLE IF NOT EXISTS pending_decisions (
                scope_id        TEXT PRIMARY KEY,
                decisions_json  TEXT NOT NULL,
                updated_at      INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS lifetime_stats (
                id              INTEGER PRIMARY KEY CHECK (id = 1),
                stats_json      TEXT NOT NULL
            )",
            [],
        )?;

        debug!("database schema initialized");

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| PersistError::Poisoned)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Fill in `reviewed_count` for every scope from its saved position
    pub fn load_progress(&self, scopes: &mut [MonthScope]) -> Result<()> {
        for scope in scopes.iter_mut() {
            let position = self.get_position(scope.collection.scope())?;
            scope.reviewed_count = position.min(scope.total_count());
        }
        Ok(())
    }

    /// Mark every scope strictly before `year`/`month` as complete.
    /// Returns how many scopes were updated.
    pub fn mark_scopes_completed_before(
        &self,
        scopes: &[MonthScope],
        year: i32,
        month: u32,
    ) -> Result<usize> {
        let mut marked = 0;
        for scope in scopes.iter().filter(|s| s.is_before(year, month)) {
            let id = scope.collection.scope();
            self.save_position(id, scope.total_count())?;
            self.clear_pending_decisions(id)?;
            marked += 1;
        }

        if marked > 0 {
            info!(marked, year, month, "marked earlier scopes complete");
        }

        Ok(marked)
    }

    /// Load lifetime statistics, defaulting to zero
    pub fn load_stats(&self) -> Result<LifetimeStats> {
        let json: Option<String> = self
            .conn()?
            .query_row("SELECT stats_json FROM lifetime_stats WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        match json {
            Some(json) => Ok(LifetimeStats::from_json(&json)?),
            None => Ok(LifetimeStats::default()),
        }
    }

    pub fn save_stats(&self, stats: &LifetimeStats) -> Result<()> {
        let json = stats.to_json()?;
        self.conn()?.execute(
            "INSERT INTO lifetime_stats (id, stats_json) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET stats_json = excluded.stats_json",
            params![json],
        )?;
        Ok(())
    }
}

impl PersistenceGateway for Library {
    fn save_position(&self, scope: &ScopeId, index: usize) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO scope_progress (scope_id, position, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(scope_id) DO UPDATE SET position = excluded.position, updated_at = excluded.updated_at",
            params![scope.as_str(), index as i64, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    fn get_position(&self, scope: &ScopeId) -> Result<usize> {
        let position: Option<i64> = self
            .conn()?
            .query_row(
                "SELECT position FROM scope_progress WHERE scope_id = ?1",
                params![scope.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        Ok(position.and_then(|p| usize::try_from(p).ok()).unwrap_or(0))
    }

    fn save_pending_decisions(&self, scope: &ScopeId, decisions: &[Decision]) -> Result<()> {
        let json = serde_json::to_string(decisions)?;
        self.conn()?.execute(
            "INSERT INTO pending_decisions (scope_id, decisions_json, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(scope_id) DO UPDATE SET decisions_json = excluded.decisions_json, updated_at = excluded.updated_at",
            params![scope.as_str(), json, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    fn get_pending_decisions(&self, scope: &ScopeId) -> Result<Vec<Decision>> {
        let json: Option<String> = self
            .conn()?
            .query_row(
                "SELECT decisions_json FROM pending_decisions WHERE scope_id = ?1",
                params![scope.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    fn clear_pending_decisions(&self, scope: &ScopeId) -> Result<()> {
        self.conn()?.execute(
            "DELETE FROM pending_decisions WHERE scope_id = ?1",
            params![scope.as_str()],
        )?;
        Ok(())
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("db_path", &self.db_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::{Collection, DecisionKind, MediaId, MediaKind, MediaRef};
    use chrono::NaiveDate;

    fn scope(year: i32, month: u32, n: usize) -> MonthScope {
        let items = (0..n)
            .map(|i| MediaRef::new(format!("{year}-{month}-{i}"), i, 1, MediaKind::Photo))
            .collect();
        MonthScope::new(year, month, Collection::new(format!("{year}-{month}"), items))
    }

    #[test]
    fn test_position_round_trip_and_default() {
        let library = Library::open_in_memory().unwrap();
        let id = ScopeId::new("2021-7");

        assert_eq!(library.get_position(&id).unwrap(), 0);

        library.save_position(&id, 12).unwrap();
        library.save_position(&id, 13).unwrap();
        assert_eq!(library.get_position(&id).unwrap(), 13);
    }

    #[test]
    fn test_pending_decisions_persist_and_clear() {
        let library = Library::open_in_memory().unwrap();
        let id = ScopeId::new("2021-7");
        let decisions = vec![
            Decision::new(0, MediaId::new("a"), DecisionKind::Kept),
            Decision::new(1, MediaId::new("b"), DecisionKind::Deleted),
        ];

        library.save_pending_decisions(&id, &decisions).unwrap();
        assert_eq!(library.get_pending_decisions(&id).unwrap(), decisions);

        library.clear_pending_decisions(&id).unwrap();
        assert!(library.get_pending_decisions(&id).unwrap().is_empty());
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("progress.db");
        let id = ScopeId::new("2020-2");

        {
            let library = Library::open(&path).unwrap();
            library.save_position(&id, 4).unwrap();
        }

        let library = Library::open(&path).unwrap();
        assert_eq!(library.get_position(&id).unwrap(), 4);
        assert_eq!(library.path(), &path);
    }

    #[test]
    fn test_mark_scopes_completed_before() {
        let library = Library::open_in_memory().unwrap();
        let mut scopes = vec![scope(2019, 11, 3), scope(2020, 1, 5), scope(2020, 3, 2)];
        library
            .save_pending_decisions(
                scopes[0].collection.scope(),
                &[Decision::new(0, MediaId::new("2019-11-0"), DecisionKind::Kept)],
            )
            .unwrap();

        let marked = library.mark_scopes_completed_before(&scopes, 2020, 3).unwrap();
        assert_eq!(marked, 2);

        library.load_progress(&mut scopes).unwrap();
        assert!(scopes[0].is_completed());
        assert!(scopes[1].is_completed());
        assert!(!scopes[2].is_completed());
        assert!(library
            .get_pending_decisions(scopes[0].collection.scope())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_stats_round_trip() {
        let library = Library::open_in_memory().unwrap();
        assert_eq!(library.load_stats().unwrap(), LifetimeStats::default());

        let mut stats = LifetimeStats::default();
        stats.total_reviewed = 42;
        stats.last_session_day = NaiveDate::from_ymd_opt(2024, 2, 29);
        library.save_stats(&stats).unwrap();

        assert_eq!(library.load_stats().unwrap(), stats);
    }
}
