//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database. The orchestrator, the
//! covenant monitor, and the review workflow call store methods — they
//! never execute SQL directly. Matching engines and rules never touch
//! the store at all.

mod alerts;
mod matching;
mod records;
mod rules;

use rusqlite::Connection;

use crate::error::ReconResult;

pub struct ReconStore {
    conn: Connection,
}

impl ReconStore {
    pub fn open(path: &str) -> ReconResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (:memory: ignores it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> ReconResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> ReconResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_reconciliation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_alerts.sql"))?;
        Ok(())
    }

    /// Begin a transaction spanning subsequent store calls on this
    /// connection. Drop without commit rolls back, which is what makes
    /// session persistence all-or-nothing.
    pub fn begin(&self) -> ReconResult<rusqlite::Transaction<'_>> {
        Ok(self.conn.unchecked_transaction()?)
    }
}

/// RFC 3339 UTC timestamp used for every persisted `*_at` column.
pub(crate) fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub use alerts::{CommitteeAlertRow, CovenantInputs, WorkflowLockRow};
pub use matching::{MatchRow, SessionRow};
pub use records::RecordAuditRow;
pub use rules::{DiscrepancyRow, ReconResultRow};
