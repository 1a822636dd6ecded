use rusqlite::params;

use super::{now_ts, ReconStore};
use crate::error::ReconResult;
use crate::rules::ReconciliationResult;

#[derive(Debug, Clone)]
pub struct ReconResultRow {
    pub session_id: String,
    pub rule_id: String,
    pub status: String,
    pub source_value: Option<f64>,
    pub target_value: Option<f64>,
    pub difference: Option<f64>,
    pub threshold: Option<f64>,
    pub explanation: String,
    pub evaluated_at: String,
}

#[derive(Debug, Clone)]
pub struct DiscrepancyRow {
    pub discrepancy_id: String,
    pub session_id: String,
    pub match_id: Option<String>,
    pub rule_id: Option<String>,
    pub severity: String,
    pub status: String,
    pub description: String,
    pub variance_pct: Option<f64>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<String>,
    pub resolution_notes: Option<String>,
}

impl ReconStore {
    // ── Rule results ───────────────────────────────────────────────

    /// Upsert keyed by (session, rule). Re-running a session replaces
    /// each rule's row, never appends.
    pub fn upsert_recon_result(
        &self,
        session_id: &str,
        result: &ReconciliationResult,
    ) -> ReconResult<()> {
        self.conn.execute(
            "INSERT INTO recon_result
             (session_id, rule_id, status, source_value, target_value,
              difference, threshold, explanation, evaluated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)
             ON CONFLICT(session_id, rule_id) DO UPDATE SET
                status = excluded.status,
                source_value = excluded.source_value,
                target_value = excluded.target_value,
                difference = excluded.difference,
                threshold = excluded.threshold,
                explanation = excluded.explanation,
                evaluated_at = excluded.evaluated_at",
            params![
                session_id,
                result.rule_id,
                result.status.as_str(),
                result.source_value,
                result.target_value,
                result.difference,
                result.threshold,
                result.explanation,
                now_ts(),
            ],
        )?;
        Ok(())
    }

    pub fn results_for_session(&self, session_id: &str) -> ReconResult<Vec<ReconResultRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT session_id, rule_id, status, source_value, target_value,
                    difference, threshold, explanation, evaluated_at
             FROM recon_result WHERE session_id = ?1
             ORDER BY rule_id ASC",
        )?;
        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok(ReconResultRow {
                    session_id: row.get(0)?,
                    rule_id: row.get(1)?,
                    status: row.get(2)?,
                    source_value: row.get(3)?,
                    target_value: row.get(4)?,
                    difference: row.get(5)?,
                    threshold: row.get(6)?,
                    explanation: row.get(7)?,
                    evaluated_at: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn result_count(&self, session_id: &str) -> ReconResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM recon_result WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    // ── Discrepancies ──────────────────────────────────────────────

    /// Validation regenerates discrepancies wholesale: the caller wraps
    /// this delete and the subsequent inserts in one transaction so a
    /// failure never leaves a session without its rows.
    pub fn delete_discrepancies_for_session(&self, session_id: &str) -> ReconResult<()> {
        self.conn.execute(
            "DELETE FROM discrepancy WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(())
    }

    pub fn insert_discrepancy(&self, d: &DiscrepancyRow) -> ReconResult<()> {
        self.conn.execute(
            "INSERT INTO discrepancy
             (discrepancy_id, session_id, match_id, rule_id, severity,
              status, description, variance_pct)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
            params![
                d.discrepancy_id,
                d.session_id,
                d.match_id,
                d.rule_id,
                d.severity,
                d.status,
                d.description,
                d.variance_pct,
            ],
        )?;
        Ok(())
    }

    pub fn discrepancies_for_session(
        &self,
        session_id: &str,
    ) -> ReconResult<Vec<DiscrepancyRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT discrepancy_id, session_id, match_id, rule_id, severity,
                    status, description, variance_pct, resolved_by,
                    resolved_at, resolution_notes
             FROM discrepancy WHERE session_id = ?1
             ORDER BY severity ASC, discrepancy_id ASC",
        )?;
        let rows = stmt
            .query_map(params![session_id], Self::map_discrepancy_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_discrepancy(&self, discrepancy_id: &str) -> ReconResult<DiscrepancyRow> {
        self.conn
            .query_row(
                "SELECT discrepancy_id, session_id, match_id, rule_id, severity,
                        status, description, variance_pct, resolved_by,
                        resolved_at, resolution_notes
                 FROM discrepancy WHERE discrepancy_id = ?1",
                params![discrepancy_id],
                Self::map_discrepancy_row,
            )
            .map_err(Into::into)
    }

    /// Move a discrepancy without touching its resolution trail.
    pub fn update_discrepancy_status(
        &self,
        discrepancy_id: &str,
        status: &str,
    ) -> ReconResult<()> {
        self.conn.execute(
            "UPDATE discrepancy SET status = ?1 WHERE discrepancy_id = ?2",
            params![status, discrepancy_id],
        )?;
        Ok(())
    }

    /// Terminal transition (resolved or accepted); only here do the
    /// resolution fields get written.
    pub fn close_discrepancy(
        &self,
        discrepancy_id: &str,
        status: &str,
        resolved_by: &str,
        notes: &str,
    ) -> ReconResult<()> {
        self.conn.execute(
            "UPDATE discrepancy
             SET status = ?1, resolved_by = ?2, resolved_at = ?3,
                 resolution_notes = ?4
             WHERE discrepancy_id = ?5",
            params![status, resolved_by, now_ts(), notes, discrepancy_id],
        )?;
        Ok(())
    }

    pub fn discrepancy_count(&self, session_id: &str) -> ReconResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM discrepancy WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    fn map_discrepancy_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DiscrepancyRow> {
        Ok(DiscrepancyRow {
            discrepancy_id: row.get(0)?,
            session_id: row.get(1)?,
            match_id: row.get(2)?,
            rule_id: row.get(3)?,
            severity: row.get(4)?,
            status: row.get(5)?,
            description: row.get(6)?,
            variance_pct: row.get(7)?,
            resolved_by: row.get(8)?,
            resolved_at: row.get(9)?,
            resolution_notes: row.get(10)?,
        })
    }
}
