use rusqlite::{params, OptionalExtension};

use super::{now_ts, ReconStore};
use crate::error::ReconResult;

#[derive(Debug, Clone)]
pub struct SessionRow {
    pub session_id: String,
    pub property_id: String,
    pub period_id: String,
    pub status: String,
    pub health_score: Option<f64>,
    pub started_at: String,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MatchRow {
    pub match_id: String,
    pub session_id: String,
    pub source_doc_type: String,
    pub source_record_id: String,
    pub target_doc_type: String,
    pub target_record_id: String,
    pub match_type: String,
    pub confidence_score: f64,
    pub amount_difference_pct: f64,
    pub relationship_formula: String,
    pub status: String,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<String>,
    pub review_notes: Option<String>,
}

impl ReconStore {
    // ── Sessions ───────────────────────────────────────────────────

    pub fn insert_session(
        &self,
        session_id: &str,
        property_id: &str,
        period_id: &str,
    ) -> ReconResult<()> {
        self.conn.execute(
            "INSERT INTO recon_session
             (session_id, property_id, period_id, status, started_at)
             VALUES (?1, ?2, ?3, 'in_progress', ?4)",
            params![session_id, property_id, period_id, now_ts()],
        )?;
        Ok(())
    }

    pub fn get_session(&self, session_id: &str) -> ReconResult<SessionRow> {
        self.conn
            .query_row(
                "SELECT session_id, property_id, period_id, status,
                        health_score, started_at, completed_at
                 FROM recon_session WHERE session_id = ?1",
                params![session_id],
                Self::map_session_row,
            )
            .map_err(Into::into)
    }

    pub fn latest_session_for_scope(
        &self,
        property_id: &str,
        period_id: &str,
    ) -> ReconResult<Option<SessionRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT session_id, property_id, period_id, status,
                    health_score, started_at, completed_at
             FROM recon_session
             WHERE property_id = ?1 AND period_id = ?2
             ORDER BY started_at DESC LIMIT 1",
        )?;
        let row = stmt
            .query_row(params![property_id, period_id], Self::map_session_row)
            .optional()?;
        Ok(row)
    }

    pub fn set_session_health_score(
        &self,
        session_id: &str,
        health_score: f64,
    ) -> ReconResult<()> {
        self.conn.execute(
            "UPDATE recon_session SET health_score = ?1 WHERE session_id = ?2",
            params![health_score, session_id],
        )?;
        Ok(())
    }

    pub fn approve_session(&self, session_id: &str) -> ReconResult<()> {
        self.conn.execute(
            "UPDATE recon_session
             SET status = 'approved', completed_at = ?1
             WHERE session_id = ?2",
            params![now_ts(), session_id],
        )?;
        Ok(())
    }

    // ── Matches ────────────────────────────────────────────────────

    /// Upsert keyed by (session, source record, target record). Engine
    /// re-runs refresh the computed columns but leave review state
    /// (status, reviewer, notes) untouched.
    pub fn upsert_match(&self, m: &MatchRow) -> ReconResult<()> {
        self.conn.execute(
            "INSERT INTO record_match
             (match_id, session_id, source_doc_type, source_record_id,
              target_doc_type, target_record_id, match_type,
              confidence_score, amount_difference_pct, relationship_formula,
              status)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)
             ON CONFLICT(session_id, source_record_id, target_record_id)
             DO UPDATE SET
                match_type = excluded.match_type,
                confidence_score = excluded.confidence_score,
                amount_difference_pct = excluded.amount_difference_pct,
                relationship_formula = excluded.relationship_formula",
            params![
                m.match_id,
                m.session_id,
                m.source_doc_type,
                m.source_record_id,
                m.target_doc_type,
                m.target_record_id,
                m.match_type,
                m.confidence_score,
                m.amount_difference_pct,
                m.relationship_formula,
                m.status,
            ],
        )?;
        Ok(())
    }

    pub fn matches_for_session(&self, session_id: &str) -> ReconResult<Vec<MatchRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT match_id, session_id, source_doc_type, source_record_id,
                    target_doc_type, target_record_id, match_type,
                    confidence_score, amount_difference_pct,
                    relationship_formula, status, reviewed_by, reviewed_at,
                    review_notes
             FROM record_match WHERE session_id = ?1
             ORDER BY confidence_score DESC, match_id ASC",
        )?;
        let rows = stmt
            .query_map(params![session_id], Self::map_match_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_match(&self, match_id: &str) -> ReconResult<MatchRow> {
        self.conn
            .query_row(
                "SELECT match_id, session_id, source_doc_type, source_record_id,
                        target_doc_type, target_record_id, match_type,
                        confidence_score, amount_difference_pct,
                        relationship_formula, status, reviewed_by, reviewed_at,
                        review_notes
                 FROM record_match WHERE match_id = ?1",
                params![match_id],
                Self::map_match_row,
            )
            .map_err(Into::into)
    }

    pub fn update_match_review(
        &self,
        match_id: &str,
        status: &str,
        reviewed_by: &str,
        notes: Option<&str>,
    ) -> ReconResult<()> {
        self.conn.execute(
            "UPDATE record_match
             SET status = ?1, reviewed_by = ?2, reviewed_at = ?3, review_notes = ?4
             WHERE match_id = ?5",
            params![status, reviewed_by, now_ts(), notes, match_id],
        )?;
        Ok(())
    }

    pub fn match_count(&self, session_id: &str) -> ReconResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM record_match WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    /// Approved source→target account pairings for a property across
    /// all sessions, with average approved confidence. Feeds the
    /// inferred engine's historical mode.
    pub fn approved_match_pairs(
        &self,
        property_id: &str,
    ) -> ReconResult<Vec<(String, String, f64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT src.account_code, tgt.account_code, AVG(m.confidence_score)
             FROM record_match m
             JOIN recon_session s ON m.session_id = s.session_id
             JOIN financial_record src ON m.source_record_id = src.record_id
             JOIN financial_record tgt ON m.target_record_id = tgt.record_id
             WHERE s.property_id = ?1 AND m.status = 'approved'
             GROUP BY src.account_code, tgt.account_code",
        )?;
        let rows = stmt
            .query_map(params![property_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
        Ok(SessionRow {
            session_id: row.get(0)?,
            property_id: row.get(1)?,
            period_id: row.get(2)?,
            status: row.get(3)?,
            health_score: row.get(4)?,
            started_at: row.get(5)?,
            completed_at: row.get(6)?,
        })
    }

    fn map_match_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MatchRow> {
        Ok(MatchRow {
            match_id: row.get(0)?,
            session_id: row.get(1)?,
            source_doc_type: row.get(2)?,
            source_record_id: row.get(3)?,
            target_doc_type: row.get(4)?,
            target_record_id: row.get(5)?,
            match_type: row.get(6)?,
            confidence_score: row.get(7)?,
            amount_difference_pct: row.get(8)?,
            relationship_formula: row.get(9)?,
            status: row.get(10)?,
            reviewed_by: row.get(11)?,
            reviewed_at: row.get(12)?,
            review_notes: row.get(13)?,
        })
    }
}
