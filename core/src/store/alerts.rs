use rusqlite::{params, OptionalExtension};

use super::{now_ts, ReconStore};
use crate::error::ReconResult;
use crate::record::DocumentType;

#[derive(Debug, Clone)]
pub struct CommitteeAlertRow {
    pub alert_id: String,
    pub property_id: String,
    pub period_id: String,
    pub alert_type: String,
    pub severity: String,
    pub status: String,
    pub actual_value: f64,
    pub threshold_value: f64,
    pub message: String,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<String>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<String>,
    pub resolution_notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct WorkflowLockRow {
    pub lock_id: String,
    pub alert_id: String,
    pub property_id: String,
    pub status: String,
    pub reason: String,
    pub created_at: String,
    pub released_at: Option<String>,
    pub released_by: Option<String>,
}

/// Figures the covenant monitor reads to compute DSCR.
#[derive(Debug, Clone, Copy)]
pub struct CovenantInputs {
    pub income: f64,
    pub operating_expenses: f64,
    pub debt_service: f64,
    pub core_documents_complete: bool,
}

impl CovenantInputs {
    pub fn noi(&self) -> f64 {
        self.income - self.operating_expenses
    }
}

impl ReconStore {
    // ── Covenant inputs ────────────────────────────────────────────

    /// Read DSCR inputs for a scope. Income = income-statement 4xxx,
    /// operating expenses = 5xxx excluding non-cash 57xx and
    /// debt-related 58xx (NOI is a cash figure), debt service =
    /// mortgage-statement PMT-* rows.
    pub fn covenant_inputs(
        &self,
        property_id: &str,
        period_id: &str,
    ) -> ReconResult<CovenantInputs> {
        let income: f64 = self.conn.query_row(
            "SELECT COALESCE(SUM(amount), 0.0) FROM financial_record
             WHERE property_id = ?1 AND period_id = ?2
               AND doc_type = 'income_statement' AND account_code LIKE '4%'",
            params![property_id, period_id],
            |row| row.get(0),
        )?;
        let operating_expenses: f64 = self.conn.query_row(
            "SELECT COALESCE(SUM(amount), 0.0) FROM financial_record
             WHERE property_id = ?1 AND period_id = ?2
               AND doc_type = 'income_statement'
               AND account_code LIKE '5%'
               AND account_code NOT LIKE '57%' AND account_code NOT LIKE '58%'",
            params![property_id, period_id],
            |row| row.get(0),
        )?;
        let debt_service: f64 = self.conn.query_row(
            "SELECT COALESCE(SUM(amount), 0.0) FROM financial_record
             WHERE property_id = ?1 AND period_id = ?2
               AND doc_type = 'mortgage_statement' AND account_code LIKE 'PMT-%'",
            params![property_id, period_id],
            |row| row.get(0),
        )?;
        let mut complete = true;
        for doc in DocumentType::CORE_THREE {
            if !self.has_doc_data(property_id, period_id, doc)? {
                complete = false;
                break;
            }
        }
        Ok(CovenantInputs {
            income,
            operating_expenses,
            debt_service,
            core_documents_complete: complete,
        })
    }

    // ── Alerts ─────────────────────────────────────────────────────

    pub fn insert_alert(&self, a: &CommitteeAlertRow) -> ReconResult<()> {
        self.conn.execute(
            "INSERT INTO committee_alert
             (alert_id, property_id, period_id, alert_type, severity, status,
              actual_value, threshold_value, message, created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
            params![
                a.alert_id,
                a.property_id,
                a.period_id,
                a.alert_type,
                a.severity,
                a.status,
                a.actual_value,
                a.threshold_value,
                a.message,
                a.created_at,
                a.updated_at,
            ],
        )?;
        Ok(())
    }

    /// The single non-DISMISSED alert for a scope+type, if any.
    pub fn open_alert(
        &self,
        property_id: &str,
        period_id: &str,
        alert_type: &str,
    ) -> ReconResult<Option<CommitteeAlertRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT alert_id, property_id, period_id, alert_type, severity,
                    status, actual_value, threshold_value, message,
                    acknowledged_by, acknowledged_at, resolved_by, resolved_at,
                    resolution_notes, created_at, updated_at
             FROM committee_alert
             WHERE property_id = ?1 AND period_id = ?2 AND alert_type = ?3
               AND status != 'DISMISSED'
             ORDER BY created_at DESC LIMIT 1",
        )?;
        let row = stmt
            .query_row(params![property_id, period_id, alert_type], Self::map_alert_row)
            .optional()?;
        Ok(row)
    }

    pub fn get_alert(&self, alert_id: &str) -> ReconResult<CommitteeAlertRow> {
        self.conn
            .query_row(
                "SELECT alert_id, property_id, period_id, alert_type, severity,
                        status, actual_value, threshold_value, message,
                        acknowledged_by, acknowledged_at, resolved_by,
                        resolved_at, resolution_notes, created_at, updated_at
                 FROM committee_alert WHERE alert_id = ?1",
                params![alert_id],
                Self::map_alert_row,
            )
            .map_err(Into::into)
    }

    // Every auto-transition below is guarded by an expected-status
    // predicate and returns the number of rows changed. Zero means the
    // alert moved under us; the monitor re-reads and retries once.

    /// Refresh values on an alert that is still breached and still in
    /// the expected status.
    pub fn update_alert_values(
        &self,
        alert_id: &str,
        actual_value: f64,
        severity: &str,
        message: &str,
        expected_status: &str,
    ) -> ReconResult<usize> {
        let n = self.conn.execute(
            "UPDATE committee_alert
             SET actual_value = ?1, severity = ?2, message = ?3, updated_at = ?4
             WHERE alert_id = ?5 AND status = ?6",
            params![actual_value, severity, message, now_ts(), alert_id, expected_status],
        )?;
        Ok(n)
    }

    /// Reactivate a previously acknowledged/resolved alert whose
    /// condition recurred, clearing the acknowledgement and resolution
    /// trail. Same alert id throughout its life.
    pub fn reactivate_alert(
        &self,
        alert_id: &str,
        actual_value: f64,
        severity: &str,
        message: &str,
        expected_status: &str,
    ) -> ReconResult<usize> {
        let n = self.conn.execute(
            "UPDATE committee_alert
             SET status = 'ACTIVE', actual_value = ?1, severity = ?2,
                 message = ?3, updated_at = ?4,
                 acknowledged_by = NULL, acknowledged_at = NULL,
                 resolved_by = NULL, resolved_at = NULL, resolution_notes = NULL
             WHERE alert_id = ?5 AND status = ?6",
            params![actual_value, severity, message, now_ts(), alert_id, expected_status],
        )?;
        Ok(n)
    }

    pub fn resolve_alert(
        &self,
        alert_id: &str,
        resolved_by: &str,
        notes: &str,
        expected_status: &str,
    ) -> ReconResult<usize> {
        let ts = now_ts();
        let n = self.conn.execute(
            "UPDATE committee_alert
             SET status = 'RESOLVED', resolved_by = ?1, resolved_at = ?2,
                 resolution_notes = ?3, updated_at = ?2
             WHERE alert_id = ?4 AND status = ?5",
            params![resolved_by, ts, notes, alert_id, expected_status],
        )?;
        Ok(n)
    }

    pub fn acknowledge_alert(
        &self,
        alert_id: &str,
        acknowledged_by: &str,
    ) -> ReconResult<usize> {
        let ts = now_ts();
        let n = self.conn.execute(
            "UPDATE committee_alert
             SET status = 'ACKNOWLEDGED', acknowledged_by = ?1,
                 acknowledged_at = ?2, updated_at = ?2
             WHERE alert_id = ?3 AND status = 'ACTIVE'",
            params![acknowledged_by, ts, alert_id],
        )?;
        Ok(n)
    }

    /// Terminal, human-only. Auto-logic never touches a DISMISSED row.
    pub fn dismiss_alert(
        &self,
        alert_id: &str,
        dismissed_by: &str,
        notes: &str,
    ) -> ReconResult<usize> {
        let ts = now_ts();
        let n = self.conn.execute(
            "UPDATE committee_alert
             SET status = 'DISMISSED', resolved_by = ?1, resolved_at = ?2,
                 resolution_notes = ?3, updated_at = ?2
             WHERE alert_id = ?4 AND status != 'DISMISSED'",
            params![dismissed_by, ts, notes, alert_id],
        )?;
        Ok(n)
    }

    pub fn alert_count(&self, property_id: &str) -> ReconResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM committee_alert WHERE property_id = ?1",
                params![property_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    // ── Workflow locks ─────────────────────────────────────────────

    pub fn insert_workflow_lock(&self, l: &WorkflowLockRow) -> ReconResult<()> {
        self.conn.execute(
            "INSERT INTO workflow_lock
             (lock_id, alert_id, property_id, status, reason, created_at)
             VALUES (?1,?2,?3,?4,?5,?6)",
            params![l.lock_id, l.alert_id, l.property_id, l.status, l.reason, l.created_at],
        )?;
        Ok(())
    }

    pub fn active_lock_for_property(
        &self,
        property_id: &str,
    ) -> ReconResult<Option<WorkflowLockRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT lock_id, alert_id, property_id, status, reason,
                    created_at, released_at, released_by
             FROM workflow_lock
             WHERE property_id = ?1 AND status = 'ACTIVE'
             ORDER BY created_at DESC LIMIT 1",
        )?;
        let row = stmt
            .query_row(params![property_id], |row| {
                Ok(WorkflowLockRow {
                    lock_id: row.get(0)?,
                    alert_id: row.get(1)?,
                    property_id: row.get(2)?,
                    status: row.get(3)?,
                    reason: row.get(4)?,
                    created_at: row.get(5)?,
                    released_at: row.get(6)?,
                    released_by: row.get(7)?,
                })
            })
            .optional()?;
        Ok(row)
    }

    pub fn release_workflow_lock(
        &self,
        lock_id: &str,
        released_by: &str,
    ) -> ReconResult<usize> {
        let n = self.conn.execute(
            "UPDATE workflow_lock
             SET status = 'RELEASED', released_at = ?1, released_by = ?2
             WHERE lock_id = ?3 AND status = 'ACTIVE'",
            params![now_ts(), released_by, lock_id],
        )?;
        Ok(n)
    }

    fn map_alert_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommitteeAlertRow> {
        Ok(CommitteeAlertRow {
            alert_id: row.get(0)?,
            property_id: row.get(1)?,
            period_id: row.get(2)?,
            alert_type: row.get(3)?,
            severity: row.get(4)?,
            status: row.get(5)?,
            actual_value: row.get(6)?,
            threshold_value: row.get(7)?,
            message: row.get(8)?,
            acknowledged_by: row.get(9)?,
            acknowledged_at: row.get(10)?,
            resolved_by: row.get(11)?,
            resolved_at: row.get(12)?,
            resolution_notes: row.get(13)?,
            created_at: row.get(14)?,
            updated_at: row.get(15)?,
        })
    }
}
