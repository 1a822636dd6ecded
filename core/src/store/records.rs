use rusqlite::{params, OptionalExtension};

use super::{now_ts, ReconStore};
use crate::error::ReconResult;
use crate::record::{DocumentType, FinancialRecord};
use crate::types::PeriodId;

#[derive(Debug, Clone)]
pub struct RecordAuditRow {
    pub audit_id: i64,
    pub record_id: String,
    pub changed_by: String,
    pub old_amount: f64,
    pub new_amount: f64,
    pub reason: String,
    pub changed_at: String,
}

impl ReconStore {
    pub fn insert_property(&self, property_id: &str, name: &str) -> ReconResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO property (property_id, name, created_at)
             VALUES (?1, ?2, ?3)",
            params![property_id, name, now_ts()],
        )?;
        Ok(())
    }

    pub fn insert_period(&self, period_id: &str, year: i32, month: u32) -> ReconResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO period (period_id, year, month) VALUES (?1, ?2, ?3)",
            params![period_id, year, month],
        )?;
        Ok(())
    }

    /// The latest period strictly before the given one, when known.
    pub fn prior_period_id(&self, period_id: &str) -> ReconResult<Option<PeriodId>> {
        let current: Option<(i32, u32)> = self
            .conn
            .query_row(
                "SELECT year, month FROM period WHERE period_id = ?1",
                params![period_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((year, month)) = current else {
            return Ok(None);
        };
        let prior = self
            .conn
            .query_row(
                "SELECT period_id FROM period
                 WHERE (year < ?1) OR (year = ?1 AND month < ?2)
                 ORDER BY year DESC, month DESC LIMIT 1",
                params![year, month],
                |row| row.get(0),
            )
            .optional()?;
        Ok(prior)
    }

    pub fn insert_financial_record(&self, rec: &FinancialRecord) -> ReconResult<()> {
        self.conn.execute(
            "INSERT INTO financial_record
             (record_id, property_id, period_id, doc_type, account_code,
              account_name, amount, extraction_confidence, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                rec.record_id,
                rec.property_id,
                rec.period_id,
                rec.doc_type.as_str(),
                rec.account_code,
                rec.account_name,
                rec.amount,
                rec.extraction_confidence,
                now_ts(),
            ],
        )?;
        Ok(())
    }

    pub fn records_for_scope(
        &self,
        property_id: &str,
        period_id: &str,
    ) -> ReconResult<Vec<FinancialRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT record_id, property_id, period_id, doc_type, account_code,
                    account_name, amount, extraction_confidence
             FROM financial_record
             WHERE property_id = ?1 AND period_id = ?2
             ORDER BY doc_type ASC, account_code ASC",
        )?;
        let rows = stmt
            .query_map(params![property_id, period_id], Self::map_record_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn has_any_records(&self, property_id: &str, period_id: &str) -> ReconResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM financial_record
             WHERE property_id = ?1 AND period_id = ?2",
            params![property_id, period_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn has_doc_data(
        &self,
        property_id: &str,
        period_id: &str,
        doc: DocumentType,
    ) -> ReconResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM financial_record
             WHERE property_id = ?1 AND period_id = ?2 AND doc_type = ?3",
            params![property_id, period_id, doc.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn get_record(&self, record_id: &str) -> ReconResult<FinancialRecord> {
        self.conn
            .query_row(
                "SELECT record_id, property_id, period_id, doc_type, account_code,
                        account_name, amount, extraction_confidence
                 FROM financial_record WHERE record_id = ?1",
                params![record_id],
                Self::map_record_row,
            )
            .map_err(Into::into)
    }

    /// Auditor correction: update the amount in place and append an
    /// audit row inside one transaction.
    pub fn correct_record_amount(
        &self,
        record_id: &str,
        new_amount: f64,
        changed_by: &str,
        reason: &str,
    ) -> ReconResult<()> {
        let tx = self.begin()?;
        let old_amount: f64 = self.conn.query_row(
            "SELECT amount FROM financial_record WHERE record_id = ?1",
            params![record_id],
            |row| row.get(0),
        )?;
        self.conn.execute(
            "UPDATE financial_record SET amount = ?1 WHERE record_id = ?2",
            params![new_amount, record_id],
        )?;
        self.conn.execute(
            "INSERT INTO record_audit
             (record_id, changed_by, old_amount, new_amount, reason, changed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![record_id, changed_by, old_amount, new_amount, reason, now_ts()],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn audit_entries_for_record(
        &self,
        record_id: &str,
    ) -> ReconResult<Vec<RecordAuditRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT audit_id, record_id, changed_by, old_amount, new_amount,
                    reason, changed_at
             FROM record_audit WHERE record_id = ?1 ORDER BY audit_id ASC",
        )?;
        let rows = stmt
            .query_map(params![record_id], |row| {
                Ok(RecordAuditRow {
                    audit_id: row.get(0)?,
                    record_id: row.get(1)?,
                    changed_by: row.get(2)?,
                    old_amount: row.get(3)?,
                    new_amount: row.get(4)?,
                    reason: row.get(5)?,
                    changed_at: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_record_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FinancialRecord> {
        let doc_raw: String = row.get(3)?;
        let doc_type = DocumentType::parse(&doc_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("unknown doc_type '{doc_raw}'").into(),
            )
        })?;
        Ok(FinancialRecord {
            record_id: row.get(0)?,
            property_id: row.get(1)?,
            period_id: row.get(2)?,
            doc_type,
            account_code: row.get(4)?,
            account_name: row.get(5)?,
            amount: row.get(6)?,
            extraction_confidence: row.get(7)?,
        })
    }
}
