//! Auditor review workflow.
//!
//! Humans act on engine output here: match approval/rejection,
//! discrepancy investigation, record corrections, and committee
//! sign-off on covenant alerts. Review never rewrites what an engine
//! computed; confidence scores and relationship formulas stay as
//! evidence of why the match was proposed.

use crate::alerts::CovenantMonitor;
use crate::config::ReconConfig;
use crate::error::{ReconError, ReconResult};
use crate::session::SessionOrchestrator;
use crate::store::{DiscrepancyRow, MatchRow, ReconStore};

pub struct ReviewWorkflow<'a> {
    store: &'a ReconStore,
    config: &'a ReconConfig,
}

impl<'a> ReviewWorkflow<'a> {
    pub fn new(store: &'a ReconStore, config: &'a ReconConfig) -> Self {
        Self { store, config }
    }

    // ── Matches ────────────────────────────────────────────────────

    pub fn approve_match(
        &self,
        match_id: &str,
        reviewer: &str,
        notes: Option<&str>,
    ) -> ReconResult<MatchRow> {
        self.store
            .update_match_review(match_id, "approved", reviewer, notes)?;
        log::info!("match {match_id} approved by {reviewer}");
        self.store.get_match(match_id)
    }

    pub fn reject_match(
        &self,
        match_id: &str,
        reviewer: &str,
        notes: Option<&str>,
    ) -> ReconResult<MatchRow> {
        self.store
            .update_match_review(match_id, "rejected", reviewer, notes)?;
        log::info!("match {match_id} rejected by {reviewer}");
        self.store.get_match(match_id)
    }

    /// Flag a match as accepted-with-changes. The notes carry the
    /// auditor's adjustment; the engine columns stay untouched.
    pub fn modify_match(
        &self,
        match_id: &str,
        reviewer: &str,
        notes: &str,
    ) -> ReconResult<MatchRow> {
        self.store
            .update_match_review(match_id, "modified", reviewer, Some(notes))?;
        log::info!("match {match_id} modified by {reviewer}");
        self.store.get_match(match_id)
    }

    // ── Discrepancies ──────────────────────────────────────────────

    /// Mark a discrepancy under investigation. The resolution trail
    /// stays empty until a terminal transition.
    pub fn start_investigation(
        &self,
        discrepancy_id: &str,
        auditor: &str,
    ) -> ReconResult<DiscrepancyRow> {
        self.store
            .update_discrepancy_status(discrepancy_id, "investigating")?;
        log::info!("discrepancy {discrepancy_id} under investigation by {auditor}");
        self.store.get_discrepancy(discrepancy_id)
    }

    pub fn resolve_discrepancy(
        &self,
        discrepancy_id: &str,
        auditor: &str,
        notes: &str,
    ) -> ReconResult<DiscrepancyRow> {
        self.store
            .close_discrepancy(discrepancy_id, "resolved", auditor, notes)?;
        log::info!("discrepancy {discrepancy_id} resolved by {auditor}");
        self.store.get_discrepancy(discrepancy_id)
    }

    /// Accept a variance as immaterial or explained without correcting
    /// any underlying record.
    pub fn accept_discrepancy(
        &self,
        discrepancy_id: &str,
        auditor: &str,
        notes: &str,
    ) -> ReconResult<DiscrepancyRow> {
        self.store
            .close_discrepancy(discrepancy_id, "accepted", auditor, notes)?;
        log::info!("discrepancy {discrepancy_id} accepted by {auditor}");
        self.store.get_discrepancy(discrepancy_id)
    }

    // ── Records ────────────────────────────────────────────────────

    /// Correct an extracted amount, leaving an audit trail, then
    /// recompute everything derived from the scope: the in-progress
    /// session's matches, results, and health score, and the covenant
    /// alert.
    pub fn correct_record(
        &self,
        record_id: &str,
        new_amount: f64,
        auditor: &str,
        reason: &str,
    ) -> ReconResult<()> {
        self.store
            .correct_record_amount(record_id, new_amount, auditor, reason)?;
        log::info!("record {record_id} corrected to {new_amount:.2} by {auditor}");
        self.recalculate_scope(record_id)
    }

    fn recalculate_scope(&self, record_id: &str) -> ReconResult<()> {
        let record = self.store.get_record(record_id)?;
        if let Some(session) = self
            .store
            .latest_session_for_scope(&record.property_id, &record.period_id)?
        {
            // Approved sessions are closed books; their figures stand.
            if session.status == "in_progress" {
                let orchestrator = SessionOrchestrator::new(self.store, self.config);
                orchestrator.find_all_matches(&session)?;
                orchestrator.validate_matches(&session)?;
            }
        }
        let monitor = CovenantMonitor::new(self.store, &self.config.covenant);
        monitor.recompute_dscr(&record.property_id, &record.period_id)?;
        Ok(())
    }

    // ── Committee sign-off ─────────────────────────────────────────

    pub fn acknowledge_alert(&self, alert_id: &str, member: &str) -> ReconResult<()> {
        let n = self.store.acknowledge_alert(alert_id, member)?;
        if n == 0 {
            let fresh = self.store.get_alert(alert_id)?;
            return Err(ReconError::ConcurrencyConflict {
                alert_id: format!("{alert_id} (status {})", fresh.status),
            });
        }
        log::info!("alert {alert_id} acknowledged by {member}");
        Ok(())
    }

    /// Committee approval: resolve the alert and release any workflow
    /// lock it placed. Works from ACTIVE or ACKNOWLEDGED, and from an
    /// auto-RESOLVED alert whose lock is still in place — the covenant
    /// recovering on its own never releases a lock, only the committee
    /// does.
    pub fn committee_approve(
        &self,
        alert_id: &str,
        member: &str,
        notes: &str,
    ) -> ReconResult<()> {
        let alert = self.store.get_alert(alert_id)?;
        let owned_lock = self
            .store
            .active_lock_for_property(&alert.property_id)?
            .filter(|lock| lock.alert_id == alert_id);
        match alert.status.as_str() {
            "ACTIVE" | "ACKNOWLEDGED" => {
                let n = self
                    .store
                    .resolve_alert(alert_id, member, notes, &alert.status)?;
                if n == 0 {
                    return Err(ReconError::ConcurrencyConflict {
                        alert_id: alert_id.to_string(),
                    });
                }
                log::info!("alert {alert_id} resolved by committee member {member}");
            }
            // Already resolved: nothing to re-resolve, but the lock
            // still needs the committee's sign-off.
            "RESOLVED" if owned_lock.is_some() => {}
            _ => {
                return Err(ReconError::ConcurrencyConflict {
                    alert_id: format!("{alert_id} (status {})", alert.status),
                });
            }
        }
        if let Some(lock) = owned_lock {
            self.store.release_workflow_lock(&lock.lock_id, member)?;
            log::info!("workflow lock {} released by {member}", lock.lock_id);
        }
        Ok(())
    }

    pub fn dismiss_alert(
        &self,
        alert_id: &str,
        member: &str,
        notes: &str,
    ) -> ReconResult<()> {
        let alert = self.store.get_alert(alert_id)?;
        let n = self.store.dismiss_alert(alert_id, member, notes)?;
        if n == 0 {
            return Err(ReconError::ConcurrencyConflict {
                alert_id: alert_id.to_string(),
            });
        }
        if let Some(lock) = self.store.active_lock_for_property(&alert.property_id)? {
            if lock.alert_id == alert_id {
                self.store.release_workflow_lock(&lock.lock_id, member)?;
            }
        }
        log::info!("alert {alert_id} dismissed by {member}");
        Ok(())
    }
}
