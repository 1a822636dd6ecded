//! DSCR covenant monitor.
//!
//! One alert per (property, period, type) lives through its whole
//! lifecycle under a single id: ACTIVE, ACKNOWLEDGED, RESOLVED, and the
//! terminal human-only DISMISSED. Automatic transitions are guarded
//! updates keyed on the expected status; a lost race is re-read and
//! retried once, then logged and dropped. The next scheduled recompute
//! converges on the same state, so dropping is safe.

use uuid::Uuid;

use crate::config::CovenantConfig;
use crate::error::ReconResult;
use crate::store::{CommitteeAlertRow, ReconStore, WorkflowLockRow};
use crate::types::{PeriodId, PropertyId};

pub const ALERT_TYPE_DSCR: &str = "dscr";

/// What a recompute did, for callers that report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertOutcome {
    /// Core documents incomplete or no debt service; nothing to assess.
    Skipped(String),
    /// DSCR healthy and no open alert.
    Healthy,
    /// DSCR healthy; the open ACTIVE alert was auto-resolved.
    AutoResolved(String),
    Created(String),
    Updated(String),
    Reactivated(String),
    /// Breach persists but the open alert is DISMISSED-adjacent or a
    /// guarded update kept losing; left alone.
    Unchanged(String),
}

pub struct CovenantMonitor<'a> {
    store: &'a ReconStore,
    config: &'a CovenantConfig,
}

impl<'a> CovenantMonitor<'a> {
    pub fn new(store: &'a ReconStore, config: &'a CovenantConfig) -> Self {
        Self { store, config }
    }

    /// Recompute DSCR for a scope and drive the alert state machine.
    /// Requires all three core statements; partial data would understate
    /// NOI and raise false breaches.
    pub fn recompute_dscr(
        &self,
        property_id: &PropertyId,
        period_id: &PeriodId,
    ) -> ReconResult<AlertOutcome> {
        let inputs = self.store.covenant_inputs(property_id, period_id)?;
        if !inputs.core_documents_complete {
            log::debug!("dscr {property_id}/{period_id}: core statements incomplete, skipping");
            return Ok(AlertOutcome::Skipped("core statements incomplete".into()));
        }
        if inputs.debt_service <= 0.0 {
            log::debug!("dscr {property_id}/{period_id}: no debt service, skipping");
            return Ok(AlertOutcome::Skipped("no debt service recorded".into()));
        }

        let dscr = inputs.noi() / inputs.debt_service;
        let breached = dscr < self.config.dscr_warning;
        let severity = if dscr < self.config.dscr_critical {
            "CRITICAL"
        } else {
            "WARNING"
        };
        let message = format!(
            "DSCR {dscr:.4} against covenant minimum {:.2} (NOI {:.2}, debt service {:.2})",
            self.config.dscr_warning,
            inputs.noi(),
            inputs.debt_service
        );

        let open = self.store.open_alert(property_id, period_id, ALERT_TYPE_DSCR)?;
        let outcome = match (breached, open) {
            (false, None) => AlertOutcome::Healthy,
            (false, Some(alert)) => self.auto_resolve(&alert, dscr)?,
            (true, None) => {
                let alert_id = self.create_alert(property_id, period_id, dscr, severity, &message)?;
                if severity == "CRITICAL" {
                    self.ensure_lock(&alert_id, property_id)?;
                }
                AlertOutcome::Created(alert_id)
            }
            (true, Some(alert)) => {
                let outcome = self.refresh_breached(&alert, dscr, severity, &message)?;
                if severity == "CRITICAL" {
                    self.ensure_lock(&alert.alert_id, property_id)?;
                }
                outcome
            }
        };
        Ok(outcome)
    }

    fn create_alert(
        &self,
        property_id: &str,
        period_id: &str,
        dscr: f64,
        severity: &str,
        message: &str,
    ) -> ReconResult<String> {
        let alert_id = format!("CA-{}", Uuid::new_v4());
        let ts = crate::store::now_ts();
        self.store.insert_alert(&CommitteeAlertRow {
            alert_id: alert_id.clone(),
            property_id: property_id.to_string(),
            period_id: period_id.to_string(),
            alert_type: ALERT_TYPE_DSCR.to_string(),
            severity: severity.to_string(),
            status: "ACTIVE".to_string(),
            actual_value: dscr,
            threshold_value: self.config.dscr_warning,
            message: message.to_string(),
            acknowledged_by: None,
            acknowledged_at: None,
            resolved_by: None,
            resolved_at: None,
            resolution_notes: None,
            created_at: ts.clone(),
            updated_at: ts,
        })?;
        log::info!("alert {alert_id}: DSCR breach {severity} ({dscr:.4})");
        Ok(alert_id)
    }

    /// Breach persists against an existing open alert. ACTIVE alerts get
    /// their values refreshed in place; ACKNOWLEDGED and RESOLVED ones
    /// reactivate under the same id with the review trail cleared.
    fn refresh_breached(
        &self,
        alert: &CommitteeAlertRow,
        dscr: f64,
        severity: &str,
        message: &str,
    ) -> ReconResult<AlertOutcome> {
        for attempt in 0..2 {
            let fresh = if attempt == 0 {
                alert.clone()
            } else {
                self.store.get_alert(&alert.alert_id)?
            };
            match fresh.status.as_str() {
                "ACTIVE" => {
                    let n = self.store.update_alert_values(
                        &fresh.alert_id,
                        dscr,
                        severity,
                        message,
                        "ACTIVE",
                    )?;
                    if n > 0 {
                        return Ok(AlertOutcome::Updated(fresh.alert_id));
                    }
                }
                "ACKNOWLEDGED" | "RESOLVED" => {
                    let n = self.store.reactivate_alert(
                        &fresh.alert_id,
                        dscr,
                        severity,
                        message,
                        &fresh.status,
                    )?;
                    if n > 0 {
                        log::info!(
                            "alert {}: breach recurred, reactivated from {}",
                            fresh.alert_id,
                            fresh.status
                        );
                        return Ok(AlertOutcome::Reactivated(fresh.alert_id));
                    }
                }
                // DISMISSED is terminal for automation.
                _ => return Ok(AlertOutcome::Unchanged(fresh.alert_id)),
            }
        }
        log::warn!(
            "alert {}: concurrent transitions, leaving for next recompute",
            alert.alert_id
        );
        Ok(AlertOutcome::Unchanged(alert.alert_id.clone()))
    }

    /// Covenant healthy again. Only an ACTIVE alert auto-resolves; an
    /// ACKNOWLEDGED one stays with its reviewer, and DISMISSED is never
    /// touched.
    fn auto_resolve(&self, alert: &CommitteeAlertRow, dscr: f64) -> ReconResult<AlertOutcome> {
        if alert.status != "ACTIVE" {
            return Ok(AlertOutcome::Unchanged(alert.alert_id.clone()));
        }
        let notes = format!("DSCR recovered to {dscr:.4}");
        let n = self
            .store
            .resolve_alert(&alert.alert_id, "system", &notes, "ACTIVE")?;
        if n == 0 {
            // Moved under us; one retry against the fresh status.
            let fresh = self.store.get_alert(&alert.alert_id)?;
            if fresh.status != "ACTIVE" {
                return Ok(AlertOutcome::Unchanged(fresh.alert_id));
            }
            let n = self
                .store
                .resolve_alert(&fresh.alert_id, "system", &notes, "ACTIVE")?;
            if n == 0 {
                log::warn!("alert {}: auto-resolve lost twice, skipping", fresh.alert_id);
                return Ok(AlertOutcome::Unchanged(fresh.alert_id));
            }
        }
        log::info!("alert {}: auto-resolved ({notes})", alert.alert_id);
        Ok(AlertOutcome::AutoResolved(alert.alert_id.clone()))
    }

    /// A CRITICAL breach freezes distribution workflows until the
    /// committee signs off. One active lock per property.
    fn ensure_lock(&self, alert_id: &str, property_id: &str) -> ReconResult<()> {
        if self.store.active_lock_for_property(property_id)?.is_some() {
            return Ok(());
        }
        let lock_id = format!("WL-{}", Uuid::new_v4());
        self.store.insert_workflow_lock(&WorkflowLockRow {
            lock_id: lock_id.clone(),
            alert_id: alert_id.to_string(),
            property_id: property_id.to_string(),
            status: "ACTIVE".to_string(),
            reason: "DSCR below critical covenant threshold".to_string(),
            created_at: crate::store::now_ts(),
            released_at: None,
            released_by: None,
        })?;
        log::info!("workflow lock {lock_id} placed on {property_id} (alert {alert_id})");
        Ok(())
    }
}
