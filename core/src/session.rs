//! Reconciliation session orchestrator.
//!
//! One session scopes one (property, period) run: load the record sets,
//! run every matching engine and the rule registry, persist everything
//! in a single transaction, then validate into a health score and a
//! regenerated discrepancy set.
//!
//! Scheduling and single-writer-per-scope are the caller's problem (one
//! queued task per property+period); the upsert keys keep re-runs
//! idempotent even when that contract is violated.

use std::collections::HashMap;

use uuid::Uuid;

use crate::config::ReconConfig;
use crate::error::{ReconError, ReconResult};
use crate::matching::calculated::{CalculatedMatchEngine, Pattern};
use crate::matching::exact::ExactMatchEngine;
use crate::matching::fuzzy::FuzzyMatchEngine;
use crate::matching::inferred::{InferredMatchEngine, MatchHistory};
use crate::matching::{MatchResult, MATCH_SURFACES};
use crate::record::{DocumentType, FinancialRecord};
use crate::rules::{build_rules, RuleContext, RuleStatus};
use crate::scoring;
use crate::store::{DiscrepancyRow, MatchRow, ReconStore, SessionRow};
use crate::types::{PeriodId, PropertyId};

/// One period's records, grouped by document. The in-memory view every
/// engine and rule evaluates against.
#[derive(Debug, Clone, Default)]
pub struct PeriodRecords {
    by_doc: HashMap<DocumentType, Vec<FinancialRecord>>,
}

impl PeriodRecords {
    pub fn from_records(records: Vec<FinancialRecord>) -> Self {
        let mut by_doc: HashMap<DocumentType, Vec<FinancialRecord>> = HashMap::new();
        for rec in records {
            by_doc.entry(rec.doc_type).or_default().push(rec);
        }
        Self { by_doc }
    }

    pub fn doc(&self, doc: DocumentType) -> &[FinancialRecord] {
        self.by_doc.get(&doc).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn select(&self, doc: DocumentType, pattern: &Pattern) -> Vec<&FinancialRecord> {
        self.doc(doc)
            .iter()
            .filter(|r| pattern.matches(&r.account_code))
            .collect()
    }

    pub fn all_amounts(&self) -> Vec<f64> {
        self.by_doc
            .values()
            .flat_map(|recs| recs.iter().map(|r| r.amount))
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MatchRunSummary {
    pub matches_persisted: usize,
    pub rules_evaluated: usize,
    pub rules_skipped: usize,
}

#[derive(Debug, Clone)]
pub struct ValidationSummary {
    pub health_score: f64,
    pub discrepancies: usize,
}

pub struct SessionOrchestrator<'a> {
    store: &'a ReconStore,
    config: &'a ReconConfig,
}

impl<'a> SessionOrchestrator<'a> {
    pub fn new(store: &'a ReconStore, config: &'a ReconConfig) -> Self {
        Self { store, config }
    }

    /// Open a session for a scope. Refuses when no document type has
    /// any data — there is nothing to reconcile against.
    pub fn start_session(
        &self,
        property_id: &PropertyId,
        period_id: &PeriodId,
    ) -> ReconResult<SessionRow> {
        if !self.store.has_any_records(property_id, period_id)? {
            return Err(ReconError::DataUnavailable {
                property_id: property_id.clone(),
                period_id: period_id.clone(),
            });
        }
        let session_id = format!("RS-{}", Uuid::new_v4());
        self.store.insert_session(&session_id, property_id, period_id)?;
        log::info!("session {session_id} started for {property_id}/{period_id}");
        self.store.get_session(&session_id)
    }

    /// Run all four matching engines and the full rule registry, and
    /// persist every result in one transaction. Idempotent: matches
    /// upsert by record pair, rule results by rule id.
    pub fn find_all_matches(&self, session: &SessionRow) -> ReconResult<MatchRunSummary> {
        self.ensure_in_progress(session)?;
        let (current, prior) = self.load_window(session)?;

        // Engines are pure; everything below the transaction boundary
        // is just writes.
        let mut matches: Vec<MatchResult> = Vec::new();
        let exact = ExactMatchEngine::new(&self.config.matching);
        let fuzzy = FuzzyMatchEngine::new(&self.config.matching);
        let inferred = InferredMatchEngine::new(&self.config.matching);
        let history = self.load_history(&session.property_id)?;

        for (source_doc, target_doc) in MATCH_SURFACES {
            let source = current.doc(source_doc);
            let target = current.doc(target_doc);
            if source.is_empty() || target.is_empty() {
                continue;
            }
            matches.extend(exact.find_matches(source, target));
            matches.extend(fuzzy.find_matches(source, target));
            matches.extend(inferred.find_matches(source, target, &history));
        }

        let calculated = CalculatedMatchEngine::new(&self.config.calculated_checks);
        matches.extend(calculated.run_checks(&current));

        let rules = build_rules(self.config);
        let ctx = RuleContext {
            property_id: &session.property_id,
            period_id: &session.period_id,
            current: &current,
            prior: prior.as_ref(),
            materiality: &self.config.materiality,
        };
        let results: Vec<_> = rules.iter().map(|r| r.evaluate(&ctx)).collect();

        // Engines may propose the same record pair (exact and inferred
        // often do). Keep the strongest proposal per pair; persisting
        // them all would let a weaker engine overwrite a stronger one
        // through the upsert.
        let mut by_pair: HashMap<(String, String), MatchResult> = HashMap::new();
        for m in matches {
            let key = (m.source_record_id.clone(), m.target_record_id.clone());
            match by_pair.get(&key) {
                Some(existing) if existing.confidence >= m.confidence => {}
                _ => {
                    by_pair.insert(key, m);
                }
            }
        }

        let tx = self.store.begin()?;
        let mut persisted = 0usize;
        for m in by_pair.values() {
            self.store.upsert_match(&MatchRow {
                match_id: format!("M-{}", Uuid::new_v4()),
                session_id: session.session_id.clone(),
                source_doc_type: m.source_doc_type.as_str().into(),
                source_record_id: m.source_record_id.clone(),
                target_doc_type: m.target_doc_type.as_str().into(),
                target_record_id: m.target_record_id.clone(),
                match_type: m.match_type.as_str().into(),
                confidence_score: m.confidence,
                amount_difference_pct: scoring::round2(m.amount_difference_pct),
                relationship_formula: m.relationship_formula.clone(),
                status: "pending".into(),
                reviewed_by: None,
                reviewed_at: None,
                review_notes: None,
            })?;
            persisted += 1;
        }
        let mut skipped = 0usize;
        for result in &results {
            if result.status == RuleStatus::Skip {
                skipped += 1;
            }
            self.store.upsert_recon_result(&session.session_id, result)?;
        }
        tx.commit()?;

        log::debug!(
            "session {}: {} matches, {} rules ({} skipped)",
            session.session_id,
            persisted,
            results.len(),
            skipped
        );
        Ok(MatchRunSummary {
            matches_persisted: persisted,
            rules_evaluated: results.len(),
            rules_skipped: skipped,
        })
    }

    /// Compute the weighted-pass-rate health score and regenerate the
    /// discrepancy set (delete-then-insert, one transaction).
    pub fn validate_matches(&self, session: &SessionRow) -> ReconResult<ValidationSummary> {
        self.ensure_in_progress(session)?;
        let results = self.store.results_for_session(&session.session_id)?;
        let matches = self.store.matches_for_session(&session.session_id)?;
        let rules = build_rules(self.config);
        let severity_of: HashMap<String, &'static str> = rules
            .iter()
            .map(|r| (r.rule_id().to_string(), r.severity().as_str()))
            .collect();

        // PASS 1.0, WARNING 0.5, FAIL 0.0; INFO and SKIP are ungraded.
        let mut weight = 0.0f64;
        let mut earned = 0.0f64;
        for r in &results {
            match RuleStatus::parse(&r.status) {
                Some(RuleStatus::Pass) => {
                    weight += 1.0;
                    earned += 1.0;
                }
                Some(RuleStatus::Warning) => {
                    weight += 1.0;
                    earned += 0.5;
                }
                Some(RuleStatus::Fail) => {
                    weight += 1.0;
                }
                _ => {}
            }
        }
        let health_score = if weight > 0.0 {
            scoring::round2(earned / weight * 100.0)
        } else {
            100.0
        };

        let mut discrepancies: Vec<DiscrepancyRow> = Vec::new();
        for r in &results {
            let status = RuleStatus::parse(&r.status);
            let severity = match status {
                Some(RuleStatus::Fail) => {
                    severity_of.get(&r.rule_id).copied().unwrap_or("high")
                }
                Some(RuleStatus::Warning) => "medium",
                _ => continue,
            };
            let variance_pct = match (r.source_value, r.target_value) {
                (Some(s), Some(t)) => {
                    Some(scoring::round2(scoring::amount_difference_pct(s, t)))
                }
                _ => None,
            };
            discrepancies.push(DiscrepancyRow {
                discrepancy_id: format!("D-{}", Uuid::new_v4()),
                session_id: session.session_id.clone(),
                match_id: None,
                rule_id: Some(r.rule_id.clone()),
                severity: severity.to_string(),
                status: "open".into(),
                description: r.explanation.clone(),
                variance_pct,
                resolved_by: None,
                resolved_at: None,
                resolution_notes: None,
            });
        }
        for m in &matches {
            if m.status == "pending"
                && m.amount_difference_pct > self.config.matching.discrepancy_variance_pct
            {
                let severity = if m.amount_difference_pct >= 10.0 {
                    "high"
                } else if m.amount_difference_pct >= 5.0 {
                    "medium"
                } else {
                    "low"
                };
                discrepancies.push(DiscrepancyRow {
                    discrepancy_id: format!("D-{}", Uuid::new_v4()),
                    session_id: session.session_id.clone(),
                    match_id: Some(m.match_id.clone()),
                    rule_id: None,
                    severity: severity.into(),
                    status: "open".into(),
                    description: format!(
                        "{} variance {:.2}% on {}",
                        m.match_type, m.amount_difference_pct, m.relationship_formula
                    ),
                    variance_pct: Some(m.amount_difference_pct),
                    resolved_by: None,
                    resolved_at: None,
                    resolution_notes: None,
                });
            }
        }

        let tx = self.store.begin()?;
        self.store.delete_discrepancies_for_session(&session.session_id)?;
        for d in &discrepancies {
            self.store.insert_discrepancy(d)?;
        }
        self.store.set_session_health_score(&session.session_id, health_score)?;
        tx.commit()?;

        log::info!(
            "session {}: health {health_score:.2}, {} discrepancies",
            session.session_id,
            discrepancies.len()
        );
        Ok(ValidationSummary {
            health_score,
            discrepancies: discrepancies.len(),
        })
    }

    /// Close out a session after review. Only an in-progress session
    /// can be approved; approval is terminal.
    pub fn approve_session(&self, session_id: &str) -> ReconResult<SessionRow> {
        let session = self.store.get_session(session_id)?;
        if session.status != "in_progress" {
            return Err(ReconError::SessionState {
                session_id: session_id.to_string(),
                status: session.status,
                expected: "in_progress".into(),
            });
        }
        self.store.approve_session(session_id)?;
        log::info!("session {session_id} approved");
        self.store.get_session(session_id)
    }

    fn ensure_in_progress(&self, session: &SessionRow) -> ReconResult<()> {
        // Re-read: the caller may hold a stale row.
        let fresh = self.store.get_session(&session.session_id)?;
        if fresh.status != "in_progress" {
            return Err(ReconError::SessionState {
                session_id: session.session_id.clone(),
                status: fresh.status,
                expected: "in_progress".into(),
            });
        }
        Ok(())
    }

    fn load_window(
        &self,
        session: &SessionRow,
    ) -> ReconResult<(PeriodRecords, Option<PeriodRecords>)> {
        let current = PeriodRecords::from_records(
            self.store
                .records_for_scope(&session.property_id, &session.period_id)?,
        );
        let prior = match self.store.prior_period_id(&session.period_id)? {
            Some(prior_id) => {
                let recs = self
                    .store
                    .records_for_scope(&session.property_id, &prior_id)?;
                if recs.is_empty() {
                    None
                } else {
                    Some(PeriodRecords::from_records(recs))
                }
            }
            None => None,
        };
        Ok((current, prior))
    }

    fn load_history(&self, property_id: &str) -> ReconResult<MatchHistory> {
        let mut history = MatchHistory::default();
        for (source_code, target_code, accuracy) in
            self.store.approved_match_pairs(property_id)?
        {
            history.insert(&source_code, &target_code, accuracy);
        }
        Ok(history)
    }
}
