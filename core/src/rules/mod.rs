//! Declarative rule engine.
//!
//! RULE: a rule is one independent object implementing `Rule`; the
//! registry composes them and the orchestrator runs them. No rule
//! mutates anything — evaluation is a pure function of the context —
//! and no rule failure aborts a session.
//!
//! Missing data is never an inconsistency: a rule that cannot resolve a
//! required side or prior period returns SKIP, not FAIL.

pub mod cross_doc;
pub mod forensic;
pub mod sign_convention;
pub mod single_doc;

use crate::config::{MaterialityTable, ReconConfig};
use crate::session::PeriodRecords;
use crate::types::{PeriodId, PropertyId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleStatus {
    Pass,
    Fail,
    Warning,
    Info,
    Skip,
}

impl RuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleStatus::Pass => "PASS",
            RuleStatus::Fail => "FAIL",
            RuleStatus::Warning => "WARNING",
            RuleStatus::Info => "INFO",
            RuleStatus::Skip => "SKIP",
        }
    }

    pub fn parse(s: &str) -> Option<RuleStatus> {
        match s {
            "PASS" => Some(RuleStatus::Pass),
            "FAIL" => Some(RuleStatus::Fail),
            "WARNING" => Some(RuleStatus::Warning),
            "INFO" => Some(RuleStatus::Info),
            "SKIP" => Some(RuleStatus::Skip),
            _ => None,
        }
    }
}

/// Severity a rule's failures carry into discrepancies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSeverity {
    Critical,
    High,
    Medium,
    Low,
}

impl RuleSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleSeverity::Critical => "critical",
            RuleSeverity::High => "high",
            RuleSeverity::Medium => "medium",
            RuleSeverity::Low => "low",
        }
    }
}

/// One rule evaluation. Fully regenerated per run; the store upserts by
/// (session, rule_id) so re-runs replace rather than append.
#[derive(Debug, Clone)]
pub struct ReconciliationResult {
    pub rule_id: String,
    pub status: RuleStatus,
    pub source_value: Option<f64>,
    pub target_value: Option<f64>,
    pub difference: Option<f64>,
    pub threshold: Option<f64>,
    pub explanation: String,
}

impl ReconciliationResult {
    pub fn skip(rule_id: &str, why: &str) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            status: RuleStatus::Skip,
            source_value: None,
            target_value: None,
            difference: None,
            threshold: None,
            explanation: why.to_string(),
        }
    }
}

/// Everything a rule may look at. Built once per run by the
/// orchestrator; rules never touch the store.
pub struct RuleContext<'a> {
    pub property_id: &'a PropertyId,
    pub period_id: &'a PeriodId,
    pub current: &'a PeriodRecords,
    /// Prior period, when one exists. Rules needing a window SKIP
    /// without it.
    pub prior: Option<&'a PeriodRecords>,
    pub materiality: &'a MaterialityTable,
}

pub trait Rule: Send {
    /// Stable identifier, also the upsert key for persisted results.
    fn rule_id(&self) -> &str;

    /// Severity of this rule's failures when materialized as a
    /// discrepancy.
    fn severity(&self) -> RuleSeverity {
        RuleSeverity::Medium
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> ReconciliationResult;
}

/// Build the full registry for a configuration: single-document sanity,
/// one tie-out per configured identity, the sign-convention taxonomy,
/// and the forensic screens.
pub fn build_rules(config: &ReconConfig) -> Vec<Box<dyn Rule>> {
    let mut rules: Vec<Box<dyn Rule>> = vec![
        Box::new(single_doc::BalanceSheetEquationRule),
        Box::new(single_doc::NonNegativeCashRule),
    ];
    for check in &config.calculated_checks {
        rules.push(Box::new(cross_doc::TieOutRule::new(check.clone())));
    }
    for item in sign_convention::WORKING_CAPITAL_TAXONOMY {
        rules.push(Box::new(sign_convention::SignConventionRule::new(item)));
    }
    rules.push(Box::new(forensic::RoundNumberClusterRule));
    rules.push(Box::new(forensic::BenfordRule));
    rules.push(Box::new(forensic::AppearanceRule));
    rules.push(Box::new(forensic::NonCashJournalRule));
    rules
}
