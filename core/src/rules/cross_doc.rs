//! Cross-document tie-outs: the configured accounting identities
//! re-expressed as pass/fail rules under their materiality bands.
//!
//! Grading: within tolerance → PASS. A breach of an absolute (exact
//! identity) band is always FAIL. A percentage/greater-of band — used
//! where timing noise is expected — grades WARNING up to twice its
//! threshold and FAIL beyond that.

use crate::config::MaterialityPolicy;
use crate::matching::calculated::{CheckSpec, Relationship};

use super::{ReconciliationResult, Rule, RuleContext, RuleSeverity, RuleStatus};

pub struct TieOutRule {
    rule_id: String,
    check: CheckSpec,
}

impl TieOutRule {
    pub fn new(check: CheckSpec) -> Self {
        Self {
            rule_id: format!("tie-{}", check.check_id),
            check,
        }
    }

    /// The unreconciled signed variance (source − target), if both
    /// sides have data. Reused by the non-cash-journal screen.
    pub fn variance(check: &CheckSpec, ctx: &RuleContext<'_>) -> Option<(f64, f64, f64)> {
        let (source_ref, target_ref) = match &check.relationship {
            Relationship::Equality { source, target } => (source, target),
            Relationship::Sum { source, targets } => (source, targets),
        };
        let source_recs = ctx.current.select(source_ref.doc, &source_ref.pattern);
        let target_recs = ctx.current.select(target_ref.doc, &target_ref.pattern);
        if source_recs.is_empty() || target_recs.is_empty() {
            return None;
        }
        let s: f64 = source_recs.iter().map(|r| r.amount).sum();
        let t: f64 = target_recs.iter().map(|r| r.amount).sum();
        Some((s, t, s - t))
    }
}

impl Rule for TieOutRule {
    fn rule_id(&self) -> &str {
        &self.rule_id
    }

    fn severity(&self) -> RuleSeverity {
        match self.check.tolerance {
            MaterialityPolicy::Absolute(_) => RuleSeverity::High,
            _ => RuleSeverity::Medium,
        }
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> ReconciliationResult {
        let Some((source_value, target_value, diff)) = Self::variance(&self.check, ctx)
        else {
            return ReconciliationResult::skip(
                self.rule_id(),
                "one or both sides have no data",
            );
        };

        let threshold = self.check.tolerance.threshold_for(source_value);
        let status = if diff.abs() <= threshold {
            RuleStatus::Pass
        } else {
            match self.check.tolerance {
                MaterialityPolicy::Absolute(_) => RuleStatus::Fail,
                _ if diff.abs() <= threshold * 2.0 => RuleStatus::Warning,
                _ => RuleStatus::Fail,
            }
        };

        ReconciliationResult {
            rule_id: self.rule_id().to_string(),
            status,
            source_value: Some(source_value),
            target_value: Some(target_value),
            difference: Some(diff),
            threshold: Some(threshold),
            explanation: format!(
                "{}: {source_value:.2} vs {target_value:.2}",
                self.check.relationship.formula()
            ),
        }
    }
}
