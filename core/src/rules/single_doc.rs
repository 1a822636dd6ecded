//! Single-document sanity checks.

use crate::matching::calculated::Pattern;
use crate::record::DocumentType;

use super::{ReconciliationResult, Rule, RuleContext, RuleSeverity, RuleStatus};

/// Assets = Liabilities + Equity, within the balance-sheet band.
pub struct BalanceSheetEquationRule;

impl Rule for BalanceSheetEquationRule {
    fn rule_id(&self) -> &str {
        "bs-equation"
    }

    fn severity(&self) -> RuleSeverity {
        RuleSeverity::Critical
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> ReconciliationResult {
        let bs = ctx.current.doc(DocumentType::BalanceSheet);
        if bs.is_empty() {
            return ReconciliationResult::skip(self.rule_id(), "no balance sheet data");
        }
        let assets = sum_prefix(ctx, "1");
        // Debt codes (25-27) sit inside the liability range.
        let liabilities = sum_prefix(ctx, "2");
        let equity = sum_prefix(ctx, "3");
        let rhs = liabilities + equity;

        let policy = &ctx.materiality.balance_sheet_equation;
        let threshold = policy.threshold_for(assets);
        let difference = assets - rhs;
        let status = if policy.within(assets, rhs) {
            RuleStatus::Pass
        } else {
            RuleStatus::Fail
        };
        ReconciliationResult {
            rule_id: self.rule_id().to_string(),
            status,
            source_value: Some(assets),
            target_value: Some(rhs),
            difference: Some(difference),
            threshold: Some(threshold),
            explanation: format!(
                "assets {assets:.2} vs liabilities+equity {rhs:.2}"
            ),
        }
    }
}

/// Cash on the balance sheet must not be negative.
pub struct NonNegativeCashRule;

impl Rule for NonNegativeCashRule {
    fn rule_id(&self) -> &str {
        "bs-non-negative-cash"
    }

    fn severity(&self) -> RuleSeverity {
        RuleSeverity::High
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> ReconciliationResult {
        let cash = ctx
            .current
            .select(DocumentType::BalanceSheet, &Pattern::Exact("1010".into()));
        let Some(rec) = cash.first() else {
            return ReconciliationResult::skip(self.rule_id(), "no cash account");
        };
        let status = if rec.amount >= 0.0 {
            RuleStatus::Pass
        } else {
            RuleStatus::Fail
        };
        ReconciliationResult {
            rule_id: self.rule_id().to_string(),
            status,
            source_value: Some(rec.amount),
            target_value: None,
            difference: None,
            threshold: Some(0.0),
            explanation: format!("cash balance {:.2}", rec.amount),
        }
    }
}

fn sum_prefix(ctx: &RuleContext<'_>, prefix: &str) -> f64 {
    ctx.current
        .select(DocumentType::BalanceSheet, &Pattern::Prefix(prefix.into()))
        .iter()
        .map(|r| r.amount)
        .sum()
}
