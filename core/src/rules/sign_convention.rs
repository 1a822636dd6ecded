//! Working-capital sign-convention tests.
//!
//! Convention: an asset increase consumes cash, so the cash-flow
//! adjustment for an asset account must equal the NEGATIVE of its
//! balance-sheet delta over the prior→current window. A liability's
//! adjustment equals the delta directly. Both documents carry the same
//! account code for a working-capital item, which is what aligns the
//! window.

use crate::matching::calculated::Pattern;
use crate::record::DocumentType;

use super::{ReconciliationResult, Rule, RuleContext, RuleSeverity, RuleStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkingCapitalKind {
    Asset,
    Liability,
}

#[derive(Debug, Clone, Copy)]
pub struct WorkingCapitalItem {
    pub slug: &'static str,
    pub account_code: &'static str,
    pub kind: WorkingCapitalKind,
}

/// The fixed taxonomy. One rule per entry.
pub const WORKING_CAPITAL_TAXONOMY: [WorkingCapitalItem; 5] = [
    WorkingCapitalItem {
        slug: "accounts-receivable",
        account_code: "1100",
        kind: WorkingCapitalKind::Asset,
    },
    WorkingCapitalItem {
        slug: "prepaid-expenses",
        account_code: "1200",
        kind: WorkingCapitalKind::Asset,
    },
    WorkingCapitalItem {
        slug: "accounts-payable",
        account_code: "2100",
        kind: WorkingCapitalKind::Liability,
    },
    WorkingCapitalItem {
        slug: "accrued-liabilities",
        account_code: "2200",
        kind: WorkingCapitalKind::Liability,
    },
    WorkingCapitalItem {
        slug: "security-deposits",
        account_code: "2300",
        kind: WorkingCapitalKind::Liability,
    },
];

pub struct SignConventionRule {
    rule_id: String,
    item: WorkingCapitalItem,
}

impl SignConventionRule {
    pub fn new(item: WorkingCapitalItem) -> Self {
        Self {
            rule_id: format!("sign-{}", item.slug),
            item,
        }
    }
}

impl Rule for SignConventionRule {
    fn rule_id(&self) -> &str {
        &self.rule_id
    }

    fn severity(&self) -> RuleSeverity {
        RuleSeverity::High
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> ReconciliationResult {
        let Some(prior) = ctx.prior else {
            return ReconciliationResult::skip(self.rule_id(), "no prior period");
        };
        let pattern = Pattern::Exact(self.item.account_code.into());

        let current_bs = ctx.current.select(DocumentType::BalanceSheet, &pattern);
        let prior_bs = prior.select(DocumentType::BalanceSheet, &pattern);
        let cf_adj = ctx.current.select(DocumentType::CashFlow, &pattern);

        let (Some(cur), Some(pri), Some(adj)) =
            (current_bs.first(), prior_bs.first(), cf_adj.first())
        else {
            return ReconciliationResult::skip(
                self.rule_id(),
                "account missing on one side of the window",
            );
        };

        let delta = cur.amount - pri.amount;
        let expected = match self.item.kind {
            WorkingCapitalKind::Asset => -delta,
            WorkingCapitalKind::Liability => delta,
        };

        let policy = &ctx.materiality.sign_convention;
        let threshold = policy.threshold_for(expected);
        let difference = adj.amount - expected;
        let status = if difference.abs() <= threshold {
            RuleStatus::Pass
        } else {
            RuleStatus::Fail
        };

        ReconciliationResult {
            rule_id: self.rule_id().to_string(),
            status,
            source_value: Some(adj.amount),
            target_value: Some(expected),
            difference: Some(difference),
            threshold: Some(threshold),
            explanation: format!(
                "CF adjustment {:.2} vs expected {expected:.2} (BS delta {delta:.2}, {:?})",
                adj.amount, self.item.kind
            ),
        }
    }
}
