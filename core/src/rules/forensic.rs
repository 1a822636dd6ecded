//! Statistical and forensic screens built on the rule primitives.
//!
//! These never prove manipulation; they grade how much a period's
//! figures deviate from what organic bookkeeping produces. Each screen
//! SKIPs when its sample is too thin to mean anything.

use std::collections::HashMap;

use crate::config::MaterialityPolicy;
use crate::matching::calculated::{AccountRef, CheckSpec, Pattern, Relationship};
use crate::record::DocumentType;

use super::cross_doc::TieOutRule;
use super::{ReconciliationResult, Rule, RuleContext, RuleSeverity, RuleStatus};

// ── Duplicate round numbers ────────────────────────────────────────

/// Three or more postings of one identical round amount at or above the
/// floor. Fabricated entries cluster on round figures; organic ones
/// rarely repeat them exactly.
pub struct RoundNumberClusterRule;

impl Rule for RoundNumberClusterRule {
    fn rule_id(&self) -> &str {
        "forensic-round-numbers"
    }

    fn severity(&self) -> RuleSeverity {
        RuleSeverity::Medium
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> ReconciliationResult {
        let amounts = ctx.current.all_amounts();
        if amounts.is_empty() {
            return ReconciliationResult::skip(self.rule_id(), "no records");
        }

        let floor = ctx.materiality.round_amount_floor;
        let cluster_size = ctx.materiality.round_cluster_size;
        let mut counts: HashMap<i64, usize> = HashMap::new();
        for amount in &amounts {
            let a = amount.abs();
            if a < floor {
                continue;
            }
            // Round = whole multiple of $100.
            let cents = (a * 100.0).round() as i64;
            if cents % 10_000 != 0 {
                continue;
            }
            *counts.entry(cents).or_insert(0) += 1;
        }

        let clusters: Vec<(f64, usize)> = counts
            .into_iter()
            .filter(|(_, n)| *n >= cluster_size)
            .map(|(cents, n)| (cents as f64 / 100.0, n))
            .collect();

        if clusters.is_empty() {
            return ReconciliationResult {
                rule_id: self.rule_id().to_string(),
                status: RuleStatus::Pass,
                source_value: Some(amounts.len() as f64),
                target_value: None,
                difference: None,
                threshold: Some(cluster_size as f64),
                explanation: "no duplicate round-number clusters".into(),
            };
        }

        let worst = clusters
            .iter()
            .max_by_key(|(_, n)| *n)
            .copied()
            .unwrap_or((0.0, 0));
        ReconciliationResult {
            rule_id: self.rule_id().to_string(),
            status: RuleStatus::Warning,
            source_value: Some(worst.1 as f64),
            target_value: Some(worst.0),
            difference: None,
            threshold: Some(cluster_size as f64),
            explanation: format!(
                "{} cluster(s); worst: {} postings of {:.2}",
                clusters.len(),
                worst.1,
                worst.0
            ),
        }
    }
}

// ── Benford's Law ──────────────────────────────────────────────────

/// Mean absolute deviation of the first-significant-digit distribution
/// from log10(1 + 1/d). Needs a minimum sample; small periods SKIP.
pub struct BenfordRule;

impl BenfordRule {
    pub fn mad(amounts: &[f64]) -> Option<f64> {
        let mut digit_counts = [0usize; 9];
        let mut total = 0usize;
        for amount in amounts {
            if let Some(d) = first_digit(*amount) {
                digit_counts[d - 1] += 1;
                total += 1;
            }
        }
        if total == 0 {
            return None;
        }
        let mut mad = 0.0;
        for (i, count) in digit_counts.iter().enumerate() {
            let observed = *count as f64 / total as f64;
            let expected = (1.0 + 1.0 / (i as f64 + 1.0)).log10();
            mad += (observed - expected).abs();
        }
        Some(mad / 9.0)
    }
}

impl Rule for BenfordRule {
    fn rule_id(&self) -> &str {
        "forensic-benford"
    }

    fn severity(&self) -> RuleSeverity {
        RuleSeverity::High
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> ReconciliationResult {
        // Qualifying items: at least a dollar in magnitude.
        let amounts: Vec<f64> = ctx
            .current
            .all_amounts()
            .into_iter()
            .filter(|a| a.abs() >= 1.0)
            .collect();

        let min_items = ctx.materiality.benford_min_items;
        if amounts.len() < min_items {
            return ReconciliationResult::skip(
                self.rule_id(),
                &format!("{} qualifying items, need {min_items}", amounts.len()),
            );
        }

        let mad = match Self::mad(&amounts) {
            Some(m) => m,
            None => {
                return ReconciliationResult::skip(self.rule_id(), "no leading digits")
            }
        };
        let threshold = ctx.materiality.benford_mad;
        let status = if mad <= threshold {
            RuleStatus::Pass
        } else {
            RuleStatus::Fail
        };
        ReconciliationResult {
            rule_id: self.rule_id().to_string(),
            status,
            source_value: Some(mad),
            target_value: None,
            difference: None,
            threshold: Some(threshold),
            explanation: format!("MAD {mad:.4} over {} items", amounts.len()),
        }
    }
}

fn first_digit(amount: f64) -> Option<usize> {
    let mut a = amount.abs();
    if a < f64::EPSILON {
        return None;
    }
    while a >= 10.0 {
        a /= 10.0;
    }
    while a < 1.0 {
        a *= 10.0;
    }
    Some(a as usize)
}

// ── Appearance / disappearance ─────────────────────────────────────

/// Balance-sheet accounts whose balance crosses zero across the
/// prior→current window. A disappearing balance is the stronger signal.
pub struct AppearanceRule;

impl Rule for AppearanceRule {
    fn rule_id(&self) -> &str {
        "forensic-appearance"
    }

    fn severity(&self) -> RuleSeverity {
        RuleSeverity::Low
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> ReconciliationResult {
        let Some(prior) = ctx.prior else {
            return ReconciliationResult::skip(self.rule_id(), "no prior period");
        };
        let current = ctx.current.doc(DocumentType::BalanceSheet);
        let prior_bs = prior.doc(DocumentType::BalanceSheet);
        if current.is_empty() && prior_bs.is_empty() {
            return ReconciliationResult::skip(self.rule_id(), "no balance sheet data");
        }

        let level = |recs: &[crate::record::FinancialRecord]| -> HashMap<String, f64> {
            recs.iter()
                .map(|r| (r.account_code.clone(), r.amount))
                .collect()
        };
        let cur = level(current);
        let pri = level(prior_bs);

        let mut appeared = Vec::new();
        let mut disappeared = Vec::new();
        for (code, amount) in &cur {
            let before = pri.get(code).copied().unwrap_or(0.0);
            if before.abs() < 0.005 && amount.abs() >= 0.005 {
                appeared.push(code.clone());
            }
        }
        for (code, before) in &pri {
            let now = cur.get(code).copied().unwrap_or(0.0);
            if before.abs() >= 0.005 && now.abs() < 0.005 {
                disappeared.push(code.clone());
            }
        }
        appeared.sort();
        disappeared.sort();

        let status = if !disappeared.is_empty() {
            RuleStatus::Warning
        } else if !appeared.is_empty() {
            RuleStatus::Info
        } else {
            RuleStatus::Pass
        };
        ReconciliationResult {
            rule_id: self.rule_id().to_string(),
            status,
            source_value: Some(appeared.len() as f64),
            target_value: Some(disappeared.len() as f64),
            difference: None,
            threshold: None,
            explanation: format!(
                "appeared: [{}]; disappeared: [{}]",
                appeared.join(", "),
                disappeared.join(", ")
            ),
        }
    }
}

// ── Non-cash journal detection ─────────────────────────────────────

/// Composes the unreconciled cash variance with a search over
/// balance-sheet levels and deltas within ±$1 of it. A hit suggests an
/// entry that moved cash on paper without a cash-flow line.
pub struct NonCashJournalRule;

impl NonCashJournalRule {
    fn cash_check() -> CheckSpec {
        CheckSpec {
            check_id: "cash-reconciliation".into(),
            relationship: Relationship::Equality {
                source: AccountRef {
                    doc: DocumentType::BalanceSheet,
                    pattern: Pattern::Exact("1010".into()),
                },
                target: AccountRef {
                    doc: DocumentType::CashFlow,
                    pattern: Pattern::Exact("1999".into()),
                },
            },
            tolerance: MaterialityPolicy::Absolute(0.01),
        }
    }
}

impl Rule for NonCashJournalRule {
    fn rule_id(&self) -> &str {
        "forensic-non-cash-journal"
    }

    fn severity(&self) -> RuleSeverity {
        RuleSeverity::High
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> ReconciliationResult {
        let check = Self::cash_check();
        let Some((bs_cash, cf_cash, variance)) = TieOutRule::variance(&check, ctx) else {
            return ReconciliationResult::skip(self.rule_id(), "cash sides unavailable");
        };

        if variance.abs() <= 1.0 {
            return ReconciliationResult {
                rule_id: self.rule_id().to_string(),
                status: RuleStatus::Pass,
                source_value: Some(bs_cash),
                target_value: Some(cf_cash),
                difference: Some(variance),
                threshold: Some(1.0),
                explanation: "cash reconciles within $1".into(),
            };
        }

        // Candidate explanations: a BS level, or a BS delta against the
        // prior period, within a dollar of the variance.
        let mut suggestion: Option<String> = None;
        let bs = ctx.current.doc(DocumentType::BalanceSheet);
        for rec in bs {
            if rec.account_code == "1010" {
                continue;
            }
            if (rec.amount.abs() - variance.abs()).abs() <= 1.0 {
                suggestion = Some(format!(
                    "level of {} ({})",
                    rec.account_code, rec.account_name
                ));
                break;
            }
        }
        if suggestion.is_none() {
            if let Some(prior) = ctx.prior {
                let prior_level: HashMap<&str, f64> = prior
                    .doc(DocumentType::BalanceSheet)
                    .iter()
                    .map(|r| (r.account_code.as_str(), r.amount))
                    .collect();
                for rec in bs {
                    let delta =
                        rec.amount - prior_level.get(rec.account_code.as_str()).copied().unwrap_or(0.0);
                    if rec.account_code != "1010" && (delta.abs() - variance.abs()).abs() <= 1.0 {
                        suggestion = Some(format!(
                            "delta of {} ({})",
                            rec.account_code, rec.account_name
                        ));
                        break;
                    }
                }
            }
        }

        let (status, explanation) = match suggestion {
            Some(s) => (
                RuleStatus::Info,
                format!("cash variance {variance:.2} likely explained by {s}"),
            ),
            None => (
                RuleStatus::Warning,
                format!("cash variance {variance:.2} has no candidate explanation"),
            ),
        };
        ReconciliationResult {
            rule_id: self.rule_id().to_string(),
            status,
            source_value: Some(bs_cash),
            target_value: Some(cf_cash),
            difference: Some(variance),
            threshold: Some(1.0),
            explanation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_digit_handles_magnitudes_and_fractions() {
        assert_eq!(first_digit(9_312.0), Some(9));
        assert_eq!(first_digit(0.042), Some(4));
        assert_eq!(first_digit(1.0), Some(1));
        assert_eq!(first_digit(0.0), None);
        assert_eq!(first_digit(-250.0), Some(2));
    }

    #[test]
    fn benford_mad_near_zero_for_ideal_distribution() {
        // 100 amounts whose first digits follow Benford exactly.
        let counts = [30, 18, 12, 10, 8, 7, 6, 5, 4];
        let mut amounts = Vec::new();
        for (i, n) in counts.iter().enumerate() {
            for k in 0..*n {
                amounts.push(((i + 1) as f64) * 100.0 + k as f64);
            }
        }
        let mad = BenfordRule::mad(&amounts).unwrap();
        assert!(mad < 0.015, "MAD {mad} should be under threshold");
    }

    #[test]
    fn benford_mad_large_when_all_nines() {
        let amounts: Vec<f64> = (0..50).map(|i| 9_000.0 + i as f64).collect();
        let mad = BenfordRule::mad(&amounts).unwrap();
        assert!(mad > 0.015, "MAD {mad} should exceed threshold");
    }
}
