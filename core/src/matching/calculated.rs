//! Calculated engine: evaluates accounting identities declared as data.
//!
//! A check is `DOC.account = DOC.account` (equality) or
//! `DOC.account = SUM(DOC.accounts)` (aggregation) over exact codes or
//! code prefixes. The ten standard checks are configuration entries in
//! `CheckSpec::standard_checks`, not code paths — adding an identity
//! means adding a row. A malformed entry is logged and skipped; the run
//! continues.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::MaterialityPolicy;
use crate::error::{ReconError, ReconResult};
use crate::record::DocumentType;
use crate::scoring;
use crate::session::PeriodRecords;

use super::{MatchResult, MatchType};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    Exact(String),
    Prefix(String),
}

impl Pattern {
    pub fn matches(&self, code: &str) -> bool {
        match self {
            Pattern::Exact(c) => code == c,
            Pattern::Prefix(p) => code.starts_with(p.as_str()),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Pattern::Exact(c) | Pattern::Prefix(c) => c.trim().is_empty(),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Exact(c) => write!(f, "{c}"),
            Pattern::Prefix(p) => write!(f, "{p}*"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRef {
    pub doc: DocumentType,
    pub pattern: Pattern,
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.doc.as_str(), self.pattern)
    }
}

/// Tagged relationship built at configuration time. No free-text formula
/// parsing happens at evaluation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    Equality { source: AccountRef, target: AccountRef },
    Sum { source: AccountRef, targets: AccountRef },
}

impl Relationship {
    pub fn formula(&self) -> String {
        match self {
            Relationship::Equality { source, target } => format!("{source} = {target}"),
            Relationship::Sum { source, targets } => format!("{source} = SUM({targets})"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckSpec {
    pub check_id: String,
    pub relationship: Relationship,
    pub tolerance: MaterialityPolicy,
}

impl CheckSpec {
    /// The standard cross-document identity table.
    pub fn standard_checks() -> Vec<CheckSpec> {
        use DocumentType::*;
        let exact = |doc, code: &str| AccountRef {
            doc,
            pattern: Pattern::Exact(code.into()),
        };
        let prefix = |doc, p: &str| AccountRef {
            doc,
            pattern: Pattern::Prefix(p.into()),
        };
        vec![
            CheckSpec {
                check_id: "net-income-flow".into(),
                relationship: Relationship::Equality {
                    source: exact(IncomeStatement, "3900"),
                    target: exact(CashFlow, "3900"),
                },
                tolerance: MaterialityPolicy::Absolute(0.01),
            },
            CheckSpec {
                check_id: "depreciation-tie".into(),
                relationship: Relationship::Equality {
                    source: exact(IncomeStatement, "5700"),
                    target: exact(CashFlow, "5700"),
                },
                tolerance: MaterialityPolicy::Absolute(0.01),
            },
            CheckSpec {
                check_id: "amortization-tie".into(),
                relationship: Relationship::Equality {
                    source: exact(IncomeStatement, "5710"),
                    target: exact(CashFlow, "5710"),
                },
                tolerance: MaterialityPolicy::Absolute(0.01),
            },
            CheckSpec {
                check_id: "cash-reconciliation".into(),
                relationship: Relationship::Equality {
                    source: exact(BalanceSheet, "1010"),
                    target: exact(CashFlow, "1999"),
                },
                tolerance: MaterialityPolicy::Absolute(0.01),
            },
            CheckSpec {
                check_id: "mortgage-principal".into(),
                relationship: Relationship::Sum {
                    source: prefix(BalanceSheet, "25"),
                    targets: prefix(MortgageStatement, "PRIN"),
                },
                tolerance: MaterialityPolicy::Percent(0.5),
            },
            CheckSpec {
                check_id: "escrow-balance".into(),
                relationship: Relationship::Sum {
                    source: exact(BalanceSheet, "1300"),
                    targets: prefix(MortgageStatement, "ESC"),
                },
                tolerance: MaterialityPolicy::Percent(1.0),
            },
            CheckSpec {
                check_id: "rent-to-revenue".into(),
                relationship: Relationship::Sum {
                    source: exact(IncomeStatement, "4010"),
                    targets: prefix(RentRoll, "RENT-"),
                },
                tolerance: MaterialityPolicy::Percent(2.0),
            },
            CheckSpec {
                check_id: "security-deposits".into(),
                relationship: Relationship::Sum {
                    source: exact(BalanceSheet, "2300"),
                    targets: prefix(RentRoll, "DEP-"),
                },
                tolerance: MaterialityPolicy::Percent(1.0),
            },
            CheckSpec {
                check_id: "interest-expense".into(),
                relationship: Relationship::Sum {
                    source: exact(IncomeStatement, "5800"),
                    targets: prefix(MortgageStatement, "INT"),
                },
                tolerance: MaterialityPolicy::GreaterOf {
                    absolute: 5.0,
                    percent: 1.0,
                },
            },
            CheckSpec {
                check_id: "debt-service".into(),
                relationship: Relationship::Sum {
                    source: exact(CashFlow, "3100"),
                    targets: prefix(MortgageStatement, "PMT-PRIN"),
                },
                tolerance: MaterialityPolicy::GreaterOf {
                    absolute: 5.0,
                    percent: 1.0,
                },
            },
        ]
    }

    fn validate(&self) -> ReconResult<()> {
        let bad = |reason: &str| {
            Err(ReconError::Configuration {
                check_id: self.check_id.clone(),
                reason: reason.into(),
            })
        };
        if self.check_id.trim().is_empty() {
            return bad("empty check id");
        }
        match &self.relationship {
            Relationship::Equality { source, target } => {
                if source.pattern.is_empty() || target.pattern.is_empty() {
                    return bad("empty account pattern");
                }
            }
            Relationship::Sum { source, targets } => {
                if source.pattern.is_empty() || targets.pattern.is_empty() {
                    return bad("empty account pattern");
                }
            }
        }
        Ok(())
    }
}

pub struct CalculatedMatchEngine<'a> {
    checks: &'a [CheckSpec],
}

impl<'a> CalculatedMatchEngine<'a> {
    pub fn new(checks: &'a [CheckSpec]) -> Self {
        Self { checks }
    }

    /// Evaluate every configured identity against one period's records.
    /// Checks with no data on either side produce nothing (absence is
    /// not evidence); malformed checks are logged and skipped.
    pub fn run_checks(&self, records: &PeriodRecords) -> Vec<MatchResult> {
        let mut matches = Vec::new();
        for check in self.checks {
            if let Err(e) = check.validate() {
                log::warn!("skipping calculated check: {e}");
                continue;
            }
            if let Some(m) = self.evaluate(check, records) {
                matches.push(m);
            }
        }
        matches
    }

    fn evaluate(&self, check: &CheckSpec, records: &PeriodRecords) -> Option<MatchResult> {
        let (source_ref, target_ref) = match &check.relationship {
            Relationship::Equality { source, target } => (source, target),
            Relationship::Sum { source, targets } => (source, targets),
        };

        let source_recs = records.select(source_ref.doc, &source_ref.pattern);
        let target_recs = records.select(target_ref.doc, &target_ref.pattern);
        if source_recs.is_empty() || target_recs.is_empty() {
            return None;
        }

        let source_value: f64 = source_recs.iter().map(|r| r.amount).sum();
        let target_value: f64 = target_recs.iter().map(|r| r.amount).sum();
        let diff_pct = scoring::amount_difference_pct(source_value, target_value);

        Some(MatchResult {
            source_doc_type: source_ref.doc,
            source_record_id: source_recs[0].record_id.clone(),
            target_doc_type: target_ref.doc,
            target_record_id: target_recs[0].record_id.clone(),
            match_type: MatchType::Calculated,
            confidence: confidence_for_diff(diff_pct),
            amount_difference_pct: scoring::round2(diff_pct),
            relationship_formula: check.relationship.formula(),
        })
    }
}

/// Confidence bands: ≤0.01% → 95, ≤1% → 90, then linear decay to a
/// floor of 70. Monotone non-increasing in the difference.
pub fn confidence_for_diff(diff_pct: f64) -> f64 {
    if diff_pct <= 0.01 {
        95.0
    } else if diff_pct <= 1.0 {
        90.0
    } else {
        (90.0 - (diff_pct - 1.0) * 2.0).max(70.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_bands_are_monotone() {
        let mut prev = confidence_for_diff(0.0);
        for pct in [0.005, 0.01, 0.5, 1.0, 2.0, 5.0, 11.0, 50.0] {
            let c = confidence_for_diff(pct);
            assert!(c <= prev, "confidence rose at {pct}%");
            prev = c;
        }
        assert_eq!(confidence_for_diff(0.0), 95.0);
        assert_eq!(confidence_for_diff(0.5), 90.0);
        assert_eq!(confidence_for_diff(50.0), 70.0);
    }

    #[test]
    fn prefix_patterns_match_code_families() {
        let p = Pattern::Prefix("25".into());
        assert!(p.matches("2510"));
        assert!(p.matches("2599"));
        assert!(!p.matches("2300"));
    }
}
