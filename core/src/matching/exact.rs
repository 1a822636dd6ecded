//! Exact engine: identical account codes, amounts within a dollar
//! tolerance. O(n+m) via a target-side index; deterministic; confidence
//! always 100. Multiple targets sharing a code each emit an independent
//! match; the orchestrator dedups before persisting.

use std::collections::HashMap;

use crate::config::MatchingConfig;
use crate::record::FinancialRecord;
use crate::scoring;

use super::{MatchResult, MatchType};

pub struct ExactMatchEngine {
    tolerance: f64,
}

impl ExactMatchEngine {
    pub fn new(config: &MatchingConfig) -> Self {
        Self {
            tolerance: config.exact_amount_tolerance,
        }
    }

    pub fn find_matches(
        &self,
        source: &[FinancialRecord],
        target: &[FinancialRecord],
    ) -> Vec<MatchResult> {
        let mut by_code: HashMap<&str, Vec<&FinancialRecord>> = HashMap::new();
        for rec in target {
            by_code.entry(rec.account_code.as_str()).or_default().push(rec);
        }

        let mut matches = Vec::new();
        for src in source {
            let Some(candidates) = by_code.get(src.account_code.as_str()) else {
                continue;
            };
            for tgt in candidates {
                if (src.amount - tgt.amount).abs() > self.tolerance {
                    continue;
                }
                matches.push(MatchResult {
                    source_doc_type: src.doc_type,
                    source_record_id: src.record_id.clone(),
                    target_doc_type: tgt.doc_type,
                    target_record_id: tgt.record_id.clone(),
                    match_type: MatchType::Exact,
                    // Fixed by contract, independent of scorer weights.
                    confidence: 100.0,
                    amount_difference_pct: scoring::amount_difference_pct(
                        src.amount, tgt.amount,
                    ),
                    relationship_formula: format!(
                        "{}.{} = {}.{}",
                        src.doc_type.as_str(),
                        src.account_code,
                        tgt.doc_type.as_str(),
                        tgt.account_code
                    ),
                });
            }
        }
        matches
    }
}
