//! Inferred engine — the lowest-confidence strategy, used when nothing
//! structural links two schemas.
//!
//! Two modes:
//!   (a) historical: apply source→target account mappings learned from
//!       prior auditor-approved matches; confidence = historical
//!       accuracy × amount similarity.
//!   (b) context fallback (no history for a code): bucket both sides by
//!       account category and pick the best amount similarity, capped
//!       at 70 within-category and 50 across categories.
//!
//! Every output stays `pending` for auditor review. Nothing from this
//! engine is ever auto-applied.

use std::collections::HashMap;

use crate::config::MatchingConfig;
use crate::record::{AccountCategory, FinancialRecord};
use crate::scoring;

use super::{MatchResult, MatchType};

const WITHIN_CATEGORY_CAP: f64 = 70.0;
const CROSS_CATEGORY_CAP: f64 = 50.0;

/// Source-account → (target-account, historical accuracy 0–100) learned
/// from approved matches. Built by the orchestrator from the store.
#[derive(Debug, Clone, Default)]
pub struct MatchHistory {
    map: HashMap<String, (String, f64)>,
}

impl MatchHistory {
    pub fn insert(&mut self, source_code: &str, target_code: &str, accuracy: f64) {
        self.map
            .insert(source_code.to_string(), (target_code.to_string(), accuracy));
    }

    pub fn lookup(&self, source_code: &str) -> Option<(&str, f64)> {
        self.map
            .get(source_code)
            .map(|(code, acc)| (code.as_str(), *acc))
    }
}

pub struct InferredMatchEngine {
    min_confidence: f64,
}

impl InferredMatchEngine {
    pub fn new(config: &MatchingConfig) -> Self {
        Self {
            min_confidence: config.min_confidence,
        }
    }

    pub fn find_matches(
        &self,
        source: &[FinancialRecord],
        target: &[FinancialRecord],
        history: &MatchHistory,
    ) -> Vec<MatchResult> {
        let mut matches = Vec::new();
        for src in source {
            let m = match history.lookup(&src.account_code) {
                Some((target_code, accuracy)) => {
                    self.apply_history(src, target, target_code, accuracy)
                }
                None => self.context_fallback(src, target),
            };
            if let Some(m) = m {
                matches.push(m);
            }
        }
        matches
    }

    fn apply_history(
        &self,
        src: &FinancialRecord,
        target: &[FinancialRecord],
        target_code: &str,
        accuracy: f64,
    ) -> Option<MatchResult> {
        let tgt = target.iter().find(|t| t.account_code == target_code)?;
        let conf = accuracy * scoring::amount_similarity(src.amount, tgt.amount);
        self.emit(src, tgt, conf, "historical")
    }

    fn context_fallback(
        &self,
        src: &FinancialRecord,
        target: &[FinancialRecord],
    ) -> Option<MatchResult> {
        let src_cat = src.category();
        let mut best: Option<(f64, &FinancialRecord)> = None;
        for tgt in target {
            let same_cat = tgt.category() == src_cat
                && src_cat != AccountCategory::Unknown;
            let cap = if same_cat {
                WITHIN_CATEGORY_CAP
            } else {
                CROSS_CATEGORY_CAP
            };
            let conf = cap * scoring::amount_similarity(src.amount, tgt.amount);
            if best.map_or(true, |(score, _)| conf > score) {
                best = Some((conf, tgt));
            }
        }
        let (conf, tgt) = best?;
        self.emit(src, tgt, conf, "context")
    }

    fn emit(
        &self,
        src: &FinancialRecord,
        tgt: &FinancialRecord,
        confidence: f64,
        mode: &str,
    ) -> Option<MatchResult> {
        // Below the review floor the candidate is noise, not a lead.
        if confidence < self.min_confidence.min(CROSS_CATEGORY_CAP) {
            return None;
        }
        Some(MatchResult {
            source_doc_type: src.doc_type,
            source_record_id: src.record_id.clone(),
            target_doc_type: tgt.doc_type,
            target_record_id: tgt.record_id.clone(),
            match_type: MatchType::Inferred,
            confidence: scoring::round2(confidence.clamp(0.0, 100.0)),
            amount_difference_pct: scoring::amount_difference_pct(src.amount, tgt.amount),
            relationship_formula: format!(
                "{}.{} ?= {}.{} ({mode})",
                src.doc_type.as_str(),
                src.account_code,
                tgt.doc_type.as_str(),
                tgt.account_code
            ),
        })
    }
}
