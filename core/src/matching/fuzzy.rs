//! Fuzzy engine: weighted account-name similarity combined with amount
//! similarity when codes differ. At most one match per source record.
//! Never emits below `min_confidence`; returns empty rather than erring
//! on records with blank names or codes.

use crate::config::MatchingConfig;
use crate::record::FinancialRecord;
use crate::scoring;

use super::{MatchResult, MatchType};

/// Fallback confidence ceiling when nothing clears the name floor and
/// we match on account range + near-identical amount instead.
const RANGE_FALLBACK_CAP: f64 = 85.0;
const RANGE_FALLBACK_MAX_VARIANCE_PCT: f64 = 1.0;

pub struct FuzzyMatchEngine {
    min_confidence: f64,
    name_weight: f64,
    amount_weight: f64,
}

impl FuzzyMatchEngine {
    pub fn new(config: &MatchingConfig) -> Self {
        Self {
            min_confidence: config.min_confidence,
            name_weight: config.fuzzy_name_weight,
            amount_weight: config.fuzzy_amount_weight,
        }
    }

    pub fn find_matches(
        &self,
        source: &[FinancialRecord],
        target: &[FinancialRecord],
    ) -> Vec<MatchResult> {
        let mut matches = Vec::new();
        for src in source {
            if src.account_name.trim().is_empty() || src.account_code.trim().is_empty() {
                continue;
            }
            if let Some(m) = self.best_for(src, target) {
                matches.push(m);
            }
        }
        matches
    }

    fn best_for(
        &self,
        src: &FinancialRecord,
        target: &[FinancialRecord],
    ) -> Option<MatchResult> {
        let mut best: Option<(f64, &FinancialRecord)> = None;
        for tgt in target {
            if tgt.account_name.trim().is_empty() {
                continue;
            }
            // Identical codes belong to the exact engine.
            if tgt.account_code == src.account_code {
                continue;
            }
            let name = scoring::name_similarity(&src.account_name, &tgt.account_name);
            let amount = scoring::amount_similarity(src.amount, tgt.amount);
            let combined = scoring::score(
                name * 100.0,
                amount * 100.0,
                100.0,
                100.0,
                [self.name_weight, self.amount_weight, 0.0, 0.0],
            );
            if best.map_or(true, |(score, _)| combined > score) {
                best = Some((combined, tgt));
            }
        }

        match best {
            Some((score, tgt)) if score >= self.min_confidence => {
                Some(self.emit(src, tgt, score))
            }
            _ => self.range_fallback(src, target),
        }
    }

    /// Same-account-range fallback: same leading code digit and amount
    /// variance ≤1%. Confidence starts at the cap and decays with
    /// variance, but never dips under the floor.
    fn range_fallback(
        &self,
        src: &FinancialRecord,
        target: &[FinancialRecord],
    ) -> Option<MatchResult> {
        let src_range = src.account_code.chars().next()?;
        let mut best: Option<(f64, &FinancialRecord)> = None;
        for tgt in target {
            if tgt.account_code == src.account_code {
                continue;
            }
            if tgt.account_code.chars().next() != Some(src_range) {
                continue;
            }
            let variance = scoring::amount_difference_pct(src.amount, tgt.amount);
            if variance > RANGE_FALLBACK_MAX_VARIANCE_PCT {
                continue;
            }
            let conf = (RANGE_FALLBACK_CAP
                - variance * (RANGE_FALLBACK_CAP - self.min_confidence))
                .max(self.min_confidence);
            if best.map_or(true, |(score, _)| conf > score) {
                best = Some((conf, tgt));
            }
        }
        best.map(|(conf, tgt)| self.emit(src, tgt, scoring::round2(conf)))
    }

    fn emit(&self, src: &FinancialRecord, tgt: &FinancialRecord, conf: f64) -> MatchResult {
        MatchResult {
            source_doc_type: src.doc_type,
            source_record_id: src.record_id.clone(),
            target_doc_type: tgt.doc_type,
            target_record_id: tgt.record_id.clone(),
            match_type: MatchType::Fuzzy,
            confidence: conf,
            amount_difference_pct: scoring::amount_difference_pct(src.amount, tgt.amount),
            relationship_formula: format!(
                "{}.{} ~ {}.{}",
                src.doc_type.as_str(),
                src.account_code,
                tgt.doc_type.as_str(),
                tgt.account_code
            ),
        }
    }
}
