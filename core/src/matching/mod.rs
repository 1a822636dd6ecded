//! Matching engines — each takes record sets and returns ranked
//! `MatchResult`s. Engines are pure: no I/O, no persistence, no retries.
//! The session orchestrator owns cross-engine dedup and persistence.

pub mod calculated;
pub mod exact;
pub mod fuzzy;
pub mod inferred;

use serde::{Deserialize, Serialize};

use crate::record::DocumentType;
use crate::types::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Fuzzy,
    Calculated,
    Inferred,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Exact => "exact",
            MatchType::Fuzzy => "fuzzy",
            MatchType::Calculated => "calculated",
            MatchType::Inferred => "inferred",
        }
    }
}

/// A proposed pairing between one source record and one target record.
/// Confidence is on the 0–100 scale. Status starts `pending` when
/// persisted; only the auditor review workflow moves it.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub source_doc_type: DocumentType,
    pub source_record_id: EntityId,
    pub target_doc_type: DocumentType,
    pub target_record_id: EntityId,
    pub match_type: MatchType,
    pub confidence: f64,
    pub amount_difference_pct: f64,
    pub relationship_formula: String,
}

/// Document pairs the exact/fuzzy/inferred engines sweep. These are the
/// cross-document surfaces where line items genuinely correspond one to
/// one; everything else is the calculated engine's territory.
pub const MATCH_SURFACES: [(DocumentType, DocumentType); 4] = [
    (DocumentType::BalanceSheet, DocumentType::MortgageStatement),
    (DocumentType::IncomeStatement, DocumentType::CashFlow),
    (DocumentType::IncomeStatement, DocumentType::RentRoll),
    (DocumentType::BalanceSheet, DocumentType::CashFlow),
];
