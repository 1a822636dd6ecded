//! The closed document-type model and the uniform line-item record.
//!
//! Every extracted figure, regardless of source document, is one
//! `FinancialRecord` row: (property, period, account code, amount).
//! Matching engines and rules only ever see this shape — there is no
//! per-document dispatch anywhere downstream.

use serde::{Deserialize, Serialize};

use crate::types::{EntityId, PeriodId, PropertyId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    BalanceSheet,
    IncomeStatement,
    CashFlow,
    RentRoll,
    MortgageStatement,
}

impl DocumentType {
    pub const ALL: [DocumentType; 5] = [
        DocumentType::BalanceSheet,
        DocumentType::IncomeStatement,
        DocumentType::CashFlow,
        DocumentType::RentRoll,
        DocumentType::MortgageStatement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::BalanceSheet => "balance_sheet",
            DocumentType::IncomeStatement => "income_statement",
            DocumentType::CashFlow => "cash_flow",
            DocumentType::RentRoll => "rent_roll",
            DocumentType::MortgageStatement => "mortgage_statement",
        }
    }

    pub fn parse(s: &str) -> Option<DocumentType> {
        match s {
            "balance_sheet" => Some(DocumentType::BalanceSheet),
            "income_statement" => Some(DocumentType::IncomeStatement),
            "cash_flow" => Some(DocumentType::CashFlow),
            "rent_roll" => Some(DocumentType::RentRoll),
            "mortgage_statement" => Some(DocumentType::MortgageStatement),
            _ => None,
        }
    }

    /// The three documents that must all be present before a covenant
    /// alert may be raised for a period.
    pub const CORE_THREE: [DocumentType; 3] = [
        DocumentType::BalanceSheet,
        DocumentType::IncomeStatement,
        DocumentType::CashFlow,
    ];
}

/// One normalized line item. Immutable after ingestion; auditor
/// corrections go through `ReviewWorkflow::correct_record`, which writes
/// a `record_audit` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialRecord {
    pub record_id: EntityId,
    pub property_id: PropertyId,
    pub period_id: PeriodId,
    pub doc_type: DocumentType,
    pub account_code: String,
    pub account_name: String,
    pub amount: f64,
    pub extraction_confidence: f64,
}

impl FinancialRecord {
    pub fn category(&self) -> AccountCategory {
        AccountCategory::from_code(&self.account_code)
    }
}

/// Coarse account taxonomy used by the inferred matcher's context
/// fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountCategory {
    Asset,
    Liability,
    Equity,
    Income,
    Expense,
    Debt,
    Noi,
    Unknown,
}

impl AccountCategory {
    /// Bucket an account code. Precedence is most-specific-prefix first:
    /// mortgage and debt codes are claimed before the generic numeric
    /// ranges, so 25xx/26xx/27xx land in Debt, never Liability.
    pub fn from_code(code: &str) -> AccountCategory {
        let c = code.trim().to_ascii_uppercase();
        if c.is_empty() {
            return AccountCategory::Unknown;
        }
        // Mortgage-statement and rent-roll codes are alphabetic.
        if c.starts_with("PMT") || c.starts_with("PRIN") || c.starts_with("INT") || c.starts_with("ESC") {
            return AccountCategory::Debt;
        }
        if c.starts_with("RENT") {
            return AccountCategory::Income;
        }
        if c.starts_with("DEP") {
            return AccountCategory::Liability;
        }
        if c.starts_with("NOI") {
            return AccountCategory::Noi;
        }
        // Numeric chart-of-accounts ranges. Long-term debt (25-27) wins
        // over the generic liability prefix.
        if c.starts_with("25") || c.starts_with("26") || c.starts_with("27") {
            return AccountCategory::Debt;
        }
        match c.as_bytes()[0] {
            b'1' => AccountCategory::Asset,
            b'2' => AccountCategory::Liability,
            b'3' => AccountCategory::Equity,
            b'4' => AccountCategory::Income,
            b'5' => AccountCategory::Expense,
            _ => AccountCategory::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debt_prefixes_win_over_liability() {
        assert_eq!(AccountCategory::from_code("2510"), AccountCategory::Debt);
        assert_eq!(AccountCategory::from_code("2300"), AccountCategory::Liability);
    }

    #[test]
    fn alphabetic_codes_bucket_by_document_convention() {
        assert_eq!(AccountCategory::from_code("PRIN"), AccountCategory::Debt);
        assert_eq!(AccountCategory::from_code("PMT-PRIN"), AccountCategory::Debt);
        assert_eq!(AccountCategory::from_code("RENT-101"), AccountCategory::Income);
        assert_eq!(AccountCategory::from_code("DEP-101"), AccountCategory::Liability);
    }

    #[test]
    fn doc_type_round_trips_through_str() {
        for dt in DocumentType::ALL {
            assert_eq!(DocumentType::parse(dt.as_str()), Some(dt));
        }
    }
}
