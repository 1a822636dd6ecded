//! Integration tests for the forensic screens.
//!
//! Covers:
//! 1. Benford passes an ideal first-digit distribution and fails a
//!    fabricated one, and skips thin samples
//! 2. Duplicate round-number clusters raise a WARNING
//! 3. Appearance/disappearance grading over the prior window
//! 4. Non-cash journal detection suggests the explaining account

use tieout_core::config::ReconConfig;
use tieout_core::record::{DocumentType, FinancialRecord};
use tieout_core::rules::forensic::{
    AppearanceRule, BenfordRule, NonCashJournalRule, RoundNumberClusterRule,
};
use tieout_core::rules::{Rule, RuleContext, RuleStatus};
use tieout_core::session::PeriodRecords;

fn rec(doc: DocumentType, code: &str, name: &str, amount: f64) -> FinancialRecord {
    FinancialRecord {
        record_id: format!("{}-{code}", doc.as_str()),
        property_id: "prop-1".into(),
        period_id: "2025-07".into(),
        doc_type: doc,
        account_code: code.into(),
        account_name: name.into(),
        amount,
        extraction_confidence: 0.99,
    }
}

fn evaluate(
    rule: &dyn Rule,
    current: &PeriodRecords,
    prior: Option<&PeriodRecords>,
) -> tieout_core::rules::ReconciliationResult {
    let config = ReconConfig::default();
    let property = "prop-1".to_string();
    let period = "2025-07".to_string();
    let ctx = RuleContext {
        property_id: &property,
        period_id: &period,
        current,
        prior,
        materiality: &config.materiality,
    };
    rule.evaluate(&ctx)
}

/// Amounts whose first digits follow the given histogram.
fn amounts_with_digit_counts(counts: [usize; 9]) -> Vec<FinancialRecord> {
    let mut recs = Vec::new();
    for (i, n) in counts.iter().enumerate() {
        for k in 0..*n {
            recs.push(rec(
                DocumentType::IncomeStatement,
                &format!("5{:03}", i * 40 + k),
                "Expense line",
                ((i + 1) as f64) * 1_000.0 + 17.0 * k as f64 + 0.43,
            ));
        }
    }
    recs
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: Benford's Law
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn benford_passes_an_organic_distribution() {
    // 100 items matching Benford's expected frequencies.
    let records =
        PeriodRecords::from_records(amounts_with_digit_counts([30, 18, 12, 10, 8, 7, 6, 5, 4]));
    let result = evaluate(&BenfordRule, &records, None);
    assert_eq!(result.status, RuleStatus::Pass, "{}", result.explanation);
}

#[test]
fn benford_fails_a_fabricated_distribution() {
    // Everything starts with 9: nothing organic looks like this.
    let records = PeriodRecords::from_records(amounts_with_digit_counts([0, 0, 0, 0, 0, 0, 0, 0, 40]));
    let result = evaluate(&BenfordRule, &records, None);
    assert_eq!(result.status, RuleStatus::Fail, "{}", result.explanation);
}

#[test]
fn benford_skips_thin_samples() {
    let records = PeriodRecords::from_records(amounts_with_digit_counts([5, 3, 2, 1, 1, 1, 0, 0, 0]));
    let result = evaluate(&BenfordRule, &records, None);
    assert_eq!(result.status, RuleStatus::Skip);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 2: duplicate round numbers
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn three_identical_round_postings_warn() {
    let records = PeriodRecords::from_records(vec![
        rec(DocumentType::IncomeStatement, "5101", "Repairs", 5_000.0),
        rec(DocumentType::IncomeStatement, "5102", "Repairs", 5_000.0),
        rec(DocumentType::IncomeStatement, "5103", "Repairs", 5_000.0),
        rec(DocumentType::IncomeStatement, "5104", "Utilities", 2_317.55),
    ]);
    let result = evaluate(&RoundNumberClusterRule, &records, None);
    assert_eq!(result.status, RuleStatus::Warning);
    assert!(result.explanation.contains("5000"));
}

#[test]
fn distinct_or_small_round_amounts_pass() {
    let records = PeriodRecords::from_records(vec![
        // Below the $1,000 floor.
        rec(DocumentType::IncomeStatement, "5101", "Fees", 500.0),
        rec(DocumentType::IncomeStatement, "5102", "Fees", 500.0),
        rec(DocumentType::IncomeStatement, "5103", "Fees", 500.0),
        // Only two of these.
        rec(DocumentType::IncomeStatement, "5104", "Repairs", 5_000.0),
        rec(DocumentType::IncomeStatement, "5105", "Repairs", 5_000.0),
    ]);
    let result = evaluate(&RoundNumberClusterRule, &records, None);
    assert_eq!(result.status, RuleStatus::Pass);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 3: appearance / disappearance
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn disappearing_balance_outranks_appearing_one() {
    let prior = PeriodRecords::from_records(vec![
        rec(DocumentType::BalanceSheet, "1100", "Accounts receivable", 14_000.0),
        rec(DocumentType::BalanceSheet, "1200", "Prepaid expenses", 3_000.0),
    ]);
    let current = PeriodRecords::from_records(vec![
        rec(DocumentType::BalanceSheet, "1100", "Accounts receivable", 12_000.0),
        // 1200 vanished; 1300 appeared.
        rec(DocumentType::BalanceSheet, "1300", "Escrow deposits", 6_000.0),
    ]);
    let result = evaluate(&AppearanceRule, &current, Some(&prior));
    assert_eq!(result.status, RuleStatus::Warning);
    assert!(result.explanation.contains("1200"));
    assert!(result.explanation.contains("1300"));

    // Appearance alone is informational.
    let appeared_only = PeriodRecords::from_records(vec![
        rec(DocumentType::BalanceSheet, "1100", "Accounts receivable", 14_000.0),
        rec(DocumentType::BalanceSheet, "1200", "Prepaid expenses", 3_000.0),
        rec(DocumentType::BalanceSheet, "1300", "Escrow deposits", 6_000.0),
    ]);
    let result = evaluate(&AppearanceRule, &appeared_only, Some(&prior));
    assert_eq!(result.status, RuleStatus::Info);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 4: non-cash journal detection
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn cash_variance_matching_an_account_level_is_explained() {
    let current = PeriodRecords::from_records(vec![
        rec(DocumentType::BalanceSheet, "1010", "Operating cash", 53_000.0),
        rec(DocumentType::BalanceSheet, "1200", "Prepaid expenses", 3_000.0),
        rec(DocumentType::CashFlow, "1999", "Ending cash", 50_000.0),
    ]);
    let result = evaluate(&NonCashJournalRule, &current, None);
    assert_eq!(result.status, RuleStatus::Info);
    assert!(result.explanation.contains("1200"), "{}", result.explanation);
}

#[test]
fn unexplained_cash_variance_warns() {
    let current = PeriodRecords::from_records(vec![
        rec(DocumentType::BalanceSheet, "1010", "Operating cash", 53_000.0),
        rec(DocumentType::BalanceSheet, "1200", "Prepaid expenses", 900.0),
        rec(DocumentType::CashFlow, "1999", "Ending cash", 50_000.0),
    ]);
    let result = evaluate(&NonCashJournalRule, &current, None);
    assert_eq!(result.status, RuleStatus::Warning);
}

#[test]
fn reconciled_cash_passes() {
    let current = PeriodRecords::from_records(vec![
        rec(DocumentType::BalanceSheet, "1010", "Operating cash", 50_000.0),
        rec(DocumentType::CashFlow, "1999", "Ending cash", 50_000.0),
    ]);
    let result = evaluate(&NonCashJournalRule, &current, None);
    assert_eq!(result.status, RuleStatus::Pass);
}
