//! Integration tests for the session orchestrator.
//!
//! Covers:
//! 1. Sessions refuse to start on an empty scope
//! 2. A coherent period reconciles end to end with a full health score
//! 3. Re-running a session is idempotent (no duplicate matches/results)
//! 4. Inconsistent data degrades the health score and raises discrepancies
//! 5. An approved session rejects further engine runs

use tieout_core::config::ReconConfig;
use tieout_core::error::ReconError;
use tieout_core::record::{DocumentType, FinancialRecord};
use tieout_core::session::SessionOrchestrator;
use tieout_core::store::ReconStore;

const PROP: &str = "prop-1";
const PERIOD: &str = "2025-07";

fn store() -> ReconStore {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = ReconStore::in_memory().unwrap();
    store.migrate().unwrap();
    store.insert_property(PROP, "Test Property").unwrap();
    store.insert_period("2025-06", 2025, 6).unwrap();
    store.insert_period(PERIOD, 2025, 7).unwrap();
    store
}

fn insert(store: &ReconStore, period: &str, doc: DocumentType, code: &str, name: &str, amount: f64) {
    store
        .insert_financial_record(&FinancialRecord {
            record_id: format!("{PROP}:{period}:{}:{code}", doc.as_str()),
            property_id: PROP.into(),
            period_id: period.into(),
            doc_type: doc,
            account_code: code.into(),
            account_name: name.into(),
            amount,
            extraction_confidence: 0.98,
        })
        .unwrap();
}

/// A small internally consistent month: every identity with data ties.
fn seed_coherent_scope(store: &ReconStore) {
    use DocumentType::*;
    let rows: &[(DocumentType, &str, &str, f64)] = &[
        (BalanceSheet, "1010", "Operating cash", 50_000.0),
        (BalanceSheet, "1300", "Escrow deposits", 6_000.0),
        (BalanceSheet, "1500", "Building, net", 1_015_000.0),
        (BalanceSheet, "2300", "Tenant security deposits", 8_400.0),
        (BalanceSheet, "2500", "Mortgage payable", 550_000.0),
        (BalanceSheet, "3000", "Owner equity", 512_600.0),
        (IncomeStatement, "4010", "Base rental income", 10_000.0),
        (IncomeStatement, "5800", "Mortgage interest", 2_000.0),
        (IncomeStatement, "3900", "Net income", 8_000.0),
        (CashFlow, "3900", "Net income", 8_000.0),
        (CashFlow, "3100", "Mortgage principal payments", 1_000.0),
        (CashFlow, "1999", "Ending cash", 50_000.0),
        (MortgageStatement, "PRIN", "Principal balance", 550_000.0),
        (MortgageStatement, "PMT-PRIN", "Principal paid", 1_000.0),
        (MortgageStatement, "INT", "Interest charged", 2_000.0),
        (MortgageStatement, "ESC", "Escrow balance", 6_000.0),
        (RentRoll, "RENT-101", "Unit 101 rent", 4_000.0),
        (RentRoll, "RENT-102", "Unit 102 rent", 3_500.0),
        (RentRoll, "RENT-103", "Unit 103 rent", 2_500.0),
        (RentRoll, "DEP-101", "Unit 101 deposit", 3_000.0),
        (RentRoll, "DEP-102", "Unit 102 deposit", 3_000.0),
        (RentRoll, "DEP-103", "Unit 103 deposit", 2_400.0),
    ];
    for (doc, code, name, amount) in rows {
        insert(store, PERIOD, *doc, code, name, *amount);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: empty scope refuses to start
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn start_session_requires_data() {
    let store = store();
    let config = ReconConfig::default();
    let orchestrator = SessionOrchestrator::new(&store, &config);

    let err = orchestrator
        .start_session(&PROP.to_string(), &PERIOD.to_string())
        .unwrap_err();
    assert!(matches!(err, ReconError::DataUnavailable { .. }), "got {err}");
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 2: coherent scope reconciles cleanly
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn coherent_scope_scores_full_health() {
    let store = store();
    seed_coherent_scope(&store);
    let config = ReconConfig::default();
    let orchestrator = SessionOrchestrator::new(&store, &config);

    let session = orchestrator
        .start_session(&PROP.to_string(), &PERIOD.to_string())
        .unwrap();
    let run = orchestrator.find_all_matches(&session).unwrap();
    assert!(run.matches_persisted > 0);
    assert!(run.rules_evaluated > 0);

    let validation = orchestrator.validate_matches(&session).unwrap();
    assert_eq!(validation.health_score, 100.0);
    assert_eq!(validation.discrepancies, 0);

    // End-to-end identities: mortgage principal ties exactly at high
    // confidence, rent roll covers base rentals with zero variance.
    let matches = store.matches_for_session(&session.session_id).unwrap();
    let principal = matches
        .iter()
        .find(|m| m.relationship_formula.contains("25*") && m.relationship_formula.contains("PRIN"))
        .expect("mortgage principal calculated match");
    assert!(principal.confidence_score >= 95.0);
    assert_eq!(principal.amount_difference_pct, 0.0);

    let results = store.results_for_session(&session.session_id).unwrap();
    let rent = results
        .iter()
        .find(|r| r.rule_id == "tie-rent-to-revenue")
        .expect("rent-to-revenue result");
    assert_eq!(rent.status, "PASS");
    assert_eq!(rent.difference, Some(0.0));
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 3: idempotent re-runs
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn rerunning_a_session_never_duplicates() {
    let store = store();
    seed_coherent_scope(&store);
    let config = ReconConfig::default();
    let orchestrator = SessionOrchestrator::new(&store, &config);

    let session = orchestrator
        .start_session(&PROP.to_string(), &PERIOD.to_string())
        .unwrap();
    orchestrator.find_all_matches(&session).unwrap();
    let matches_first = store.match_count(&session.session_id).unwrap();
    let results_first = store.result_count(&session.session_id).unwrap();

    orchestrator.find_all_matches(&session).unwrap();
    assert_eq!(store.match_count(&session.session_id).unwrap(), matches_first);
    assert_eq!(store.result_count(&session.session_id).unwrap(), results_first);

    orchestrator.validate_matches(&session).unwrap();
    let discrepancies_first = store.discrepancy_count(&session.session_id).unwrap();
    orchestrator.validate_matches(&session).unwrap();
    assert_eq!(
        store.discrepancy_count(&session.session_id).unwrap(),
        discrepancies_first
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 4: inconsistency degrades health and raises discrepancies
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn broken_identity_degrades_health_score() {
    let store = store();
    seed_coherent_scope(&store);
    // An unexplained $4,000 gap between IS and CF net income.
    store
        .correct_record_amount(
            &format!("{PROP}:{PERIOD}:cash_flow:3900"),
            12_000.0,
            "test",
            "inject variance",
        )
        .unwrap();

    let config = ReconConfig::default();
    let orchestrator = SessionOrchestrator::new(&store, &config);
    let session = orchestrator
        .start_session(&PROP.to_string(), &PERIOD.to_string())
        .unwrap();
    orchestrator.find_all_matches(&session).unwrap();
    let validation = orchestrator.validate_matches(&session).unwrap();

    assert!(validation.health_score < 100.0);
    assert!(validation.discrepancies > 0);

    let discrepancies = store.discrepancies_for_session(&session.session_id).unwrap();
    assert!(discrepancies
        .iter()
        .any(|d| d.rule_id.as_deref() == Some("tie-net-income-flow")));

    let session_row = store.get_session(&session.session_id).unwrap();
    assert_eq!(session_row.health_score, Some(validation.health_score));
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 5: approval is terminal for engine runs
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn approved_session_rejects_engine_runs() {
    let store = store();
    seed_coherent_scope(&store);
    let config = ReconConfig::default();
    let orchestrator = SessionOrchestrator::new(&store, &config);

    let session = orchestrator
        .start_session(&PROP.to_string(), &PERIOD.to_string())
        .unwrap();
    orchestrator.find_all_matches(&session).unwrap();
    orchestrator.validate_matches(&session).unwrap();

    let approved = orchestrator.approve_session(&session.session_id).unwrap();
    assert_eq!(approved.status, "approved");
    assert!(approved.completed_at.is_some());

    let err = orchestrator.find_all_matches(&session).unwrap_err();
    assert!(matches!(err, ReconError::SessionState { .. }), "got {err}");
    let err = orchestrator.approve_session(&session.session_id).unwrap_err();
    assert!(matches!(err, ReconError::SessionState { .. }), "got {err}");
}
