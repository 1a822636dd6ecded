//! Integration tests for the DSCR covenant monitor.
//!
//! Covers:
//! 1. No alert without all three core statements
//! 2. Non-cash charges are excluded from NOI
//! 3. The breach lifecycle preserves one alert id end to end:
//!    breach → ACTIVE, persisting breach → update in place,
//!    recovery → auto-RESOLVED, recurrence → reactivated ACTIVE
//! 4. A CRITICAL breach places a workflow lock
//! 5. DISMISSED alerts are never auto-mutated; recurrence gets a new id
//! 6. Acknowledged alerts stay with their reviewer on recovery

use tieout_core::alerts::{AlertOutcome, CovenantMonitor, ALERT_TYPE_DSCR};
use tieout_core::config::CovenantConfig;
use tieout_core::record::{DocumentType, FinancialRecord};
use tieout_core::store::ReconStore;

const PROP: &str = "prop-1";
const PERIOD: &str = "2025-07";
const OPEX_ID: &str = "prop-1:2025-07:income_statement:5100";

fn store() -> ReconStore {
    let store = ReconStore::in_memory().unwrap();
    store.migrate().unwrap();
    store.insert_property(PROP, "Test Property").unwrap();
    store.insert_period(PERIOD, 2025, 7).unwrap();
    store
}

fn insert(store: &ReconStore, doc: DocumentType, code: &str, name: &str, amount: f64) {
    store
        .insert_financial_record(&FinancialRecord {
            record_id: format!("{PROP}:{PERIOD}:{}:{code}", doc.as_str()),
            property_id: PROP.into(),
            period_id: PERIOD.into(),
            doc_type: doc,
            account_code: code.into(),
            account_name: name.into(),
            amount,
            extraction_confidence: 0.98,
        })
        .unwrap();
}

/// Income 40_000, operating expenses 12_500, debt service 25_000:
/// DSCR = 27_500 / 25_000 = 1.10, inside the warning band.
fn seed_breach_scope(store: &ReconStore) {
    insert(store, DocumentType::IncomeStatement, "4010", "Base rental income", 40_000.0);
    insert(store, DocumentType::IncomeStatement, "5100", "Operating expenses", 12_500.0);
    insert(store, DocumentType::IncomeStatement, "5800", "Mortgage interest", 15_000.0);
    insert(store, DocumentType::BalanceSheet, "1010", "Operating cash", 30_000.0);
    insert(store, DocumentType::CashFlow, "1999", "Ending cash", 30_000.0);
    insert(store, DocumentType::MortgageStatement, "PMT-PRIN", "Principal paid", 10_000.0);
    insert(store, DocumentType::MortgageStatement, "PMT-INT", "Interest paid", 15_000.0);
}

fn set_opex(store: &ReconStore, amount: f64) {
    store
        .correct_record_amount(OPEX_ID, amount, "test", "scenario step")
        .unwrap();
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: incomplete core statements never alert
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn no_alert_without_all_core_statements() {
    let store = store();
    // Income statement and balance sheet only; cash flow missing.
    insert(&store, DocumentType::IncomeStatement, "4010", "Base rental income", 40_000.0);
    insert(&store, DocumentType::IncomeStatement, "5100", "Operating expenses", 12_500.0);
    insert(&store, DocumentType::BalanceSheet, "1010", "Operating cash", 30_000.0);
    insert(&store, DocumentType::MortgageStatement, "PMT-PRIN", "Principal paid", 25_000.0);

    let config = CovenantConfig::default();
    let monitor = CovenantMonitor::new(&store, &config);
    let outcome = monitor
        .recompute_dscr(&PROP.to_string(), &PERIOD.to_string())
        .unwrap();
    assert!(matches!(outcome, AlertOutcome::Skipped(_)), "got {outcome:?}");
    assert_eq!(store.alert_count(PROP).unwrap(), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 2: NOI is a cash figure
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn non_cash_charges_do_not_depress_dscr() {
    let store = store();
    // Cash NOI 100_000 − 20_000 = 80_000 against 30_000 debt service:
    // DSCR 2.67. The 50_000 depreciation charge must not drag it down.
    insert(&store, DocumentType::IncomeStatement, "4010", "Base rental income", 100_000.0);
    insert(&store, DocumentType::IncomeStatement, "5100", "Operating expenses", 20_000.0);
    insert(&store, DocumentType::IncomeStatement, "5700", "Depreciation", 50_000.0);
    insert(&store, DocumentType::BalanceSheet, "1010", "Operating cash", 30_000.0);
    insert(&store, DocumentType::CashFlow, "1999", "Ending cash", 30_000.0);
    insert(&store, DocumentType::MortgageStatement, "PMT-PRIN", "Principal paid", 10_000.0);
    insert(&store, DocumentType::MortgageStatement, "PMT-INT", "Interest paid", 20_000.0);

    let config = CovenantConfig::default();
    let monitor = CovenantMonitor::new(&store, &config);
    let outcome = monitor
        .recompute_dscr(&PROP.to_string(), &PERIOD.to_string())
        .unwrap();
    assert_eq!(outcome, AlertOutcome::Healthy);
    assert_eq!(store.alert_count(PROP).unwrap(), 0);

    let inputs = store.covenant_inputs(PROP, PERIOD).unwrap();
    assert!((inputs.noi() - 80_000.0).abs() < 1e-9);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 3: full lifecycle under one alert id
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn breach_lifecycle_preserves_the_alert_id() {
    let store = store();
    seed_breach_scope(&store);
    let config = CovenantConfig::default();
    let monitor = CovenantMonitor::new(&store, &config);
    let prop = PROP.to_string();
    let period = PERIOD.to_string();

    // DSCR 1.10 → new ACTIVE WARNING alert.
    let outcome = monitor.recompute_dscr(&prop, &period).unwrap();
    let AlertOutcome::Created(alert_id) = outcome else {
        panic!("expected Created, got {outcome:?}");
    };
    let alert = store.get_alert(&alert_id).unwrap();
    assert_eq!(alert.status, "ACTIVE");
    assert_eq!(alert.severity, "WARNING");
    assert_eq!(alert.alert_type, ALERT_TYPE_DSCR);
    assert!((alert.actual_value - 1.10).abs() < 1e-9);

    // Persisting breach refreshes in place.
    let outcome = monitor.recompute_dscr(&prop, &period).unwrap();
    assert_eq!(outcome, AlertOutcome::Updated(alert_id.clone()));
    assert_eq!(store.alert_count(PROP).unwrap(), 1);

    // Recovery: DSCR 1.30 → auto-resolved with a system note.
    set_opex(&store, 7_500.0);
    let outcome = monitor.recompute_dscr(&prop, &period).unwrap();
    assert_eq!(outcome, AlertOutcome::AutoResolved(alert_id.clone()));
    let alert = store.get_alert(&alert_id).unwrap();
    assert_eq!(alert.status, "RESOLVED");
    assert_eq!(alert.resolved_by.as_deref(), Some("system"));

    // Recurrence below the critical floor: same id, reactivated, now
    // CRITICAL, resolution trail cleared.
    set_opex(&store, 13_800.0);
    let outcome = monitor.recompute_dscr(&prop, &period).unwrap();
    assert_eq!(outcome, AlertOutcome::Reactivated(alert_id.clone()));
    let alert = store.get_alert(&alert_id).unwrap();
    assert_eq!(alert.status, "ACTIVE");
    assert_eq!(alert.severity, "CRITICAL");
    assert!(alert.resolved_by.is_none());
    assert!(alert.resolution_notes.is_none());
    assert_eq!(store.alert_count(PROP).unwrap(), 1, "one alert through the whole lifecycle");

    // The critical band placed a workflow lock.
    let lock = store
        .active_lock_for_property(PROP)
        .unwrap()
        .expect("critical breach places a lock");
    assert_eq!(lock.alert_id, alert_id);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 4: DISMISSED is terminal for automation
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn dismissed_alert_is_never_auto_mutated() {
    let store = store();
    seed_breach_scope(&store);
    let config = CovenantConfig::default();
    let monitor = CovenantMonitor::new(&store, &config);
    let prop = PROP.to_string();
    let period = PERIOD.to_string();

    let AlertOutcome::Created(first_id) = monitor.recompute_dscr(&prop, &period).unwrap() else {
        panic!("expected a new alert");
    };
    store
        .dismiss_alert(&first_id, "committee", "known seasonal dip")
        .unwrap();

    // Breach persists: the dismissed alert stays frozen and a fresh one
    // is created.
    let outcome = monitor.recompute_dscr(&prop, &period).unwrap();
    let AlertOutcome::Created(second_id) = outcome else {
        panic!("expected Created, got {outcome:?}");
    };
    assert_ne!(first_id, second_id);

    let dismissed = store.get_alert(&first_id).unwrap();
    assert_eq!(dismissed.status, "DISMISSED");
    assert_eq!(dismissed.resolution_notes.as_deref(), Some("known seasonal dip"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 5: recovery leaves ACKNOWLEDGED with its reviewer
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn acknowledged_alert_survives_recovery_but_reactivates_on_recurrence() {
    let store = store();
    seed_breach_scope(&store);
    let config = CovenantConfig::default();
    let monitor = CovenantMonitor::new(&store, &config);
    let prop = PROP.to_string();
    let period = PERIOD.to_string();

    let AlertOutcome::Created(alert_id) = monitor.recompute_dscr(&prop, &period).unwrap() else {
        panic!("expected a new alert");
    };
    store.acknowledge_alert(&alert_id, "auditor-a").unwrap();

    // Healthy again: the acknowledgement is a human's, automation keeps
    // its hands off.
    set_opex(&store, 7_500.0);
    let outcome = monitor.recompute_dscr(&prop, &period).unwrap();
    assert_eq!(outcome, AlertOutcome::Unchanged(alert_id.clone()));
    assert_eq!(store.get_alert(&alert_id).unwrap().status, "ACKNOWLEDGED");

    // Recurrence reactivates, clearing the acknowledgement.
    set_opex(&store, 12_500.0);
    let outcome = monitor.recompute_dscr(&prop, &period).unwrap();
    assert_eq!(outcome, AlertOutcome::Reactivated(alert_id.clone()));
    let alert = store.get_alert(&alert_id).unwrap();
    assert_eq!(alert.status, "ACTIVE");
    assert!(alert.acknowledged_by.is_none());
}
