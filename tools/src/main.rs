//! recon-runner: headless reconciliation runner.
//!
//! Usage:
//!   recon-runner --db tieout.db
//!   recon-runner --db tieout.db --property maple-grove --period 2025-07
//!   recon-runner --stress            (seed a DSCR covenant breach)
//!   recon-runner --config recon.json (override thresholds)

use anyhow::Result;
use std::env;
use std::path::Path;

use tieout_core::alerts::{AlertOutcome, CovenantMonitor};
use tieout_core::config::ReconConfig;
use tieout_core::record::{DocumentType, FinancialRecord};
use tieout_core::session::SessionOrchestrator;
use tieout_core::store::ReconStore;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = arg_value(&args, "--db").unwrap_or(":memory:");
    let property_id = arg_value(&args, "--property").unwrap_or("maple-grove");
    let period_id = arg_value(&args, "--period").unwrap_or("2025-07");
    let stress = args.iter().any(|a| a == "--stress");
    let config = match arg_value(&args, "--config") {
        Some(path) => ReconConfig::from_json_file(Path::new(path))?,
        None => ReconConfig::default(),
    };
    log::debug!("effective config: {config:?}");

    println!("recon-runner");
    println!("  db:       {db}");
    println!("  property: {property_id}");
    println!("  period:   {period_id}");
    println!("  stress:   {stress}");
    println!();

    let store = ReconStore::open(db)?;
    store.migrate()?;

    if !store.has_any_records(property_id, period_id)? {
        seed_demo_scope(&store, property_id, period_id, stress)?;
        println!("seeded demo records for {property_id}/{period_id}");
        println!();
    }

    let orchestrator = SessionOrchestrator::new(&store, &config);
    let session = match store.latest_session_for_scope(property_id, period_id)? {
        Some(s) if s.status == "in_progress" => {
            println!("resuming session {}", s.session_id);
            s
        }
        _ => orchestrator.start_session(&property_id.to_string(), &period_id.to_string())?,
    };
    let run = orchestrator.find_all_matches(&session)?;
    let validation = orchestrator.validate_matches(&session)?;

    let monitor = CovenantMonitor::new(&store, &config.covenant);
    let alert_outcome =
        monitor.recompute_dscr(&property_id.to_string(), &period_id.to_string())?;

    print_summary(&store, &session.session_id, &run, &validation, &alert_outcome)?;
    Ok(())
}

fn print_summary(
    store: &ReconStore,
    session_id: &str,
    run: &tieout_core::session::MatchRunSummary,
    validation: &tieout_core::session::ValidationSummary,
    alert_outcome: &AlertOutcome,
) -> Result<()> {
    println!("=== SESSION SUMMARY ===");
    println!("  session:       {session_id}");
    println!("  matches:       {}", run.matches_persisted);
    println!(
        "  rules:         {} evaluated ({} skipped)",
        run.rules_evaluated, run.rules_skipped
    );
    println!("  health score:  {:.2}", validation.health_score);
    println!("  discrepancies: {}", validation.discrepancies);
    println!("  alert:         {alert_outcome:?}");

    println!();
    println!("=== RULE RESULTS ===");
    for r in store.results_for_session(session_id)? {
        println!("  {:<28} {:<8} {}", r.rule_id, r.status, r.explanation);
    }

    let discrepancies = store.discrepancies_for_session(session_id)?;
    if !discrepancies.is_empty() {
        println!();
        println!("=== OPEN DISCREPANCIES ===");
        for d in discrepancies {
            println!("  [{:<8}] {}", d.severity, d.description);
        }
    }
    Ok(())
}

/// Two consecutive months of a small stabilized property, internally
/// consistent so the standard identity checks tie. `--stress` cuts
/// rental income to push DSCR through the critical covenant floor.
fn seed_demo_scope(
    store: &ReconStore,
    property_id: &str,
    period_id: &str,
    stress: bool,
) -> Result<()> {
    store.insert_property(property_id, "Maple Grove Apartments")?;
    let (year, month) = parse_period(period_id)?;
    let (prior_year, prior_month) = if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    };
    let prior_id = format!("{prior_year:04}-{prior_month:02}");
    store.insert_period(&prior_id, prior_year, prior_month)?;
    store.insert_period(period_id, year, month)?;

    let rent_scale = if stress { 0.25 } else { 1.0 };
    let base_rent = 120_000.0 * rent_scale;
    let other_income = 5_000.0;
    let total_expenses = 62_000.0;
    let net_income = base_rent + other_income - total_expenses;

    use DocumentType::*;
    let current: Vec<(DocumentType, &str, &str, f64)> = vec![
        // Balance sheet
        (BalanceSheet, "1010", "Operating cash", 50_000.0),
        (BalanceSheet, "1100", "Accounts receivable", 12_000.0),
        (BalanceSheet, "1200", "Prepaid expenses", 3_000.0),
        (BalanceSheet, "1300", "Escrow deposits", 6_000.0),
        (BalanceSheet, "1500", "Building, net", 1_000_000.0),
        (BalanceSheet, "2100", "Accounts payable", 9_000.0),
        (BalanceSheet, "2200", "Accrued liabilities", 4_000.0),
        (BalanceSheet, "2300", "Tenant security deposits", 8_000.0),
        (BalanceSheet, "2500", "Mortgage payable", 550_000.0),
        (BalanceSheet, "3000", "Owner equity", 500_000.0),
        // Income statement
        (IncomeStatement, "4010", "Base rental income", base_rent),
        (IncomeStatement, "4020", "Other income", other_income),
        (IncomeStatement, "5100", "Operating expenses", 30_000.0),
        (IncomeStatement, "5700", "Depreciation", 10_000.0),
        (IncomeStatement, "5710", "Amortization", 2_000.0),
        (IncomeStatement, "5800", "Mortgage interest", 20_000.0),
        (IncomeStatement, "3900", "Net income", net_income),
        // Cash flow
        (CashFlow, "3900", "Net income", net_income),
        (CashFlow, "5700", "Depreciation add-back", 10_000.0),
        (CashFlow, "5710", "Amortization add-back", 2_000.0),
        (CashFlow, "1100", "Change in receivables", 2_000.0),
        (CashFlow, "1200", "Change in prepaids", 500.0),
        (CashFlow, "2100", "Change in payables", 1_000.0),
        (CashFlow, "2200", "Change in accruals", -500.0),
        (CashFlow, "2300", "Change in deposits", 0.0),
        (CashFlow, "3100", "Mortgage principal payments", 8_000.0),
        (CashFlow, "1999", "Ending cash", 50_000.0),
        // Mortgage statement
        (MortgageStatement, "PRIN", "Principal balance", 550_000.0),
        (MortgageStatement, "PMT-PRIN", "Principal paid", 8_000.0),
        (MortgageStatement, "PMT-INT", "Interest paid", 20_000.0),
        (MortgageStatement, "INT", "Interest charged", 20_000.0),
        (MortgageStatement, "ESC", "Escrow balance", 6_000.0),
        // Rent roll
        (RentRoll, "RENT-101", "Unit 101 rent", 40_000.0 * rent_scale),
        (RentRoll, "RENT-102", "Unit 102 rent", 40_000.0 * rent_scale),
        (RentRoll, "RENT-103", "Unit 103 rent", 40_000.0 * rent_scale),
        (RentRoll, "DEP-101", "Unit 101 deposit", 3_000.0),
        (RentRoll, "DEP-102", "Unit 102 deposit", 3_000.0),
        (RentRoll, "DEP-103", "Unit 103 deposit", 2_000.0),
    ];

    let prior: Vec<(DocumentType, &str, &str, f64)> = vec![
        (BalanceSheet, "1010", "Operating cash", 46_000.0),
        (BalanceSheet, "1100", "Accounts receivable", 14_000.0),
        (BalanceSheet, "1200", "Prepaid expenses", 3_500.0),
        (BalanceSheet, "1300", "Escrow deposits", 6_000.0),
        (BalanceSheet, "1500", "Building, net", 1_000_000.0),
        (BalanceSheet, "2100", "Accounts payable", 8_000.0),
        (BalanceSheet, "2200", "Accrued liabilities", 4_500.0),
        (BalanceSheet, "2300", "Tenant security deposits", 8_000.0),
        (BalanceSheet, "2500", "Mortgage payable", 558_000.0),
        (BalanceSheet, "3000", "Owner equity", 491_000.0),
    ];

    for (doc, code, name, amount) in &current {
        insert_record(store, property_id, period_id, *doc, code, name, *amount)?;
    }
    for (doc, code, name, amount) in &prior {
        insert_record(store, property_id, &prior_id, *doc, code, name, *amount)?;
    }
    Ok(())
}

fn insert_record(
    store: &ReconStore,
    property_id: &str,
    period_id: &str,
    doc: DocumentType,
    code: &str,
    name: &str,
    amount: f64,
) -> Result<()> {
    store.insert_financial_record(&FinancialRecord {
        record_id: format!("{property_id}:{period_id}:{}:{code}", doc.as_str()),
        property_id: property_id.to_string(),
        period_id: period_id.to_string(),
        doc_type: doc,
        account_code: code.to_string(),
        account_name: name.to_string(),
        amount,
        extraction_confidence: 0.98,
    })?;
    Ok(())
}

fn parse_period(period_id: &str) -> Result<(i32, u32)> {
    let (y, m) = period_id
        .split_once('-')
        .ok_or_else(|| anyhow::anyhow!("period must be YYYY-MM, got '{period_id}'"))?;
    Ok((y.parse()?, m.parse()?))
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
