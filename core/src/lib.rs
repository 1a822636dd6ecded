//! Property financial reconciliation core.
//!
//! Cross-ties the five statements a property reports each period
//! (balance sheet, income statement, cash flow, rent roll, mortgage
//! statement): four matching engines propose record pairings, a
//! declarative rule engine grades accounting identities and forensic
//! screens into a health score, a covenant monitor drives DSCR alerts
//! through their lifecycle, and an auditor workflow reviews what the
//! engines produced. Everything persists to SQLite through `store`;
//! re-running any session is idempotent.

pub mod alerts;
pub mod config;
pub mod error;
pub mod matching;
pub mod record;
pub mod review;
pub mod rules;
pub mod scoring;
pub mod session;
pub mod store;
pub mod types;
