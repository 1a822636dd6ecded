//! Shared primitive types used across the reconciliation core.

/// Stable identifier for a property.
pub type PropertyId = String;

/// Stable identifier for a reporting period (one month).
pub type PeriodId = String;

/// Stable identifier for any persisted entity (record, match, alert, ...).
pub type EntityId = String;
