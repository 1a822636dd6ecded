//! Injected configuration for engines, rules, and the covenant monitor.
//!
//! Nothing in the core reads a module-level constant for a threshold:
//! every engine and rule receives its bands through these structs, so
//! tests can tighten or loosen tolerances without shared state.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ReconResult;
use crate::matching::calculated::CheckSpec;

/// How much variance a comparison tolerates before it stops reconciling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialityPolicy {
    /// Fixed dollar band. Near-zero for exact identities.
    Absolute(f64),
    /// Percentage of the larger side. For ties with known timing noise.
    Percent(f64),
    /// Passes if within either band. Used where small balances make a
    /// pure percentage band too strict.
    GreaterOf { absolute: f64, percent: f64 },
}

impl MaterialityPolicy {
    /// The dollar threshold this policy allows for a given source value.
    pub fn threshold_for(&self, source: f64) -> f64 {
        match *self {
            MaterialityPolicy::Absolute(a) => a,
            MaterialityPolicy::Percent(p) => source.abs() * p / 100.0,
            MaterialityPolicy::GreaterOf { absolute, percent } => {
                absolute.max(source.abs() * percent / 100.0)
            }
        }
    }

    pub fn within(&self, source: f64, target: f64) -> bool {
        (source - target).abs() <= self.threshold_for(source)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Dollar tolerance for the exact engine.
    pub exact_amount_tolerance: f64,
    /// Floor below which fuzzy and inferred candidates are discarded.
    pub min_confidence: f64,
    /// Fuzzy combination weights (name, amount).
    pub fuzzy_name_weight: f64,
    pub fuzzy_amount_weight: f64,
    /// A pending match whose variance exceeds this percentage becomes a
    /// discrepancy during validation.
    pub discrepancy_variance_pct: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            exact_amount_tolerance: 0.01,
            min_confidence: 70.0,
            fuzzy_name_weight: 0.6,
            fuzzy_amount_weight: 0.4,
            discrepancy_variance_pct: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CovenantConfig {
    /// DSCR below this raises a WARNING alert.
    pub dscr_warning: f64,
    /// DSCR below this raises a CRITICAL alert and a workflow lock.
    pub dscr_critical: f64,
}

impl Default for CovenantConfig {
    fn default() -> Self {
        Self {
            dscr_warning: 1.25,
            dscr_critical: 1.05,
        }
    }
}

/// Rule-engine materiality bands, one per rule family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialityTable {
    pub exact_identity: MaterialityPolicy,
    pub balance_sheet_equation: MaterialityPolicy,
    pub timing_tie: MaterialityPolicy,
    pub sign_convention: MaterialityPolicy,
    /// MAD threshold for the Benford screen.
    pub benford_mad: f64,
    /// Minimum qualifying items before Benford is meaningful.
    pub benford_min_items: usize,
    /// Floor for the duplicate round-number screen.
    pub round_amount_floor: f64,
    /// How many identical postings constitute a cluster.
    pub round_cluster_size: usize,
}

impl Default for MaterialityTable {
    fn default() -> Self {
        Self {
            exact_identity: MaterialityPolicy::Absolute(0.01),
            balance_sheet_equation: MaterialityPolicy::Percent(0.5),
            timing_tie: MaterialityPolicy::Percent(2.0),
            sign_convention: MaterialityPolicy::GreaterOf {
                absolute: 1.0,
                percent: 1.0,
            },
            benford_mad: 0.015,
            benford_min_items: 30,
            round_amount_floor: 1_000.0,
            round_cluster_size: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    pub matching: MatchingConfig,
    pub covenant: CovenantConfig,
    pub materiality: MaterialityTable,
    /// The named accounting-identity checks. Data, not code: adding a
    /// check never adds a code path.
    pub calculated_checks: Vec<CheckSpec>,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            matching: MatchingConfig::default(),
            covenant: CovenantConfig::default(),
            materiality: MaterialityTable::default(),
            calculated_checks: CheckSpec::standard_checks(),
        }
    }
}

impl ReconConfig {
    pub fn from_json_file(path: &Path) -> ReconResult<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greater_of_takes_the_larger_band() {
        let p = MaterialityPolicy::GreaterOf {
            absolute: 5.0,
            percent: 1.0,
        };
        // 1% of 10_000 = 100 > 5
        assert!((p.threshold_for(10_000.0) - 100.0).abs() < 1e-9);
        // 1% of 100 = 1 < 5
        assert!((p.threshold_for(100.0) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn percent_band_scales_with_source() {
        let p = MaterialityPolicy::Percent(2.0);
        assert!(p.within(10_000.0, 10_150.0));
        assert!(!p.within(10_000.0, 10_300.0));
    }
}
