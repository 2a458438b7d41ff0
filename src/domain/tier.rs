//! Drawdown tier table and tier selection.
//!
//! A tier pairs a drawdown threshold with a size multiplier. Selection scans
//! from the deepest threshold down so that a gap through several thresholds
//! fires the deepest one, not the shallowest.

use serde::{Deserialize, Serialize};

use super::error::DcaError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub threshold_pct: f64,
    pub multiplier: f64,
}

/// Validated tier table: thresholds strictly increasing, multipliers positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Tier>", into = "Vec<Tier>")]
pub struct TierConfig {
    tiers: Vec<Tier>,
}

impl TierConfig {
    pub fn new(thresholds: &[f64], multipliers: &[f64]) -> Result<Self, DcaError> {
        if thresholds.len() != multipliers.len() {
            return Err(DcaError::TierConfig {
                reason: format!(
                    "{} thresholds but {} multipliers",
                    thresholds.len(),
                    multipliers.len()
                ),
            });
        }
        let tiers = thresholds
            .iter()
            .zip(multipliers)
            .map(|(&threshold_pct, &multiplier)| Tier {
                threshold_pct,
                multiplier,
            })
            .collect();
        Self::from_tiers(tiers)
    }

    pub fn from_tiers(tiers: Vec<Tier>) -> Result<Self, DcaError> {
        if tiers.is_empty() {
            return Err(DcaError::TierConfig {
                reason: "at least one tier is required".into(),
            });
        }
        for (i, tier) in tiers.iter().enumerate() {
            if !tier.threshold_pct.is_finite() || tier.threshold_pct <= 0.0 || tier.threshold_pct >= 100.0 {
                return Err(DcaError::TierConfig {
                    reason: format!(
                        "threshold {} must be between 0 and 100 exclusive",
                        tier.threshold_pct
                    ),
                });
            }
            if !tier.multiplier.is_finite() || tier.multiplier <= 0.0 {
                return Err(DcaError::TierConfig {
                    reason: format!("multiplier {} must be positive", tier.multiplier),
                });
            }
            if i > 0 && tier.threshold_pct <= tiers[i - 1].threshold_pct {
                return Err(DcaError::TierConfig {
                    reason: format!(
                        "thresholds must be strictly increasing ({} after {})",
                        tier.threshold_pct,
                        tiers[i - 1].threshold_pct
                    ),
                });
            }
        }
        Ok(TierConfig { tiers })
    }

    /// Built-in tables whose invariants hold by construction.
    pub(crate) fn from_static(table: &[(f64, f64)]) -> Self {
        let tiers: Vec<Tier> = table
            .iter()
            .map(|&(threshold_pct, multiplier)| Tier {
                threshold_pct,
                multiplier,
            })
            .collect();
        debug_assert!(Self::from_tiers(tiers.clone()).is_ok());
        TierConfig { tiers }
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    /// Always false: construction rejects an empty table.
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn get(&self, index: usize) -> Option<&Tier> {
        self.tiers.get(index)
    }

    pub fn thresholds(&self) -> Vec<f64> {
        self.tiers.iter().map(|t| t.threshold_pct).collect()
    }

    pub fn multipliers(&self) -> Vec<f64> {
        self.tiers.iter().map(|t| t.multiplier).collect()
    }

    /// Deepest configured threshold.
    pub fn highest_threshold(&self) -> f64 {
        self.tiers.last().map(|t| t.threshold_pct).unwrap_or(0.0)
    }
}

impl TryFrom<Vec<Tier>> for TierConfig {
    type Error = DcaError;

    fn try_from(tiers: Vec<Tier>) -> Result<Self, Self::Error> {
        Self::from_tiers(tiers)
    }
}

impl From<TierConfig> for Vec<Tier> {
    fn from(config: TierConfig) -> Self {
        config.tiers
    }
}

/// A tier that newly fired, with its aggressiveness-scaled multiplier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierSelection {
    pub index: usize,
    pub threshold_pct: f64,
    pub multiplier: f64,
}

impl TierSelection {
    /// floor(base_quantity × multiplier)
    pub fn add_on_quantity(&self, base_quantity: u32) -> u32 {
        (base_quantity as f64 * self.multiplier).floor() as u32
    }
}

/// Pick the deepest tier reached by `drawdown_pct` that has not fired yet in
/// the current leg.
pub fn select_tier(
    drawdown_pct: f64,
    config: &TierConfig,
    last_triggered: Option<usize>,
    aggressiveness: f64,
) -> Option<TierSelection> {
    config
        .tiers
        .iter()
        .enumerate()
        .rev()
        .find(|(index, tier)| {
            tier.threshold_pct <= drawdown_pct && last_triggered.is_none_or(|last| *index > last)
        })
        .map(|(index, tier)| TierSelection {
            index,
            threshold_pct: tier.threshold_pct,
            multiplier: tier.multiplier * aggressiveness,
        })
}

/// Extreme-drawdown policy: beyond the deepest tier and at or past the
/// extreme threshold, tier add-ons are suppressed.
pub fn is_extreme_drawdown(drawdown_pct: f64, config: &TierConfig, extreme_threshold_pct: f64) -> bool {
    drawdown_pct > config.highest_threshold() && drawdown_pct >= extreme_threshold_pct
}
