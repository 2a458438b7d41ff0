//! Strategy configuration and the restricted/extended profiles.
//!
//! Profiles are only default values: the simulation runs the same code for
//! both, driven entirely by the resulting [`StrategyConfig`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::drawdown::NewHighReset;
use super::error::DcaError;
use super::ledger::QuantityBounds;
use super::tier::TierConfig;

pub const DEFAULT_EXTREME_DRAWDOWN_PCT: f64 = 60.0;
pub const DEFAULT_BASE_QUANTITY: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Restricted,
    Extended,
}

impl Profile {
    pub fn tier_config(&self) -> TierConfig {
        match self {
            Profile::Restricted => TierConfig::from_static(&[(5.0, 1.5), (10.0, 2.0), (20.0, 3.0)]),
            Profile::Extended => TierConfig::from_static(&[
                (5.0, 1.5),
                (10.0, 2.0),
                (20.0, 3.0),
                (35.0, 4.0),
                (50.0, 5.0),
            ]),
        }
    }

    pub fn interval_days(&self) -> u32 {
        match self {
            Profile::Restricted => 7,
            Profile::Extended => 1,
        }
    }

    pub fn bounds(&self) -> QuantityBounds {
        match self {
            Profile::Restricted => QuantityBounds {
                unit: 10,
                min: 10,
                max: 100,
            },
            Profile::Extended => QuantityBounds {
                unit: 1,
                min: 1,
                max: 1000,
            },
        }
    }

    /// Restricted runs always use 1.0.
    pub fn allows_aggressiveness(&self) -> bool {
        matches!(self, Profile::Extended)
    }

    pub fn strategy_config(&self, base_quantity: u32) -> StrategyConfig {
        StrategyConfig {
            profile: *self,
            base_quantity,
            interval_days: self.interval_days(),
            tiers: self.tier_config(),
            extreme_drawdown_pct: DEFAULT_EXTREME_DRAWDOWN_PCT,
            aggressiveness: 1.0,
            bounds: self.bounds(),
            new_high_reset: NewHighReset::Immediate,
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profile::Restricted => write!(f, "restricted"),
            Profile::Extended => write!(f, "extended"),
        }
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "restricted" => Ok(Profile::Restricted),
            "extended" => Ok(Profile::Extended),
            other => Err(format!("unknown profile '{other}' (expected restricted or extended)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Restricted configs keep aggressiveness at 1.0.
    pub profile: Profile,
    pub base_quantity: u32,
    pub interval_days: u32,
    pub tiers: TierConfig,
    pub extreme_drawdown_pct: f64,
    /// Scales every tier multiplier uniformly.
    pub aggressiveness: f64,
    pub bounds: QuantityBounds,
    pub new_high_reset: NewHighReset,
}

impl StrategyConfig {
    /// Structural checks that must pass before any simulation step runs.
    pub fn validate(&self) -> Result<(), DcaError> {
        let invalid = |key: &str, reason: String| DcaError::ConfigInvalid {
            section: "strategy".into(),
            key: key.into(),
            reason,
        };
        if self.base_quantity == 0 {
            return Err(invalid("base_quantity", "base_quantity must be at least 1".into()));
        }
        if self.interval_days == 0 {
            return Err(invalid("interval_days", "interval_days must be at least 1".into()));
        }
        if !self.aggressiveness.is_finite() || self.aggressiveness <= 0.0 {
            return Err(invalid(
                "aggressiveness",
                format!("aggressiveness {} must be positive", self.aggressiveness),
            ));
        }
        if !self.profile.allows_aggressiveness() && self.aggressiveness != 1.0 {
            return Err(invalid(
                "aggressiveness",
                format!(
                    "the {} profile requires aggressiveness 1.0, got {}",
                    self.profile, self.aggressiveness
                ),
            ));
        }
        if !self.extreme_drawdown_pct.is_finite()
            || self.extreme_drawdown_pct <= self.tiers.highest_threshold()
        {
            return Err(invalid(
                "extreme_drawdown_pct",
                format!(
                    "extreme_drawdown_pct {} must exceed the highest tier threshold {}",
                    self.extreme_drawdown_pct,
                    self.tiers.highest_threshold()
                ),
            ));
        }
        if let NewHighReset::AfterRally { min_rally_pct } = self.new_high_reset {
            if !min_rally_pct.is_finite() || min_rally_pct < 0.0 {
                return Err(invalid(
                    "reset_rally_pct",
                    "reset_rally_pct must be non-negative".into(),
                ));
            }
        }
        self.bounds.validate()
    }

    /// Tier multipliers after aggressiveness scaling.
    pub fn effective_multipliers(&self) -> Vec<f64> {
        self.tiers
            .multipliers()
            .into_iter()
            .map(|m| m * self.aggressiveness)
            .collect()
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Profile::Extended.strategy_config(DEFAULT_BASE_QUANTITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restricted_profile_defaults() {
        let c = Profile::Restricted.strategy_config(20);
        assert_eq!(c.tiers.len(), 3);
        assert_eq!(c.interval_days, 7);
        assert_eq!(c.bounds.unit, 10);
        assert_eq!(c.bounds.min, 10);
        assert_eq!(c.bounds.max, 100);
        assert_eq!(c.aggressiveness, 1.0);
        assert!(c.validate().is_ok());
        assert!(!Profile::Restricted.allows_aggressiveness());
    }

    #[test]
    fn extended_profile_defaults() {
        let c = Profile::Extended.strategy_config(20);
        assert_eq!(c.tiers.len(), 5);
        assert_eq!(c.tiers.thresholds(), vec![5.0, 10.0, 20.0, 35.0, 50.0]);
        assert_eq!(c.interval_days, 1);
        assert_eq!(c.bounds.max, 1000);
        assert!(c.validate().is_ok());
        assert!(Profile::Extended.allows_aggressiveness());
    }

    #[test]
    fn profile_parses_case_insensitively() {
        assert_eq!("Restricted".parse::<Profile>(), Ok(Profile::Restricted));
        assert_eq!(" extended ".parse::<Profile>(), Ok(Profile::Extended));
        assert!("premium".parse::<Profile>().is_err());
    }

    #[test]
    fn effective_multipliers_scale_uniformly() {
        let c = StrategyConfig {
            aggressiveness: 2.0,
            ..Profile::Extended.strategy_config(20)
        };
        assert_eq!(c.effective_multipliers(), vec![3.0, 4.0, 6.0, 8.0, 10.0]);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn restricted_profile_locks_aggressiveness() {
        let c = StrategyConfig {
            aggressiveness: 2.0,
            ..Profile::Restricted.strategy_config(20)
        };
        let err = c.validate().unwrap_err();
        assert!(matches!(err, DcaError::ConfigInvalid { key, .. } if key == "aggressiveness"));
    }

    #[test]
    fn zero_interval_fails() {
        let c = StrategyConfig {
            interval_days: 0,
            ..StrategyConfig::default()
        };
        let err = c.validate().unwrap_err();
        assert!(matches!(err, DcaError::ConfigInvalid { key, .. } if key == "interval_days"));
    }

    #[test]
    fn extreme_threshold_must_exceed_deepest_tier() {
        let c = StrategyConfig {
            extreme_drawdown_pct: 50.0,
            ..StrategyConfig::default()
        };
        let err = c.validate().unwrap_err();
        assert!(matches!(err, DcaError::ConfigInvalid { key, .. } if key == "extreme_drawdown_pct"));
    }

    #[test]
    fn non_positive_aggressiveness_fails() {
        let c = StrategyConfig {
            aggressiveness: 0.0,
            ..StrategyConfig::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn zero_base_quantity_fails() {
        let c = StrategyConfig {
            base_quantity: 0,
            ..StrategyConfig::default()
        };
        let err = c.validate().unwrap_err();
        assert!(matches!(err, DcaError::ConfigInvalid { key, .. } if key == "base_quantity"));
    }
}
