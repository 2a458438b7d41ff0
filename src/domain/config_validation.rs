//! Configuration validation and strategy construction.
//!
//! Raw INI values are checked before anything runs; `build_strategy_config`
//! then layers explicit keys over the chosen profile's defaults.

use std::path::PathBuf;

use crate::domain::drawdown::NewHighReset;
use crate::domain::error::DcaError;
use crate::domain::ledger::QuantityBounds;
use crate::domain::strategy::{DEFAULT_BASE_QUANTITY, Profile, StrategyConfig};
use crate::domain::tier::TierConfig;
use crate::ports::config_port::ConfigPort;

/// `[backtest]` values resolved from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestSettings {
    pub initial_balance: f64,
    pub prices: Option<PathBuf>,
    pub baseline_high: Option<f64>,
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), DcaError> {
    validate_initial_balance(config)?;
    validate_baseline_high(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), DcaError> {
    let profile = parse_profile(config)?;
    validate_base_quantity(config)?;
    validate_interval(config)?;
    validate_tier_lists(config)?;
    validate_aggressiveness(config, profile)?;
    validate_extreme_drawdown(config)?;
    validate_quantity_bounds(config)?;
    validate_reset_rally(config)?;
    Ok(())
}

pub fn build_backtest_settings(config: &dyn ConfigPort) -> Result<BacktestSettings, DcaError> {
    validate_backtest_config(config)?;
    Ok(BacktestSettings {
        initial_balance: config.get_double("backtest", "initial_balance", 0.0),
        prices: config
            .get_string("backtest", "prices")
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .map(PathBuf::from),
        baseline_high: optional_f64(config, "backtest", "baseline_high")?,
    })
}

/// Profile defaults overridden by any explicit `[strategy]` keys.
pub fn build_strategy_config(config: &dyn ConfigPort) -> Result<StrategyConfig, DcaError> {
    validate_strategy_config(config)?;
    let profile = parse_profile(config)?;

    let base_quantity =
        optional_u32(config, "base_quantity")?.unwrap_or(DEFAULT_BASE_QUANTITY);
    let mut strategy = profile.strategy_config(base_quantity);

    if let Some(interval) = optional_u32(config, "interval_days")? {
        strategy.interval_days = interval;
    }

    let thresholds = optional_list(config, "tier_thresholds")?;
    let multipliers = optional_list(config, "tier_multipliers")?;
    if thresholds.is_some() || multipliers.is_some() {
        strategy.tiers = TierConfig::new(
            &thresholds.unwrap_or_else(|| strategy.tiers.thresholds()),
            &multipliers.unwrap_or_else(|| strategy.tiers.multipliers()),
        )?;
    }

    if let Some(pct) = optional_f64(config, "strategy", "extreme_drawdown_pct")? {
        strategy.extreme_drawdown_pct = pct;
    }
    if let Some(aggressiveness) = optional_f64(config, "strategy", "aggressiveness")? {
        strategy.aggressiveness = aggressiveness;
    }

    let defaults = strategy.bounds;
    strategy.bounds = QuantityBounds::new(
        optional_u32(config, "quantity_unit")?.unwrap_or(defaults.unit),
        optional_u32(config, "min_quantity")?.unwrap_or(defaults.min),
        optional_u32(config, "max_quantity")?.unwrap_or(defaults.max),
    )?;

    if let Some(pct) = optional_f64(config, "strategy", "reset_rally_pct")? {
        strategy.new_high_reset = NewHighReset::from_rally_pct(pct);
    }

    strategy.validate()?;
    Ok(strategy)
}

/// Parse a comma-separated list of numbers such as `5, 10, 20`.
pub fn parse_number_list(value: &str) -> Result<Vec<f64>, String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .map_err(|_| format!("'{s}' is not a number"))
                .and_then(|v| {
                    if v.is_finite() {
                        Ok(v)
                    } else {
                        Err(format!("'{s}' is not finite"))
                    }
                })
        })
        .collect()
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> DcaError {
    DcaError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn optional_f64(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<f64>, DcaError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| invalid(section, key, format!("{key} '{raw}' is not a number"))),
    }
}

fn optional_u32(config: &dyn ConfigPort, key: &str) -> Result<Option<u32>, DcaError> {
    match config.get_string("strategy", key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| invalid("strategy", key, format!("{key} '{raw}' is not a whole number"))),
    }
}

fn optional_list(config: &dyn ConfigPort, key: &str) -> Result<Option<Vec<f64>>, DcaError> {
    match config.get_string("strategy", key) {
        None => Ok(None),
        Some(raw) => parse_number_list(&raw)
            .map(Some)
            .map_err(|reason| invalid("strategy", key, reason)),
    }
}

fn parse_profile(config: &dyn ConfigPort) -> Result<Profile, DcaError> {
    match config.get_string("strategy", "profile") {
        None => Ok(Profile::Extended),
        Some(raw) => raw
            .parse::<Profile>()
            .map_err(|reason| invalid("strategy", "profile", reason)),
    }
}

fn validate_initial_balance(config: &dyn ConfigPort) -> Result<(), DcaError> {
    match optional_f64(config, "backtest", "initial_balance")? {
        None => Err(DcaError::ConfigMissing {
            section: "backtest".to_string(),
            key: "initial_balance".to_string(),
        }),
        Some(v) if v <= 0.0 => Err(invalid(
            "backtest",
            "initial_balance",
            "initial_balance must be positive",
        )),
        Some(_) => Ok(()),
    }
}

fn validate_baseline_high(config: &dyn ConfigPort) -> Result<(), DcaError> {
    match optional_f64(config, "backtest", "baseline_high")? {
        Some(v) if v <= 0.0 => Err(invalid(
            "backtest",
            "baseline_high",
            "baseline_high must be positive",
        )),
        _ => Ok(()),
    }
}

fn validate_base_quantity(config: &dyn ConfigPort) -> Result<(), DcaError> {
    if optional_u32(config, "base_quantity")? == Some(0) {
        return Err(invalid(
            "strategy",
            "base_quantity",
            "base_quantity must be at least 1",
        ));
    }
    Ok(())
}

fn validate_interval(config: &dyn ConfigPort) -> Result<(), DcaError> {
    if optional_u32(config, "interval_days")? == Some(0) {
        return Err(invalid(
            "strategy",
            "interval_days",
            "interval_days must be at least 1",
        ));
    }
    Ok(())
}

fn validate_tier_lists(config: &dyn ConfigPort) -> Result<(), DcaError> {
    let thresholds = optional_list(config, "tier_thresholds")?;
    let multipliers = optional_list(config, "tier_multipliers")?;
    if let (Some(t), Some(m)) = (&thresholds, &multipliers) {
        if t.len() != m.len() {
            return Err(DcaError::TierConfig {
                reason: format!(
                    "tier_thresholds has {} entries but tier_multipliers has {}",
                    t.len(),
                    m.len()
                ),
            });
        }
    }
    Ok(())
}

fn validate_aggressiveness(config: &dyn ConfigPort, profile: Profile) -> Result<(), DcaError> {
    let Some(value) = optional_f64(config, "strategy", "aggressiveness")? else {
        return Ok(());
    };
    if value <= 0.0 {
        return Err(invalid(
            "strategy",
            "aggressiveness",
            "aggressiveness must be positive",
        ));
    }
    if !profile.allows_aggressiveness() && (value - 1.0).abs() > f64::EPSILON {
        return Err(invalid(
            "strategy",
            "aggressiveness",
            format!("the {profile} profile does not support aggressiveness scaling"),
        ));
    }
    Ok(())
}

fn validate_extreme_drawdown(config: &dyn ConfigPort) -> Result<(), DcaError> {
    match optional_f64(config, "strategy", "extreme_drawdown_pct")? {
        Some(v) if v <= 0.0 || v > 100.0 => Err(invalid(
            "strategy",
            "extreme_drawdown_pct",
            "extreme_drawdown_pct must be between 0 and 100",
        )),
        _ => Ok(()),
    }
}

fn validate_quantity_bounds(config: &dyn ConfigPort) -> Result<(), DcaError> {
    for key in ["quantity_unit", "min_quantity", "max_quantity"] {
        if optional_u32(config, key)? == Some(0) {
            return Err(invalid("strategy", key, format!("{key} must be at least 1")));
        }
    }
    Ok(())
}

fn validate_reset_rally(config: &dyn ConfigPort) -> Result<(), DcaError> {
    match optional_f64(config, "strategy", "reset_rally_pct")? {
        Some(v) if v < 0.0 => Err(invalid(
            "strategy",
            "reset_rally_pct",
            "reset_rally_pct must be non-negative",
        )),
        _ => Ok(()),
    }
}
