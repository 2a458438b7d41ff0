//! Parameter sweeps over aggressiveness and schedule interval.
//!
//! Every grid point is an independent simulation on its own fresh state, so
//! points run in parallel with rayon and come back in grid order.

use rayon::prelude::*;
use serde::Serialize;

use super::error::DcaError;
use super::metrics::Summary;
use super::price::PricePoint;
use super::simulation::simulate;
use super::strategy::StrategyConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct SweepGrid {
    pub aggressiveness: Vec<f64>,
    pub interval_days: Vec<u32>,
}

impl SweepGrid {
    /// Single-point grid taken from `base`.
    pub fn from_config(base: &StrategyConfig) -> Self {
        SweepGrid {
            aggressiveness: vec![base.aggressiveness],
            interval_days: vec![base.interval_days],
        }
    }

    pub fn size(&self) -> usize {
        self.aggressiveness.len() * self.interval_days.len()
    }

    /// Aggressiveness-major order.
    pub fn generate_configs(&self, base: &StrategyConfig) -> Vec<StrategyConfig> {
        let mut configs = Vec::with_capacity(self.size());
        for &aggressiveness in &self.aggressiveness {
            for &interval_days in &self.interval_days {
                configs.push(StrategyConfig {
                    aggressiveness,
                    interval_days,
                    ..base.clone()
                });
            }
        }
        configs
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepOutcome {
    pub label: String,
    pub config: StrategyConfig,
    pub summary: Summary,
}

pub fn sweep_label(config: &StrategyConfig) -> String {
    format!("aggr={:.2} interval={}d", config.aggressiveness, config.interval_days)
}

/// Run every grid point against the same prices. Fails on the first
/// invalid configuration before anything is simulated.
pub fn run_sweep(
    grid: &SweepGrid,
    base: &StrategyConfig,
    initial_balance: f64,
    baseline_high: Option<f64>,
    prices: &[PricePoint],
    parallel: bool,
) -> Result<Vec<SweepOutcome>, DcaError> {
    let configs = grid.generate_configs(base);
    if configs.is_empty() {
        return Err(DcaError::ConfigInvalid {
            section: "sweep".into(),
            key: "grid".into(),
            reason: "sweep grid has no points".into(),
        });
    }
    for config in &configs {
        config.validate()?;
    }
    tracing::info!(points = configs.len(), parallel, "running sweep");

    let run_one = |config: &StrategyConfig| -> Result<SweepOutcome, DcaError> {
        let result = simulate(config, initial_balance, baseline_high, prices)?;
        Ok(SweepOutcome {
            label: sweep_label(config),
            config: result.config,
            summary: result.summary,
        })
    };

    if parallel {
        configs.par_iter().map(run_one).collect()
    } else {
        configs.iter().map(run_one).collect()
    }
}
