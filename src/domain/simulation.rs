//! Step-by-step simulation of the tiered DCA strategy.
//!
//! Each price point runs the same fixed sequence:
//! 1. Reject out-of-order dates, update the drawdown tracker
//! 2. Unless the extreme-drawdown policy applies, select a tier and try the add-on
//! 3. If the schedule gate is due, try the periodic base investment
//! 4. Record a snapshot of the resulting state
//!
//! All mutable state lives in one [`Simulation`] value, so independent runs
//! never share anything and a run can be inspected after any step.

use chrono::NaiveDate;
use serde::Serialize;

use super::drawdown::{DrawdownState, DrawdownTracker};
use super::error::DcaError;
use super::ledger::{Ledger, TradeRecord, TradeType};
use super::metrics::Summary;
use super::price::PricePoint;
use super::schedule::ScheduleGate;
use super::strategy::StrategyConfig;
use super::tier::{is_extreme_drawdown, select_tier};

pub const MONITOR_DRAWDOWN_PCT: f64 = 10.0;
pub const ALERT_DRAWDOWN_PCT: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskLevel {
    Normal,
    Monitor,
    Alert,
    /// Extreme-drawdown policy engaged; tier add-ons suppressed.
    Extreme,
}

impl RiskLevel {
    pub fn classify(drawdown_pct: f64, extreme: bool) -> Self {
        if extreme {
            RiskLevel::Extreme
        } else if drawdown_pct >= ALERT_DRAWDOWN_PCT {
            RiskLevel::Alert
        } else if drawdown_pct >= MONITOR_DRAWDOWN_PCT {
            RiskLevel::Monitor
        } else {
            RiskLevel::Normal
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepSnapshot {
    pub date: NaiveDate,
    pub price: f64,
    pub running_high: f64,
    pub drawdown_pct: f64,
    pub cash: f64,
    pub position: u64,
    pub market_value: f64,
    pub total_value: f64,
    pub risk_level: RiskLevel,
    pub add_on_quantity: u32,
    pub periodic_quantity: u32,
}

/// What happened during one step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub snapshot: StepSnapshot,
    pub add_on: Option<TradeRecord>,
    pub periodic: Option<TradeRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    pub config: StrategyConfig,
    pub trades: Vec<TradeRecord>,
    pub snapshots: Vec<StepSnapshot>,
    pub summary: Summary,
}

#[derive(Debug, Clone)]
pub struct Simulation {
    config: StrategyConfig,
    tracker: DrawdownTracker,
    gate: ScheduleGate,
    ledger: Ledger,
    snapshots: Vec<StepSnapshot>,
    last_date: Option<NaiveDate>,
    extreme_warned: bool,
}

impl Simulation {
    /// Validates the configuration up front; nothing runs on a bad config.
    pub fn new(config: StrategyConfig, initial_balance: f64) -> Result<Self, DcaError> {
        config.validate()?;
        if !initial_balance.is_finite() || initial_balance <= 0.0 {
            return Err(DcaError::ConfigInvalid {
                section: "backtest".into(),
                key: "initial_balance".into(),
                reason: "initial_balance must be positive".into(),
            });
        }
        Ok(Simulation {
            tracker: DrawdownTracker::new(config.new_high_reset),
            gate: ScheduleGate::new(config.interval_days),
            ledger: Ledger::new(initial_balance, config.bounds),
            config,
            snapshots: Vec::new(),
            last_date: None,
            extreme_warned: false,
        })
    }

    /// Seed the running high before the first step.
    pub fn with_baseline_high(mut self, baseline_high: f64) -> Self {
        if self.snapshots.is_empty() {
            self.tracker = DrawdownTracker::with_baseline(baseline_high, self.config.new_high_reset);
        }
        self
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn drawdown_state(&self) -> &DrawdownState {
        self.tracker.state()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn schedule(&self) -> &ScheduleGate {
        &self.gate
    }

    pub fn snapshots(&self) -> &[StepSnapshot] {
        &self.snapshots
    }

    pub fn step(&mut self, point: &PricePoint) -> Result<StepOutcome, DcaError> {
        if let Some(previous) = self.last_date {
            if point.date < previous {
                return Err(DcaError::OutOfOrder {
                    previous,
                    date: point.date,
                });
            }
        }

        let update = self.tracker.observe(point.price).inspect_err(|e| {
            tracing::error!(date = %point.date, price = point.price, "aborting run: {e}");
        })?;
        self.last_date = Some(point.date);
        let drawdown_pct = update.drawdown_pct;

        if update.tiers_reset {
            tracing::debug!(date = %point.date, high = point.price, "new high, tiers re-armed");
        }

        let extreme = is_extreme_drawdown(
            drawdown_pct,
            &self.config.tiers,
            self.config.extreme_drawdown_pct,
        );

        if !extreme {
            self.extreme_warned = false;
        }

        let mut add_on = None;
        if extreme {
            if !self.extreme_warned {
                tracing::warn!(
                    date = %point.date,
                    drawdown_pct,
                    threshold = self.config.extreme_drawdown_pct,
                    "extreme drawdown, tier add-ons suspended"
                );
                self.extreme_warned = true;
            }
        } else if let Some(selection) = select_tier(
            drawdown_pct,
            &self.config.tiers,
            self.tracker.last_triggered_tier(),
            self.config.aggressiveness,
        ) {
            // the tier is spent once selected, even if cash cannot cover it
            self.tracker.mark_tier_fired(selection.index);
            let quantity = selection.add_on_quantity(self.config.base_quantity);
            tracing::info!(
                date = %point.date,
                tier = selection.index,
                threshold = selection.threshold_pct,
                multiplier = selection.multiplier,
                drawdown_pct,
                quantity,
                "tier triggered"
            );
            add_on = self.ledger.attempt_trade(
                point.date,
                quantity,
                point.price,
                TradeType::TieredAddOn {
                    tier: selection.index,
                },
            );
        }

        let mut periodic = None;
        if self.gate.is_due(point.date) {
            periodic = self.ledger.attempt_trade(
                point.date,
                self.config.base_quantity,
                point.price,
                TradeType::Periodic,
            );
            if periodic.is_some() {
                self.gate.record_investment(point.date);
            }
        }

        let market_value = self.ledger.market_value(point.price);
        let snapshot = StepSnapshot {
            date: point.date,
            price: point.price,
            running_high: self.tracker.running_high().unwrap_or(point.price),
            drawdown_pct,
            cash: self.ledger.cash_balance(),
            position: self.ledger.position_shares(),
            market_value,
            total_value: self.ledger.cash_balance() + market_value,
            risk_level: RiskLevel::classify(drawdown_pct, extreme),
            add_on_quantity: add_on.as_ref().map_or(0, |t| t.quantity),
            periodic_quantity: periodic.as_ref().map_or(0, |t| t.quantity),
        };
        self.snapshots.push(snapshot.clone());

        Ok(StepOutcome {
            snapshot,
            add_on,
            periodic,
        })
    }

    /// Run every point in order, then summarise.
    pub fn run(mut self, prices: &[PricePoint]) -> Result<SimulationResult, DcaError> {
        if prices.is_empty() {
            return Err(DcaError::EmptySeries);
        }
        for point in prices {
            self.step(point)?;
        }
        self.finish()
    }

    /// Summarise the steps taken so far.
    pub fn finish(self) -> Result<SimulationResult, DcaError> {
        if self.snapshots.is_empty() {
            return Err(DcaError::EmptySeries);
        }
        let initial_balance = self.ledger.initial_balance();
        let trades = self.ledger.into_trades();
        let summary = Summary::compute(
            initial_balance,
            &trades,
            &self.snapshots,
            self.config.tiers.len(),
        );
        tracing::info!(
            steps = summary.steps,
            trades = summary.trade_count,
            invested = summary.total_invested,
            return_pct = summary.total_return_pct,
            "simulation complete"
        );
        Ok(SimulationResult {
            config: self.config,
            trades,
            snapshots: self.snapshots,
            summary,
        })
    }
}

/// Run one configuration over a price series on fresh state.
pub fn simulate(
    config: &StrategyConfig,
    initial_balance: f64,
    baseline_high: Option<f64>,
    prices: &[PricePoint],
) -> Result<SimulationResult, DcaError> {
    let mut sim = Simulation::new(config.clone(), initial_balance)?;
    if let Some(high) = baseline_high {
        sim = sim.with_baseline_high(high);
    }
    sim.run(prices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ledger::QuantityBounds;
    use crate::domain::strategy::Profile;
    use crate::domain::tier::TierConfig;
    use approx::assert_relative_eq;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(n)
    }

    fn three_tier_config(interval_days: u32) -> StrategyConfig {
        StrategyConfig {
            profile: Profile::Extended,
            base_quantity: 20,
            interval_days,
            tiers: TierConfig::new(&[5.0, 10.0, 20.0], &[1.5, 2.0, 3.0]).unwrap(),
            extreme_drawdown_pct: 60.0,
            aggressiveness: 1.0,
            bounds: QuantityBounds::new(1, 1, 1000).unwrap(),
            new_high_reset: Default::default(),
        }
    }

    fn series(prices: &[f64]) -> Vec<PricePoint> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| PricePoint::new(day(i as i64), p))
            .collect()
    }

    #[test]
    fn add_on_and_periodic_in_same_step() {
        let mut sim = Simulation::new(three_tier_config(1), 100_000.0).unwrap();
        sim.step(&PricePoint::new(day(0), 500.0)).unwrap();
        let out = sim.step(&PricePoint::new(day(1), 390.0)).unwrap();

        let add_on = out.add_on.unwrap();
        assert_eq!(add_on.trade_type, TradeType::TieredAddOn { tier: 2 });
        assert_eq!(add_on.quantity, 60);
        let periodic = out.periodic.unwrap();
        assert_eq!(periodic.quantity, 20);
        assert_eq!(sim.ledger().trades().len(), 3);
        // add-on is recorded before the periodic trade
        assert!(sim.ledger().trades()[1].trade_type.is_add_on());
    }

    #[test]
    fn tier_fires_once_per_leg() {
        let result = simulate(
            &three_tier_config(1000),
            100_000.0,
            None,
            &series(&[100.0, 94.0, 93.0, 89.0, 85.0, 79.0, 78.0]),
        )
        .unwrap();
        let tiers: Vec<_> = result
            .trades
            .iter()
            .filter_map(|t| match t.trade_type {
                TradeType::TieredAddOn { tier } => Some(tier),
                TradeType::Periodic => None,
            })
            .collect();
        assert_eq!(tiers, vec![0, 1, 2]);
    }

    #[test]
    fn new_high_rearms_tiers() {
        let result = simulate(
            &three_tier_config(1000),
            100_000.0,
            None,
            &series(&[100.0, 90.0, 105.0, 94.0]),
        )
        .unwrap();
        let add_ons: Vec<_> = result
            .trades
            .iter()
            .filter(|t| t.trade_type.is_add_on())
            .map(|t| (t.date, t.trade_type))
            .collect();
        assert_eq!(
            add_ons,
            vec![
                (day(1), TradeType::TieredAddOn { tier: 1 }),
                (day(3), TradeType::TieredAddOn { tier: 1 }),
            ]
        );
    }

    #[test]
    fn extreme_drawdown_suppresses_add_on_but_not_periodic() {
        let mut sim = Simulation::new(three_tier_config(1), 1_000_000.0).unwrap();
        sim.step(&PricePoint::new(day(0), 100.0)).unwrap();
        let out = sim.step(&PricePoint::new(day(1), 35.0)).unwrap();
        assert!(out.add_on.is_none());
        assert!(out.periodic.is_some());
        assert_eq!(out.snapshot.risk_level, RiskLevel::Extreme);
        // tiers were not consumed while suppressed
        assert_eq!(sim.drawdown_state().last_triggered_tier, None);

        let out = sim.step(&PricePoint::new(day(2), 55.0)).unwrap();
        assert_eq!(out.add_on.unwrap().trade_type, TradeType::TieredAddOn { tier: 2 });
    }

    #[test]
    fn unaffordable_periodic_leaves_gate_open() {
        let mut sim = Simulation::new(three_tier_config(7), 150.0).unwrap();
        let out = sim.step(&PricePoint::new(day(0), 200.0)).unwrap();
        assert!(out.periodic.is_none());
        assert_eq!(sim.schedule().last_investment_date(), None);

        let out = sim.step(&PricePoint::new(day(1), 140.0)).unwrap();
        // 30% drawdown fires tier 2 first and spends the cash
        assert_eq!(out.add_on.unwrap().quantity, 1);
        assert!(out.periodic.is_none());
        assert_eq!(sim.schedule().last_investment_date(), None);
    }

    #[test]
    fn add_on_does_not_move_schedule() {
        let mut sim = Simulation::new(three_tier_config(7), 100_000.0).unwrap();
        sim.step(&PricePoint::new(day(0), 100.0)).unwrap();
        sim.step(&PricePoint::new(day(3), 90.0)).unwrap();
        assert_eq!(sim.schedule().last_investment_date(), Some(day(0)));
    }

    #[test]
    fn invalid_price_aborts() {
        let mut sim = Simulation::new(three_tier_config(1), 10_000.0).unwrap();
        sim.step(&PricePoint::new(day(0), 100.0)).unwrap();
        let err = sim.step(&PricePoint::new(day(1), 0.0)).unwrap_err();
        assert!(matches!(err, DcaError::InvalidPrice { .. }));
        assert_eq!(sim.snapshots().len(), 1);

        let err = simulate(&three_tier_config(1), 10_000.0, None, &series(&[100.0, -1.0])).unwrap_err();
        assert!(matches!(err, DcaError::InvalidPrice { .. }));
    }

    #[test]
    fn out_of_order_dates_abort() {
        let mut sim = Simulation::new(three_tier_config(1), 10_000.0).unwrap();
        sim.step(&PricePoint::new(day(5), 100.0)).unwrap();
        let err = sim.step(&PricePoint::new(day(4), 100.0)).unwrap_err();
        assert!(matches!(err, DcaError::OutOfOrder { .. }));
    }

    #[test]
    fn empty_series_is_an_error() {
        let err = simulate(&three_tier_config(1), 10_000.0, None, &[]).unwrap_err();
        assert!(matches!(err, DcaError::EmptySeries));
    }

    #[test]
    fn invalid_config_rejected_before_running() {
        let config = StrategyConfig {
            interval_days: 0,
            ..three_tier_config(1)
        };
        assert!(Simulation::new(config, 10_000.0).is_err());
        assert!(Simulation::new(three_tier_config(1), 0.0).is_err());
    }

    #[test]
    fn baseline_high_triggers_tier_on_first_step() {
        let result = simulate(&three_tier_config(7), 100_000.0, Some(500.0), &series(&[440.0])).unwrap();
        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[0].trade_type, TradeType::TieredAddOn { tier: 1 });
        assert_eq!(result.trades[0].quantity, 40);
    }

    #[test]
    fn restricted_profile_snaps_add_on_sizes() {
        let config = Profile::Restricted.strategy_config(20);
        let result = simulate(&config, 100_000.0, None, &series(&[100.0, 94.0])).unwrap();
        let add_on = result.trades.iter().find(|t| t.trade_type.is_add_on()).unwrap();
        // floor(20 × 1.5) = 30, already a multiple of 10
        assert_eq!(add_on.quantity, 30);

        let config = Profile::Restricted.strategy_config(10);
        let result = simulate(&config, 100_000.0, None, &series(&[100.0, 94.0])).unwrap();
        let add_on = result.trades.iter().find(|t| t.trade_type.is_add_on()).unwrap();
        // floor(10 × 1.5) = 15 snaps down to 10
        assert_eq!(add_on.quantity, 10);
    }

    #[test]
    fn snapshots_track_equity() {
        let result = simulate(&three_tier_config(1), 10_000.0, None, &series(&[100.0, 110.0])).unwrap();
        assert_eq!(result.snapshots.len(), 2);
        let last = &result.snapshots[1];
        assert_eq!(last.position, 40);
        assert_relative_eq!(last.market_value, 4_400.0);
        assert_relative_eq!(last.cash, 10_000.0 - 2_000.0 - 2_200.0);
        assert_relative_eq!(last.total_value, last.cash + last.market_value);
        assert_eq!(last.risk_level, RiskLevel::Normal);
    }

    #[test]
    fn risk_levels() {
        assert_eq!(RiskLevel::classify(3.0, false), RiskLevel::Normal);
        assert_eq!(RiskLevel::classify(10.0, false), RiskLevel::Monitor);
        assert_eq!(RiskLevel::classify(25.0, false), RiskLevel::Alert);
        assert_eq!(RiskLevel::classify(25.0, true), RiskLevel::Extreme);
    }
}
