//! Cash/position ledger and trade execution.
//!
//! Every trade goes through [`Ledger::attempt_trade`]:
//! 1. Snap the desired quantity into the configured bounds
//! 2. If the cash balance cannot cover it, reduce to the affordable quantity
//! 3. If not even one share is affordable, do nothing
//! 4. Otherwise debit cash, credit position and cost, append the record

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::DcaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TradeType {
    Periodic,
    /// `tier` is the zero-based index into the tier table.
    TieredAddOn { tier: usize },
}

impl TradeType {
    pub fn is_add_on(&self) -> bool {
        matches!(self, TradeType::TieredAddOn { .. })
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeType::Periodic => write!(f, "periodic"),
            TradeType::TieredAddOn { tier } => write!(f, "tiered-add-on[{tier}]"),
        }
    }
}

/// Allowed order sizes: `min..=max`, in multiples of `unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityBounds {
    pub unit: u32,
    pub min: u32,
    pub max: u32,
}

impl QuantityBounds {
    pub fn new(unit: u32, min: u32, max: u32) -> Result<Self, DcaError> {
        let bounds = QuantityBounds { unit, min, max };
        bounds.validate()?;
        Ok(bounds)
    }

    pub fn validate(&self) -> Result<(), DcaError> {
        let invalid = |key: &str, reason: String| DcaError::ConfigInvalid {
            section: "strategy".into(),
            key: key.into(),
            reason,
        };
        if self.unit == 0 {
            return Err(invalid("quantity_unit", "quantity_unit must be at least 1".into()));
        }
        if self.min == 0 {
            return Err(invalid("min_quantity", "min_quantity must be at least 1".into()));
        }
        if self.min > self.max {
            return Err(invalid(
                "min_quantity",
                format!("min_quantity {} exceeds max_quantity {}", self.min, self.max),
            ));
        }
        if self.min % self.unit != 0 {
            return Err(invalid(
                "min_quantity",
                format!("min_quantity {} is not a multiple of {}", self.min, self.unit),
            ));
        }
        Ok(())
    }

    /// Clamp into range, then round down to a multiple of `unit` without
    /// dropping below `min`.
    pub fn snap(&self, quantity: u32) -> u32 {
        let clamped = quantity.clamp(self.min, self.max);
        let unit = self.unit.max(1);
        (clamped / unit * unit).max(self.min)
    }

    pub fn contains(&self, quantity: u32) -> bool {
        self.snap(quantity) == quantity
    }
}

impl Default for QuantityBounds {
    fn default() -> Self {
        QuantityBounds {
            unit: 1,
            min: 1,
            max: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub date: NaiveDate,
    pub price: f64,
    /// Quantity after bounds snapping, before the cash constraint.
    pub requested_quantity: u32,
    pub quantity: u32,
    pub amount: f64,
    pub trade_type: TradeType,
    pub resulting_balance: f64,
    pub resulting_position: u64,
    pub resulting_cost: f64,
}

impl TradeRecord {
    pub fn is_partial_fill(&self) -> bool {
        self.quantity < self.requested_quantity
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    initial_balance: f64,
    cash_balance: f64,
    position_shares: u64,
    cumulative_cost: f64,
    bounds: QuantityBounds,
    trades: Vec<TradeRecord>,
}

impl Ledger {
    pub fn new(initial_balance: f64, bounds: QuantityBounds) -> Self {
        Ledger {
            initial_balance,
            cash_balance: initial_balance.max(0.0),
            position_shares: 0,
            cumulative_cost: 0.0,
            bounds,
            trades: Vec::new(),
        }
    }

    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    pub fn cash_balance(&self) -> f64 {
        self.cash_balance
    }

    pub fn position_shares(&self) -> u64 {
        self.position_shares
    }

    pub fn cumulative_cost(&self) -> f64 {
        self.cumulative_cost
    }

    pub fn bounds(&self) -> &QuantityBounds {
        &self.bounds
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn into_trades(self) -> Vec<TradeRecord> {
        self.trades
    }

    pub fn average_cost(&self) -> f64 {
        if self.position_shares > 0 {
            self.cumulative_cost / self.position_shares as f64
        } else {
            0.0
        }
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.position_shares as f64 * price
    }

    pub fn total_equity(&self, price: f64) -> f64 {
        self.cash_balance + self.market_value(price)
    }

    /// Try to buy `desired_quantity` at `price`. Returns `None` when not even
    /// a single share is affordable; the ledger is then left untouched.
    pub fn attempt_trade(
        &mut self,
        date: NaiveDate,
        desired_quantity: u32,
        price: f64,
        trade_type: TradeType,
    ) -> Option<TradeRecord> {
        if !price.is_finite() || price <= 0.0 {
            return None;
        }

        let requested = self.bounds.snap(desired_quantity);
        let mut quantity = requested;

        if quantity as f64 * price > self.cash_balance {
            let affordable = (self.cash_balance / price).floor();
            if affordable < 1.0 {
                tracing::debug!(
                    %date,
                    price,
                    requested,
                    cash = self.cash_balance,
                    trade_type = %trade_type,
                    "insufficient funds, trade skipped"
                );
                return None;
            }
            quantity = affordable as u32;
            tracing::info!(
                %date,
                requested,
                filled = quantity,
                trade_type = %trade_type,
                "partial fill limited by cash"
            );
        }

        let amount = quantity as f64 * price;
        self.cash_balance = (self.cash_balance - amount).max(0.0);
        self.cumulative_cost += amount;
        self.position_shares += u64::from(quantity);

        let record = TradeRecord {
            date,
            price,
            requested_quantity: requested,
            quantity,
            amount,
            trade_type,
            resulting_balance: self.cash_balance,
            resulting_position: self.position_shares,
            resulting_cost: self.cumulative_cost,
        };
        tracing::debug!(%date, quantity, price, amount, trade_type = %trade_type, "trade committed");
        self.trades.push(record.clone());
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn open_bounds() -> QuantityBounds {
        QuantityBounds::new(1, 1, 1000).unwrap()
    }

    #[test]
    fn new_ledger() {
        let ledger = Ledger::new(10_000.0, open_bounds());
        assert_relative_eq!(ledger.initial_balance(), 10_000.0);
        assert_relative_eq!(ledger.cash_balance(), 10_000.0);
        assert_eq!(ledger.position_shares(), 0);
        assert_eq!(ledger.cumulative_cost(), 0.0);
        assert!(ledger.trades().is_empty());
    }

    #[test]
    fn initial_balance_is_fixed_after_trades() {
        let mut ledger = Ledger::new(1_000.0, open_bounds());
        ledger.attempt_trade(day(1), 5, 100.0, TradeType::Periodic).unwrap();
        assert_relative_eq!(ledger.initial_balance(), 1_000.0);
        assert_relative_eq!(ledger.cash_balance(), 500.0);
    }

    #[test]
    fn full_fill_updates_all_balances() {
        let mut ledger = Ledger::new(10_000.0, open_bounds());
        let rec = ledger
            .attempt_trade(day(1), 20, 100.0, TradeType::Periodic)
            .unwrap();
        assert_eq!(rec.quantity, 20);
        assert!(!rec.is_partial_fill());
        assert_relative_eq!(rec.amount, 2_000.0);
        assert_relative_eq!(rec.resulting_balance, 8_000.0);
        assert_eq!(rec.resulting_position, 20);
        assert_relative_eq!(rec.resulting_cost, 2_000.0);
        assert_relative_eq!(ledger.cash_balance(), 8_000.0);
        assert_eq!(ledger.trades().len(), 1);
    }

    #[test]
    fn partial_fill_uses_affordable_quantity() {
        let mut ledger = Ledger::new(1_000.0, open_bounds());
        let rec = ledger
            .attempt_trade(day(1), 5, 501.0, TradeType::Periodic)
            .unwrap();
        assert_eq!(rec.quantity, 1);
        assert_eq!(rec.requested_quantity, 5);
        assert!(rec.is_partial_fill());
        assert_relative_eq!(ledger.cash_balance(), 499.0);
        assert_eq!(ledger.position_shares(), 1);
        assert_relative_eq!(ledger.cumulative_cost(), 501.0);
    }

    #[test]
    fn unaffordable_trade_is_a_no_op() {
        let mut ledger = Ledger::new(100.0, open_bounds());
        let before = ledger.clone();
        let rec = ledger.attempt_trade(day(1), 1, 501.0, TradeType::TieredAddOn { tier: 0 });
        assert!(rec.is_none());
        assert_eq!(ledger, before);
    }

    #[test]
    fn exact_cash_is_affordable() {
        let mut ledger = Ledger::new(500.0, open_bounds());
        let rec = ledger
            .attempt_trade(day(1), 5, 100.0, TradeType::Periodic)
            .unwrap();
        assert_eq!(rec.quantity, 5);
        assert_eq!(ledger.cash_balance(), 0.0);
    }

    #[test]
    fn desired_quantity_is_snapped_into_bounds() {
        let bounds = QuantityBounds::new(10, 10, 100).unwrap();
        assert_eq!(bounds.snap(5), 10);
        assert_eq!(bounds.snap(15), 10);
        assert_eq!(bounds.snap(25), 20);
        assert_eq!(bounds.snap(105), 100);
        assert_eq!(bounds.snap(200), 100);
        assert_eq!(bounds.snap(60), 60);
        assert!(bounds.contains(30));
        assert!(!bounds.contains(35));
    }

    #[test]
    fn snapping_applies_before_cash_check() {
        let mut ledger = Ledger::new(100_000.0, QuantityBounds::new(10, 10, 100).unwrap());
        let rec = ledger
            .attempt_trade(day(1), 150, 10.0, TradeType::TieredAddOn { tier: 2 })
            .unwrap();
        assert_eq!(rec.requested_quantity, 100);
        assert_eq!(rec.quantity, 100);
    }

    #[test]
    fn invalid_bounds_are_rejected() {
        assert!(QuantityBounds::new(0, 1, 10).is_err());
        assert!(QuantityBounds::new(1, 0, 10).is_err());
        assert!(QuantityBounds::new(1, 20, 10).is_err());
        assert!(QuantityBounds::new(10, 15, 100).is_err());
    }

    #[test]
    fn cumulative_cost_matches_trade_amounts() {
        let mut ledger = Ledger::new(5_000.0, open_bounds());
        for (d, price) in [(1, 101.3), (2, 99.7), (3, 250.1), (4, 180.0), (5, 410.9)] {
            ledger.attempt_trade(day(d), 7, price, TradeType::Periodic);
        }
        let sum: f64 = ledger.trades().iter().map(|t| t.amount).sum();
        assert_relative_eq!(ledger.cumulative_cost(), sum, epsilon = 1e-9);
        assert!(ledger.cash_balance() >= 0.0);
        let shares: u64 = ledger.trades().iter().map(|t| u64::from(t.quantity)).sum();
        assert_eq!(ledger.position_shares(), shares);
    }

    #[test]
    fn average_cost_and_equity() {
        let mut ledger = Ledger::new(10_000.0, open_bounds());
        ledger.attempt_trade(day(1), 10, 100.0, TradeType::Periodic);
        ledger.attempt_trade(day(2), 10, 50.0, TradeType::Periodic);
        assert_relative_eq!(ledger.average_cost(), 75.0);
        assert_relative_eq!(ledger.market_value(80.0), 1_600.0);
        assert_relative_eq!(ledger.total_equity(80.0), 8_500.0 + 1_600.0);
    }

    #[test]
    fn trade_type_labels() {
        assert_eq!(TradeType::Periodic.to_string(), "periodic");
        assert_eq!(TradeType::TieredAddOn { tier: 2 }.to_string(), "tiered-add-on[2]");
        assert!(TradeType::TieredAddOn { tier: 0 }.is_add_on());
        assert!(!TradeType::Periodic.is_add_on());
    }
}
