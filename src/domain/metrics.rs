//! End-of-run summary statistics.

use chrono::NaiveDate;
use serde::Serialize;

use super::ledger::{TradeRecord, TradeType};
use super::simulation::StepSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_invested: f64,
    pub final_position: u64,
    /// `total_invested / final_position`, or 0 with no shares held.
    pub average_cost: f64,
    pub final_price: f64,
    /// Market value of the position at the last price.
    pub final_value: f64,
    /// Return on invested capital, in percent.
    pub total_return_pct: f64,
    /// Largest price drawdown from the running high, in percent.
    pub max_drawdown_observed: f64,
    pub max_drawdown_date: Option<NaiveDate>,

    pub initial_balance: f64,
    pub final_cash: f64,
    /// Cash plus market value.
    pub final_equity: f64,
    /// Return of `final_equity` against `initial_balance`, in percent.
    pub equity_return_pct: f64,
    /// Largest peak-to-trough decline of cash plus market value, in percent.
    pub max_equity_drawdown_pct: f64,

    pub trade_count: usize,
    pub periodic_count: usize,
    pub add_on_count: usize,
    pub partial_fill_count: usize,
    /// Add-on count per tier index.
    pub add_ons_per_tier: Vec<usize>,
    pub steps: usize,
}

impl Summary {
    pub fn compute(
        initial_balance: f64,
        trades: &[TradeRecord],
        snapshots: &[StepSnapshot],
        tier_count: usize,
    ) -> Self {
        let total_invested: f64 = trades.iter().map(|t| t.amount).sum();
        let final_position: u64 = trades.iter().map(|t| u64::from(t.quantity)).sum();

        let last = snapshots.last();
        let final_price = last.map(|s| s.price).unwrap_or(0.0);
        let final_cash = last.map(|s| s.cash).unwrap_or(initial_balance);

        let average_cost = if final_position > 0 {
            total_invested / final_position as f64
        } else {
            0.0
        };
        let final_value = final_position as f64 * final_price;
        let total_return_pct = if total_invested > 0.0 {
            (final_value - total_invested) / total_invested * 100.0
        } else {
            0.0
        };

        let final_equity = final_cash + final_value;
        let equity_return_pct = if initial_balance > 0.0 {
            (final_equity - initial_balance) / initial_balance * 100.0
        } else {
            0.0
        };

        // first date wins on ties
        let mut max_drawdown_observed = 0.0_f64;
        let mut max_drawdown_date = None;
        for snap in snapshots {
            if snap.drawdown_pct > max_drawdown_observed {
                max_drawdown_observed = snap.drawdown_pct;
                max_drawdown_date = Some(snap.date);
            }
        }

        let mut periodic_count = 0usize;
        let mut add_on_count = 0usize;
        let mut add_ons_per_tier = vec![0usize; tier_count];
        for trade in trades {
            match trade.trade_type {
                TradeType::Periodic => periodic_count += 1,
                TradeType::TieredAddOn { tier } => {
                    add_on_count += 1;
                    if let Some(count) = add_ons_per_tier.get_mut(tier) {
                        *count += 1;
                    }
                }
            }
        }

        Summary {
            total_invested,
            final_position,
            average_cost,
            final_price,
            final_value,
            total_return_pct,
            max_drawdown_observed,
            max_drawdown_date,
            initial_balance,
            final_cash,
            final_equity,
            equity_return_pct,
            max_equity_drawdown_pct: compute_equity_drawdown(snapshots),
            trade_count: trades.len(),
            periodic_count,
            add_on_count,
            partial_fill_count: trades.iter().filter(|t| t.is_partial_fill()).count(),
            add_ons_per_tier,
            steps: snapshots.len(),
        }
    }
}

fn compute_equity_drawdown(snapshots: &[StepSnapshot]) -> f64 {
    let mut peak = match snapshots.first() {
        Some(s) => s.total_value,
        None => return 0.0,
    };
    let mut max_dd = 0.0_f64;

    for snap in snapshots {
        if snap.total_value > peak {
            peak = snap.total_value;
        } else if peak > 0.0 {
            let dd = (peak - snap.total_value) / peak * 100.0;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }

    max_dd
}
