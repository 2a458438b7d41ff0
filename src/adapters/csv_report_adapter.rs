//! CSV trade log and sweep table output.

use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::error::DcaError;
use crate::domain::simulation::SimulationResult;
use crate::domain::sweep::SweepOutcome;
use crate::ports::report_port::ReportPort;

#[derive(Serialize)]
struct TradeRow {
    date: NaiveDate,
    trade_type: String,
    price: f64,
    requested_quantity: u32,
    quantity: u32,
    amount: f64,
    cash_balance: f64,
    position: u64,
    cumulative_cost: f64,
}

#[derive(Serialize)]
struct SweepRow<'a> {
    label: &'a str,
    aggressiveness: f64,
    interval_days: u32,
    total_invested: f64,
    final_position: u64,
    average_cost: f64,
    final_value: f64,
    total_return_pct: f64,
    final_equity: f64,
    equity_return_pct: f64,
    trade_count: usize,
    add_on_count: usize,
}

/// One row per executed trade.
#[derive(Debug, Default)]
pub struct CsvTradeLogAdapter;

impl CsvTradeLogAdapter {
    pub fn new() -> Self {
        Self
    }
}

fn csv_error(e: csv::Error) -> DcaError {
    DcaError::Report {
        reason: format!("CSV write error: {}", e),
    }
}

impl ReportPort for CsvTradeLogAdapter {
    fn write(&self, result: &SimulationResult, output_path: &Path) -> Result<(), DcaError> {
        let mut wtr = csv::Writer::from_path(output_path).map_err(csv_error)?;
        for trade in &result.trades {
            wtr.serialize(TradeRow {
                date: trade.date,
                trade_type: trade.trade_type.to_string(),
                price: trade.price,
                requested_quantity: trade.requested_quantity,
                quantity: trade.quantity,
                amount: trade.amount,
                cash_balance: trade.resulting_balance,
                position: trade.resulting_position,
                cumulative_cost: trade.resulting_cost,
            })
            .map_err(csv_error)?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_sweep(&self, outcomes: &[SweepOutcome], output_path: &Path) -> Result<(), DcaError> {
        let mut wtr = csv::Writer::from_path(output_path).map_err(csv_error)?;
        for outcome in outcomes {
            let s = &outcome.summary;
            wtr.serialize(SweepRow {
                label: &outcome.label,
                aggressiveness: outcome.config.aggressiveness,
                interval_days: outcome.config.interval_days,
                total_invested: s.total_invested,
                final_position: s.final_position,
                average_cost: s.average_cost,
                final_value: s.final_value,
                total_return_pct: s.total_return_pct,
                final_equity: s.final_equity,
                equity_return_pct: s.equity_return_pct,
                trade_count: s.trade_count,
                add_on_count: s.add_on_count,
            })
            .map_err(csv_error)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price::PricePoint;
    use crate::domain::simulation::simulate;
    use crate::domain::strategy::Profile;
    use crate::domain::sweep::{SweepGrid, run_sweep};
    use std::fs;
    use tempfile::TempDir;

    fn prices() -> Vec<PricePoint> {
        [(1, 100.0), (2, 90.0), (3, 95.0)]
            .iter()
            .map(|&(d, p)| PricePoint::new(NaiveDate::from_ymd_opt(2024, 1, d).unwrap(), p))
            .collect()
    }

    #[test]
    fn trade_log_has_header_and_one_row_per_trade() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trades.csv");
        let result = simulate(&Profile::Extended.strategy_config(10), 10_000.0, None, &prices()).unwrap();

        CsvTradeLogAdapter::new().write(&result, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), result.trades.len() + 1);
        assert!(lines[0].starts_with("date,trade_type,price,requested_quantity,quantity"));
        assert!(lines[1].starts_with("2024-01-01,periodic,100.0,10,10"));
        assert!(lines[2].starts_with("2024-01-02,tiered-add-on[1],90.0,20,20"));
    }

    #[test]
    fn sweep_table_has_one_row_per_variant() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sweep.csv");
        let grid = SweepGrid {
            aggressiveness: vec![1.0, 2.0],
            interval_days: vec![1],
        };
        let outcomes = run_sweep(
            &grid,
            &Profile::Extended.strategy_config(10),
            10_000.0,
            None,
            &prices(),
            false,
        )
        .unwrap();

        CsvTradeLogAdapter::new().write_sweep(&outcomes, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(content.lines().nth(1).unwrap().starts_with("aggr=1.00 interval=1d,1.0,1,"));
    }

    #[test]
    fn unwritable_path_is_a_report_error() {
        let result = simulate(&Profile::Extended.strategy_config(10), 10_000.0, None, &prices()).unwrap();
        let err = CsvTradeLogAdapter::new()
            .write(&result, Path::new("/nonexistent/dir/trades.csv"))
            .unwrap_err();
        assert!(matches!(err, DcaError::Report { .. }));
    }
}
