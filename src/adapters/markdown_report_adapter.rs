//! Markdown report adapter implementing ReportPort.
//!
//! Sections: configuration, summary, trade breakdown, monthly activity and
//! the full trade log.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::Datelike;

use crate::domain::drawdown::NewHighReset;
use crate::domain::error::DcaError;
use crate::domain::ledger::TradeRecord;
use crate::domain::metrics::Summary;
use crate::domain::simulation::SimulationResult;
use crate::domain::strategy::StrategyConfig;
use crate::domain::sweep::SweepOutcome;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Default)]
pub struct MarkdownReportAdapter;

impl MarkdownReportAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn render(result: &SimulationResult) -> String {
        let mut out = String::new();
        out.push_str("# Tiered DCA Backtest Report\n\n");
        if let (Some(first), Some(last)) = (result.snapshots.first(), result.snapshots.last()) {
            out.push_str(&format!("Period: {} to {} ({} steps)\n\n", first.date, last.date, result.snapshots.len()));
        }
        out.push_str(&render_config(&result.config));
        out.push_str(&render_summary(&result.summary));
        out.push_str(&render_breakdown(&result.summary, &result.config));
        out.push_str(&render_monthly_activity(&result.trades));
        out.push_str(&render_trade_log(&result.trades));
        out
    }

    pub fn render_sweep(outcomes: &[SweepOutcome]) -> String {
        let mut out = String::from("# Parameter Sweep\n\n");
        out.push_str("| Variant | Invested | Shares | Avg Cost | Return | Equity Return | Add-ons |\n");
        out.push_str("|---|---:|---:|---:|---:|---:|---:|\n");
        for o in outcomes {
            let s = &o.summary;
            out.push_str(&format!(
                "| {} | {:.2} | {} | {:.2} | {:.2}% | {:.2}% | {} |\n",
                o.label,
                s.total_invested,
                s.final_position,
                s.average_cost,
                s.total_return_pct,
                s.equity_return_pct,
                s.add_on_count
            ));
        }
        out
    }
}

fn render_config(config: &StrategyConfig) -> String {
    let mut out = String::from("## Configuration\n\n");
    out.push_str("| Setting | Value |\n|---|---|\n");
    out.push_str(&format!("| Profile | {} |\n", config.profile));
    out.push_str(&format!("| Base quantity | {} |\n", config.base_quantity));
    out.push_str(&format!("| Interval | {} days |\n", config.interval_days));
    out.push_str(&format!("| Aggressiveness | {:.2} |\n", config.aggressiveness));
    out.push_str(&format!("| Extreme drawdown | {:.1}% |\n", config.extreme_drawdown_pct));
    out.push_str(&format!(
        "| Quantity bounds | {}..={} step {} |\n",
        config.bounds.min, config.bounds.max, config.bounds.unit
    ));
    let reset = match config.new_high_reset {
        NewHighReset::Immediate => "every new high".to_string(),
        NewHighReset::AfterRally { min_rally_pct } => format!("new high > {min_rally_pct:.1}% above previous"),
    };
    out.push_str(&format!("| Tier reset | {reset} |\n"));
    out.push('\n');

    out.push_str("| Tier | Threshold | Multiplier | Effective |\n|---:|---:|---:|---:|\n");
    for (i, (tier, effective)) in config
        .tiers
        .tiers()
        .iter()
        .zip(config.effective_multipliers())
        .enumerate()
    {
        out.push_str(&format!(
            "| {} | {:.1}% | {:.2}x | {:.2}x |\n",
            i, tier.threshold_pct, tier.multiplier, effective
        ));
    }
    out.push('\n');
    out
}

fn render_summary(s: &Summary) -> String {
    let mut out = String::from("## Summary\n\n| Metric | Value |\n|---|---:|\n");
    let rows: [(&str, String); 12] = [
        ("Initial balance", format!("{:.2}", s.initial_balance)),
        ("Total invested", format!("{:.2}", s.total_invested)),
        ("Shares held", s.final_position.to_string()),
        ("Average cost", format!("{:.2}", s.average_cost)),
        ("Final price", format!("{:.2}", s.final_price)),
        ("Position value", format!("{:.2}", s.final_value)),
        ("Return on invested", format!("{:.2}%", s.total_return_pct)),
        ("Cash remaining", format!("{:.2}", s.final_cash)),
        ("Final equity", format!("{:.2}", s.final_equity)),
        ("Equity return", format!("{:.2}%", s.equity_return_pct)),
        (
            "Max price drawdown",
            match s.max_drawdown_date {
                Some(date) => format!("{:.2}% ({date})", s.max_drawdown_observed),
                None => "0.00%".to_string(),
            },
        ),
        ("Max equity drawdown", format!("{:.2}%", s.max_equity_drawdown_pct)),
    ];
    for (label, value) in rows {
        out.push_str(&format!("| {label} | {value} |\n"));
    }
    out.push('\n');
    out
}

fn render_breakdown(s: &Summary, config: &StrategyConfig) -> String {
    let mut out = String::from("## Trade Breakdown\n\n");
    out.push_str(&format!("- Trades: {}\n", s.trade_count));
    out.push_str(&format!("- Periodic: {}\n", s.periodic_count));
    out.push_str(&format!("- Tiered add-ons: {}\n", s.add_on_count));
    for (i, count) in s.add_ons_per_tier.iter().enumerate() {
        let threshold = config.tiers.get(i).map(|t| t.threshold_pct).unwrap_or(0.0);
        out.push_str(&format!("  - tier {i} ({threshold:.1}%): {count}\n"));
    }
    out.push_str(&format!("- Partial fills: {}\n", s.partial_fill_count));
    out.push('\n');
    out
}

fn render_monthly_activity(trades: &[TradeRecord]) -> String {
    if trades.is_empty() {
        return String::new();
    }
    let mut months: BTreeMap<(i32, u32), (usize, u64, f64)> = BTreeMap::new();
    for t in trades {
        let entry = months.entry((t.date.year(), t.date.month())).or_default();
        entry.0 += 1;
        entry.1 += u64::from(t.quantity);
        entry.2 += t.amount;
    }

    let mut out = String::from("## Monthly Activity\n\n| Month | Trades | Shares | Invested |\n|---|---:|---:|---:|\n");
    for ((year, month), (count, shares, amount)) in months {
        out.push_str(&format!("| {year}-{month:02} | {count} | {shares} | {amount:.2} |\n"));
    }
    out.push('\n');
    out
}

fn render_trade_log(trades: &[TradeRecord]) -> String {
    let mut out = String::from("## Trades\n\n");
    if trades.is_empty() {
        out.push_str("_No trades executed._\n");
        return out;
    }
    out.push_str("| Date | Type | Price | Quantity | Amount | Cash | Position |\n");
    out.push_str("|---|---|---:|---:|---:|---:|---:|\n");
    for t in trades {
        let quantity = if t.is_partial_fill() {
            format!("{} of {}", t.quantity, t.requested_quantity)
        } else {
            t.quantity.to_string()
        };
        out.push_str(&format!(
            "| {} | {} | {:.2} | {} | {:.2} | {:.2} | {} |\n",
            t.date, t.trade_type, t.price, quantity, t.amount, t.resulting_balance, t.resulting_position
        ));
    }
    out
}

impl ReportPort for MarkdownReportAdapter {
    fn write(&self, result: &SimulationResult, output_path: &Path) -> Result<(), DcaError> {
        fs::write(output_path, Self::render(result))?;
        Ok(())
    }

    fn write_sweep(&self, outcomes: &[SweepOutcome], output_path: &Path) -> Result<(), DcaError> {
        fs::write(output_path, Self::render_sweep(outcomes))?;
        Ok(())
    }
}
