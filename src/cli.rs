//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::{load_price_file, report_writer_for};
use crate::domain::config_validation::{
    BacktestSettings, build_backtest_settings, build_strategy_config, parse_number_list,
};
use crate::domain::error::DcaError;
use crate::domain::metrics::Summary;
use crate::domain::price::PricePoint;
use crate::domain::simulation::simulate;
use crate::domain::strategy::StrategyConfig;
use crate::domain::sweep::{SweepGrid, run_sweep};
use crate::ports::config_port::ConfigPort;

#[derive(Parser, Debug)]
#[command(name = "tierdca", about = "Tiered dollar-cost-averaging backtester")]
pub struct Cli {
    /// Log per-trade detail
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Price file (.csv or .json), overrides [backtest] prices
        #[arg(short, long)]
        prices: Option<PathBuf>,
        /// Markdown report
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// CSV trade log
        #[arg(long)]
        trades: Option<PathBuf>,
        /// Full result as JSON
        #[arg(long)]
        json: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Run a grid of aggressiveness and interval variants
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        prices: Option<PathBuf>,
        /// Comma-separated aggressiveness values, e.g. 1.0,1.5,2.0
        #[arg(long)]
        aggressiveness: Option<String>,
        /// Comma-separated interval lengths in days, e.g. 1,7
        #[arg(long)]
        intervals: Option<String>,
        /// Sweep table (.md, .csv or .json)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Run variants one at a time
        #[arg(long)]
        sequential: bool,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    crate::logging::init(cli.verbose);
    match cli.command {
        Command::Backtest {
            config,
            prices,
            output,
            trades,
            json,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config, prices.as_deref())
            } else {
                let outputs = ReportPaths {
                    markdown: output,
                    trades,
                    json,
                };
                run_backtest(&config, prices.as_deref(), &outputs)
            }
        }
        Command::Validate { config } => run_validate(&config),
        Command::Sweep {
            config,
            prices,
            aggressiveness,
            intervals,
            output,
            sequential,
        } => run_sweep_command(
            &config,
            prices.as_deref(),
            aggressiveness.as_deref(),
            intervals.as_deref(),
            output.as_deref(),
            !sequential,
        ),
    }
}

/// Report files requested for a backtest.
#[derive(Debug, Default)]
pub struct ReportPaths {
    pub markdown: Option<PathBuf>,
    pub trades: Option<PathBuf>,
    pub json: Option<PathBuf>,
}

impl ReportPaths {
    fn iter(&self) -> impl Iterator<Item = &Path> {
        [&self.markdown, &self.trades, &self.json]
            .into_iter()
            .filter_map(|p| p.as_deref())
    }
}

fn fail(err: &DcaError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

/// Everything a run needs, resolved from configuration.
#[derive(Debug)]
pub struct RunInputs {
    pub settings: BacktestSettings,
    pub strategy: StrategyConfig,
    pub prices_path: PathBuf,
}

/// Load and validate configuration, then resolve the price file. A relative
/// `prices` path in the config is taken relative to the config file.
pub fn resolve_inputs(config_path: &Path, prices_override: Option<&Path>) -> Result<RunInputs, DcaError> {
    let adapter = FileConfigAdapter::from_file(config_path)?;
    let settings = build_backtest_settings(&adapter)?;
    let strategy = build_strategy_config(&adapter)?;

    let prices_path = match (prices_override, &settings.prices) {
        (Some(p), _) => p.to_path_buf(),
        (None, Some(p)) if p.is_relative() => config_path
            .parent()
            .map(|dir| dir.join(p))
            .unwrap_or_else(|| p.clone()),
        (None, Some(p)) => p.clone(),
        (None, None) => {
            return Err(DcaError::ConfigMissing {
                section: "backtest".into(),
                key: "prices".into(),
            });
        }
    };

    Ok(RunInputs {
        settings,
        strategy,
        prices_path,
    })
}

fn load_prices(path: &Path) -> Result<Vec<PricePoint>, DcaError> {
    eprintln!("Loading prices from {}", path.display());
    let prices = load_price_file(path)?;
    if let (Some(first), Some(last)) = (prices.first(), prices.last()) {
        eprintln!("  {} price points, {} to {}", prices.len(), first.date, last.date);
    }
    Ok(prices)
}

fn run_backtest(config_path: &Path, prices_override: Option<&Path>, outputs: &ReportPaths) -> ExitCode {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let inputs = match resolve_inputs(config_path, prices_override) {
        Ok(i) => i,
        Err(e) => return fail(&e),
    };

    // Stage 2: Resolve report writers before doing any work
    let mut writers = Vec::new();
    for path in outputs.iter() {
        match report_writer_for(path) {
            Ok(w) => writers.push((w, path)),
            Err(e) => return fail(&e),
        }
    }

    // Stage 3: Load prices
    let prices = match load_prices(&inputs.prices_path) {
        Ok(p) => p,
        Err(e) => return fail(&e),
    };

    // Stage 4: Simulate
    eprintln!(
        "Running simulation: base {} every {} days, {} tiers, aggressiveness {:.2}",
        inputs.strategy.base_quantity,
        inputs.strategy.interval_days,
        inputs.strategy.tiers.len(),
        inputs.strategy.aggressiveness,
    );
    let result = match simulate(
        &inputs.strategy,
        inputs.settings.initial_balance,
        inputs.settings.baseline_high,
        &prices,
    ) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    // Stage 5: Console summary
    print_summary(&result.summary);

    // Stage 6: Reports
    for (writer, path) in writers {
        if let Err(e) = writer.write(&result, path) {
            return fail(&e);
        }
        eprintln!("Report written to: {}", path.display());
    }

    ExitCode::SUCCESS
}

pub fn print_summary(s: &Summary) {
    eprintln!("\n=== Results ===");
    eprintln!("Total Invested:   {:.2}", s.total_invested);
    eprintln!("Shares Held:      {}", s.final_position);
    eprintln!("Average Cost:     {:.2}", s.average_cost);
    eprintln!("Final Price:      {:.2}", s.final_price);
    eprintln!("Position Value:   {:.2}", s.final_value);
    eprintln!("Total Return:     {:.2}%", s.total_return_pct);
    eprintln!("Cash Remaining:   {:.2}", s.final_cash);
    eprintln!("Equity Return:    {:.2}%", s.equity_return_pct);
    match s.max_drawdown_date {
        Some(date) => eprintln!("Max Drawdown:     -{:.1}% on {}", s.max_drawdown_observed, date),
        None => eprintln!("Max Drawdown:     0.0%"),
    }
    eprintln!(
        "Trades:           {} ({} periodic, {} add-ons, {} partial)",
        s.trade_count, s.periodic_count, s.add_on_count, s.partial_fill_count
    );
    let per_tier: Vec<String> = s
        .add_ons_per_tier
        .iter()
        .enumerate()
        .map(|(i, n)| format!("t{i}={n}"))
        .collect();
    eprintln!("Add-ons by Tier:  {}", per_tier.join(" "));
}

fn print_strategy(strategy: &StrategyConfig) {
    eprintln!("\nStrategy (resolved):");
    eprintln!("  profile:              {}", strategy.profile);
    eprintln!("  base_quantity:        {}", strategy.base_quantity);
    eprintln!("  interval_days:        {}", strategy.interval_days);
    eprintln!("  aggressiveness:       {:.2}", strategy.aggressiveness);
    eprintln!("  extreme_drawdown_pct: {:.1}", strategy.extreme_drawdown_pct);
    eprintln!(
        "  quantity:             {}..={} step {}",
        strategy.bounds.min, strategy.bounds.max, strategy.bounds.unit
    );
    eprintln!("  reset:                {:?}", strategy.new_high_reset);
    for ((i, tier), effective) in strategy
        .tiers
        .tiers()
        .iter()
        .enumerate()
        .zip(strategy.effective_multipliers())
    {
        eprintln!(
            "  tier {}: {:>5.1}% -> {:.2}x ({:.2}x effective)",
            i, tier.threshold_pct, tier.multiplier, effective
        );
    }
}

pub fn run_dry_run(config_path: &Path, prices_override: Option<&Path>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let inputs = match resolve_inputs(config_path, prices_override) {
        Ok(i) => i,
        Err(e) => return fail(&e),
    };
    eprintln!("Config validated successfully");

    print_strategy(&inputs.strategy);
    eprintln!("\nBacktest:");
    eprintln!("  initial_balance: {:.2}", inputs.settings.initial_balance);
    eprintln!("  prices:          {}", inputs.prices_path.display());
    if let Some(high) = inputs.settings.baseline_high {
        eprintln!("  baseline_high:   {:.2}", high);
    }

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let strategy = match build_strategy_config(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    print_strategy(&strategy);

    // [backtest] is optional here; check it only when a balance is given
    if adapter.get_string("backtest", "initial_balance").is_some() {
        if let Err(e) = build_backtest_settings(&adapter) {
            return fail(&e);
        }
    }

    eprintln!("\nConfiguration is valid");
    ExitCode::SUCCESS
}

fn parse_interval_list(value: &str) -> Result<Vec<u32>, DcaError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u32>().map_err(|_| DcaError::ConfigInvalid {
                section: "sweep".into(),
                key: "intervals".into(),
                reason: format!("'{s}' is not a whole number of days"),
            })
        })
        .collect()
}

/// Build the sweep grid from CLI lists, falling back to the base config's
/// single value for an omitted axis.
pub fn build_sweep_grid(
    base: &StrategyConfig,
    aggressiveness: Option<&str>,
    intervals: Option<&str>,
) -> Result<SweepGrid, DcaError> {
    let mut grid = SweepGrid::from_config(base);
    if let Some(list) = aggressiveness {
        grid.aggressiveness = parse_number_list(list).map_err(|reason| DcaError::ConfigInvalid {
            section: "sweep".into(),
            key: "aggressiveness".into(),
            reason,
        })?;
    }
    if let Some(list) = intervals {
        grid.interval_days = parse_interval_list(list)?;
    }
    Ok(grid)
}

fn run_sweep_command(
    config_path: &Path,
    prices_override: Option<&Path>,
    aggressiveness: Option<&str>,
    intervals: Option<&str>,
    output: Option<&Path>,
    parallel: bool,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let inputs = match resolve_inputs(config_path, prices_override) {
        Ok(i) => i,
        Err(e) => return fail(&e),
    };
    let grid = match build_sweep_grid(&inputs.strategy, aggressiveness, intervals) {
        Ok(g) => g,
        Err(e) => return fail(&e),
    };
    let writer = match output.map(report_writer_for).transpose() {
        Ok(w) => w,
        Err(e) => return fail(&e),
    };
    let prices = match load_prices(&inputs.prices_path) {
        Ok(p) => p,
        Err(e) => return fail(&e),
    };

    eprintln!("Running sweep: {} variants", grid.size());
    let outcomes = match run_sweep(
        &grid,
        &inputs.strategy,
        inputs.settings.initial_balance,
        inputs.settings.baseline_high,
        &prices,
        parallel,
    ) {
        Ok(o) => o,
        Err(e) => return fail(&e),
    };

    eprintln!("\n=== Sweep Results ===");
    for o in &outcomes {
        let s = &o.summary;
        eprintln!(
            "  {:<24} invested {:>12.2}  shares {:>6}  avg {:>9.2}  return {:>7.2}%  add-ons {}",
            o.label, s.total_invested, s.final_position, s.average_cost, s.total_return_pct, s.add_on_count
        );
    }

    if let (Some(writer), Some(path)) = (writer, output) {
        if let Err(e) = writer.write_sweep(&outcomes, path) {
            return fail(&e);
        }
        eprintln!("\nSweep table written to: {}", path.display());
    }

    ExitCode::SUCCESS
}
