#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use tierdca::domain::error::DcaError;
use tierdca::domain::ledger::QuantityBounds;
pub use tierdca::domain::price::PricePoint;
use tierdca::domain::strategy::{Profile, StrategyConfig};
use tierdca::domain::tier::TierConfig;
use tierdca::ports::data_port::PriceSource;

pub struct MockPriceSource {
    pub prices: Vec<PricePoint>,
    pub error: Option<String>,
}

impl MockPriceSource {
    pub fn new(prices: Vec<PricePoint>) -> Self {
        Self {
            prices,
            error: None,
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            prices: Vec::new(),
            error: Some(reason.to_string()),
        }
    }
}

impl PriceSource for MockPriceSource {
    fn load_prices(&self) -> Result<Vec<PricePoint>, DcaError> {
        match &self.error {
            Some(reason) => Err(DcaError::Data {
                reason: reason.clone(),
            }),
            None => Ok(self.prices.clone()),
        }
    }
}

pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

pub fn day(offset: i64) -> NaiveDate {
    start_date() + Duration::days(offset)
}

/// One price per consecutive calendar day starting at `start_date()`.
pub fn daily_series(prices: &[f64]) -> Vec<PricePoint> {
    prices
        .iter()
        .enumerate()
        .map(|(i, &p)| PricePoint::new(day(i as i64), p))
        .collect()
}

/// Days 0..=9 at 500, day 10 at 390, days 11..=14 at 390.
pub fn dip_series() -> Vec<PricePoint> {
    let mut prices = vec![500.0; 10];
    prices.extend(std::iter::repeat_n(390.0, 5));
    daily_series(&prices)
}

/// Base 20, tiers 5/10/20% at 1.5/2/3x, unrestricted quantities.
pub fn three_tier_config(interval_days: u32) -> StrategyConfig {
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

pub fn prices_csv(points: &[PricePoint]) -> String {
    let mut out = String::from("date,close\n");
    for p in points {
        out.push_str(&format!("{},{}\n", p.date, p.price));
    }
    out
}
