//! Price series input.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, price: f64) -> Self {
        PricePoint { date, price }
    }

    /// Finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }
}

/// Sort in place by date. Loaders call this so the simulation sees ascending order.
pub fn sort_by_date(points: &mut [PricePoint]) {
    points.sort_by_key(|p| p.date);
}
