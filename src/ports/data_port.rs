//! Price data port trait.

use crate::domain::error::DcaError;
use crate::domain::price::PricePoint;

/// Source of a daily price series.
pub trait PriceSource {
    /// Price points sorted by date.
    fn load_prices(&self) -> Result<Vec<PricePoint>, DcaError>;
}
