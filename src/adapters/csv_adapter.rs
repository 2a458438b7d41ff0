//! CSV price data adapter.

use crate::domain::error::DcaError;
use crate::domain::price::{PricePoint, sort_by_date};
use crate::ports::data_port::PriceSource;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

/// Price column names, in order of preference.
const PRICE_COLUMNS: [&str; 3] = ["price", "close", "adj_close"];

pub struct CsvPriceAdapter {
    path: PathBuf,
}

impl CsvPriceAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Parse CSV text with a `date` column and a `price`, `close` or
    /// `adj_close` column. Rows with an empty price cell are skipped.
    pub fn parse(content: &str) -> Result<Vec<PricePoint>, DcaError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let headers = rdr
            .headers()
            .map_err(|e| DcaError::Data {
                reason: format!("CSV header error: {}", e),
            })?
            .clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
        };
        let date_idx = column("date").ok_or_else(|| DcaError::Data {
            reason: "missing date column".into(),
        })?;
        let price_idx = PRICE_COLUMNS
            .iter()
            .find_map(|name| column(name))
            .ok_or_else(|| DcaError::Data {
                reason: "missing price column (expected price, close or adj_close)".into(),
            })?;

        let mut points = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| DcaError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str = record.get(date_idx).unwrap_or_default();
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                DcaError::Data {
                    reason: format!("row {}: invalid date '{}': {}", line + 1, date_str, e),
                }
            })?;

            let price_str = record.get(price_idx).unwrap_or_default();
            if price_str.is_empty() {
                tracing::debug!(%date, "skipping row without a price");
                continue;
            }
            let price: f64 = price_str.parse().map_err(|e| DcaError::Data {
                reason: format!("row {}: invalid price '{}': {}", line + 1, price_str, e),
            })?;

            points.push(PricePoint::new(date, price));
        }

        sort_by_date(&mut points);
        Ok(points)
    }
}

impl PriceSource for CsvPriceAdapter {
    fn load_prices(&self) -> Result<Vec<PricePoint>, DcaError> {
        let content = fs::read_to_string(&self.path).map_err(|e| DcaError::Data {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;
        let points = Self::parse(&content)?;
        tracing::debug!(path = %self.path.display(), rows = points.len(), "loaded CSV prices");
        Ok(points)
    }
}
