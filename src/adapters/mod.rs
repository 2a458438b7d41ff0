//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod csv_report_adapter;
pub mod file_config_adapter;
pub mod json_adapter;
pub mod markdown_report_adapter;

use std::path::Path;

use crate::domain::error::DcaError;
use crate::domain::price::PricePoint;
use crate::ports::data_port::PriceSource;
use crate::ports::report_port::ReportPort;

use csv_adapter::CsvPriceAdapter;
use csv_report_adapter::CsvTradeLogAdapter;
use json_adapter::{JsonPriceAdapter, JsonReportAdapter};
use markdown_report_adapter::MarkdownReportAdapter;

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Price source for `path`, chosen by extension (`.json`, otherwise CSV).
pub fn price_source_for(path: &Path) -> Box<dyn PriceSource> {
    match extension(path).as_str() {
        "json" => Box::new(JsonPriceAdapter::new(path.to_path_buf())),
        _ => Box::new(CsvPriceAdapter::new(path.to_path_buf())),
    }
}

/// Report writer for `path`, chosen by extension (`.csv`, `.json`, `.md`).
pub fn report_writer_for(path: &Path) -> Result<Box<dyn ReportPort>, DcaError> {
    match extension(path).as_str() {
        "csv" => Ok(Box::new(CsvTradeLogAdapter::new())),
        "json" => Ok(Box::new(JsonReportAdapter::new())),
        "md" | "markdown" => Ok(Box::new(MarkdownReportAdapter::new())),
        other => Err(DcaError::Report {
            reason: format!(
                "unsupported report format '{}' for {} (expected .md, .csv or .json)",
                other,
                path.display()
            ),
        }),
    }
}

pub fn load_price_file(path: &Path) -> Result<Vec<PricePoint>, DcaError> {
    price_source_for(path).load_prices()
}
