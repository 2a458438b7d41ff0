//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for tierdca.
///
/// Insufficient funds is not an error: an unaffordable trade shows up only
/// as a missing trade record.
#[derive(Debug, thiserror::Error)]
pub enum DcaError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid tier table: {reason}")]
    TierConfig { reason: String },

    #[error("invalid price {price} (running high {running_high})")]
    InvalidPrice { price: f64, running_high: f64 },

    #[error("price series out of order: {date} follows {previous}")]
    OutOfOrder { previous: NaiveDate, date: NaiveDate },

    #[error("price series is empty")]
    EmptySeries,

    #[error("price data error: {reason}")]
    Data { reason: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DcaError {
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DcaError::ConfigParse { .. }
                | DcaError::ConfigMissing { .. }
                | DcaError::ConfigInvalid { .. }
                | DcaError::TierConfig { .. }
        )
    }
}

impl From<&DcaError> for std::process::ExitCode {
    fn from(err: &DcaError) -> Self {
        let code: u8 = match err {
            DcaError::Io(_) | DcaError::Report { .. } => 1,
            DcaError::ConfigParse { .. }
            | DcaError::ConfigMissing { .. }
            | DcaError::ConfigInvalid { .. }
            | DcaError::TierConfig { .. } => 2,
            DcaError::Data { .. } => 3,
            DcaError::InvalidPrice { .. } | DcaError::OutOfOrder { .. } | DcaError::EmptySeries => 4,
        };
        std::process::ExitCode::from(code)
    }
}
