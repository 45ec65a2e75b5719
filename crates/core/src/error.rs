use chrono::NaiveDate;
use thiserror::Error;

pub type EngagementResult<T> = Result<T, EngagementError>;

#[derive(Error, Debug)]
pub enum EngagementError {
    /// A granularity selector outside the supported set. Never defaulted.
    #[error("Unknown granularity mode: {0}")]
    UnknownGranularityMode(String),

    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for EngagementError {
    fn from(e: config::ConfigError) -> Self {
        EngagementError::Config(e.to_string())
    }
}
