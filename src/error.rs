//! Error types for the clinic scheduling core.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClinicCoreError {
    /// A request field failed validation before any store access happened.
    #[error("Validation error on `{field}`: {message}")]
    ValidationError { field: String, message: String },

    /// The backing store (or its driver) failed. Propagated unchanged to the
    /// caller; the engine performs no retry of its own.
    #[error("Store error: {0}")]
    StoreError(String),

    /// A reservation could not be granted because no window covers the
    /// requested time or its capacity is exhausted.
    #[error("Slot unavailable at {date} {time}: {reason}")]
    SlotUnavailable {
        date: chrono::NaiveDate,
        time: chrono::NaiveTime,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Failure inside a monitoring cycle that is not a probe failure
    /// (probe failures are recorded as sample data instead).
    #[error("Monitoring error: {0}")]
    MonitoringError(String),

    /// An alert transport could not deliver. Callers log and continue;
    /// delivery failures never stop the monitoring loop.
    #[error("Alert transport error: {transport}: {message}")]
    TransportError { transport: String, message: String },
}

impl ClinicCoreError {
    /// Shorthand for the common single-field validation failure.
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        ClinicCoreError::ValidationError {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for ClinicCoreError {
    fn from(err: sqlx::Error) -> Self {
        ClinicCoreError::StoreError(err.to_string())
    }
}

impl From<serde_json::Error> for ClinicCoreError {
    fn from(err: serde_json::Error) -> Self {
        ClinicCoreError::ValidationError {
            field: "json".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClinicCoreError {
    fn from(err: reqwest::Error) -> Self {
        ClinicCoreError::TransportError {
            transport: "http".to_string(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClinicCoreError>;
