//! Configuration for the scheduling core and the health monitor.
//!
//! Defaults mirror production settings; every field can be overridden from
//! the environment via [`ClinicConfig::from_env`].

use crate::error::{ClinicCoreError, Result};

/// Top-level configuration shared by library consumers.
#[derive(Debug, Clone)]
pub struct ClinicConfig {
    pub database_url: String,
    pub monitoring: MonitoringConfig,
    pub alerting: AlertingConfig,
}

/// Health monitor thresholds and scheduling.
#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    /// Seconds between probe cycles.
    pub interval_seconds: u64,
    /// Rolling mean latency above this raises a performance warning (ms).
    pub mean_latency_warn_ms: u64,
    /// Any single probe above this raises a slow-query warning (ms).
    pub slow_query_ms: u64,
    /// Number of samples retained in the rolling window.
    pub sample_window_size: usize,
}

/// Alert routing and suppression.
#[derive(Debug, Clone)]
pub struct AlertingConfig {
    /// Chat webhook endpoint; `None` disables the chat transport.
    pub chat_webhook_url: Option<String>,
    /// Mail-sending HTTP endpoint; `None` disables the email transport.
    pub email_endpoint_url: Option<String>,
    /// Recipient for critical alert emails.
    pub email_to: String,
    /// Seconds to suppress a repeat of the same alert kind. Zero re-sends
    /// on every cycle that detects the condition.
    pub cooldown_seconds: u64,
}

impl Default for ClinicConfig {
    fn default() -> Self {
        Self {
            database_url: "postgresql://localhost/clinic_development".to_string(),
            monitoring: MonitoringConfig::default(),
            alerting: AlertingConfig::default(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 300,
            mean_latency_warn_ms: 500,
            slow_query_ms: 1000,
            sample_window_size: 100,
        }
    }
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            chat_webhook_url: None,
            email_endpoint_url: None,
            email_to: "ops@clinic.invalid".to_string(),
            cooldown_seconds: 900,
        }
    }
}

impl ClinicConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(db_url) = std::env::var("DATABASE_URL") {
            config.database_url = db_url;
        }

        if let Ok(interval) = std::env::var("CLINIC_MONITOR_INTERVAL_SECONDS") {
            config.monitoring.interval_seconds = parse_env("CLINIC_MONITOR_INTERVAL_SECONDS", &interval)?;
        }
        if let Ok(warn_ms) = std::env::var("CLINIC_MONITOR_MEAN_LATENCY_WARN_MS") {
            config.monitoring.mean_latency_warn_ms =
                parse_env("CLINIC_MONITOR_MEAN_LATENCY_WARN_MS", &warn_ms)?;
        }
        if let Ok(slow_ms) = std::env::var("CLINIC_MONITOR_SLOW_QUERY_MS") {
            config.monitoring.slow_query_ms = parse_env("CLINIC_MONITOR_SLOW_QUERY_MS", &slow_ms)?;
        }
        if let Ok(window) = std::env::var("CLINIC_MONITOR_SAMPLE_WINDOW") {
            config.monitoring.sample_window_size = parse_env("CLINIC_MONITOR_SAMPLE_WINDOW", &window)?;
        }

        if let Ok(url) = std::env::var("CLINIC_ALERT_CHAT_WEBHOOK_URL") {
            config.alerting.chat_webhook_url = Some(url);
        }
        if let Ok(url) = std::env::var("CLINIC_ALERT_EMAIL_ENDPOINT_URL") {
            config.alerting.email_endpoint_url = Some(url);
        }
        if let Ok(to) = std::env::var("CLINIC_ALERT_EMAIL_TO") {
            config.alerting.email_to = to;
        }
        if let Ok(cooldown) = std::env::var("CLINIC_ALERT_COOLDOWN_SECONDS") {
            config.alerting.cooldown_seconds = parse_env("CLINIC_ALERT_COOLDOWN_SECONDS", &cooldown)?;
        }

        Ok(config)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| ClinicCoreError::ConfigurationError(format!("Invalid {name}: {e}")))
}
