//! Monitoring samples and alert payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One probe measurement in the rolling window.
///
/// Owned exclusively by a single monitor instance; discarded on restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMetricSample {
    pub timestamp: DateTime<Utc>,
    /// Name of the test query that produced this sample.
    pub probe: String,
    pub duration_ms: u64,
    pub success: bool,
}

/// Severity drives transport routing: warnings go to chat only, criticals
/// go to every configured transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

/// Stable alert categories, used for cooldown tracking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Rolling mean latency exceeded the warning threshold.
    MeanLatencyHigh,
    /// A named test query exceeded the slow-query bound.
    SlowQuery(String),
    /// A probe failed outright.
    HealthCheckFailed(String),
    /// The monitoring cycle itself errored; fail-safe escalation.
    MonitorFailure,
}

/// Structured alert handed to transports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub title: String,
    /// One line per detected condition.
    pub details: Vec<String>,
    /// Rolling mean latency at evaluation time, when known.
    pub mean_latency_ms: Option<u64>,
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(kind: AlertKind, severity: AlertSeverity, title: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            title: title.into(),
            details: Vec::new(),
            mean_latency_ms: None,
            raised_at: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }

    pub fn with_mean_latency(mut self, mean_latency_ms: u64) -> Self {
        self.mean_latency_ms = Some(mean_latency_ms);
        self
    }
}
