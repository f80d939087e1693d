//! Alert routing, suppression, and transports.
//!
//! Severity drives routing: warnings reach the chat webhook only, criticals
//! reach every configured transport. A per-kind cooldown suppresses repeats
//! so a persistent condition does not page on every cycle. Transport
//! failures are logged and swallowed; they never fail the caller.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{ClinicCoreError, Result};
use crate::models::{Alert, AlertKind, AlertSeverity};

/// One delivery channel for alerts.
#[async_trait]
pub trait AlertTransport: Send + Sync {
    fn name(&self) -> &str;
    /// Whether this transport participates in delivery at this severity.
    fn supports(&self, severity: AlertSeverity) -> bool;
    async fn deliver(&self, alert: &Alert) -> Result<()>;
}

/// HTTP POST of a structured message to a chat webhook.
pub struct ChatWebhookTransport {
    client: reqwest::Client,
    webhook_url: String,
}

impl ChatWebhookTransport {
    pub fn new(webhook_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
        }
    }
}

#[async_trait]
impl AlertTransport for ChatWebhookTransport {
    fn name(&self) -> &str {
        "chat_webhook"
    }

    fn supports(&self, _severity: AlertSeverity) -> bool {
        true
    }

    async fn deliver(&self, alert: &Alert) -> Result<()> {
        let payload = json!({
            "title": alert.title,
            "severity": alert.severity,
            "details": alert.details,
            "mean_latency_ms": alert.mean_latency_ms,
            "raised_at": alert.raised_at.to_rfc3339(),
        });
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClinicCoreError::TransportError {
                transport: self.name().to_string(),
                message: format!("webhook returned {}", response.status()),
            });
        }
        Ok(())
    }
}

/// HTTP POST of `{to, subject, html}` to a mail-sending endpoint.
/// Routed for critical alerts only.
pub struct EmailTransport {
    client: reqwest::Client,
    endpoint_url: String,
    to: String,
}

impl EmailTransport {
    pub fn new(endpoint_url: String, to: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint_url,
            to,
        }
    }

    fn render_html(alert: &Alert) -> String {
        let mut html = format!("<h2>{}</h2><ul>", alert.title);
        for detail in &alert.details {
            html.push_str(&format!("<li>{detail}</li>"));
        }
        html.push_str("</ul>");
        if let Some(mean) = alert.mean_latency_ms {
            html.push_str(&format!("<p>Rolling mean latency: {mean} ms</p>"));
        }
        html
    }
}

#[async_trait]
impl AlertTransport for EmailTransport {
    fn name(&self) -> &str {
        "email"
    }

    fn supports(&self, severity: AlertSeverity) -> bool {
        severity == AlertSeverity::Critical
    }

    async fn deliver(&self, alert: &Alert) -> Result<()> {
        let payload = json!({
            "to": self.to,
            "subject": format!("[clinic-monitor] {}", alert.title),
            "html": Self::render_html(alert),
        });
        let response = self
            .client
            .post(&self.endpoint_url)
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClinicCoreError::TransportError {
                transport: self.name().to_string(),
                message: format!("mail endpoint returned {}", response.status()),
            });
        }
        Ok(())
    }
}

/// Routes alerts to transports with per-kind cooldown suppression.
pub struct AlertDispatcher {
    transports: Vec<Arc<dyn AlertTransport>>,
    cooldown: Duration,
    last_sent: Mutex<HashMap<AlertKind, Instant>>,
}

impl AlertDispatcher {
    /// `cooldown` of zero re-sends on every cycle that detects a condition.
    pub fn new(cooldown: Duration) -> Self {
        Self {
            transports: Vec::new(),
            cooldown,
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn AlertTransport>) -> Self {
        self.transports.push(transport);
        self
    }

    pub fn transport_count(&self) -> usize {
        self.transports.len()
    }

    /// Deliver `alert` to every transport supporting its severity.
    ///
    /// Returns how many transports accepted delivery. Zero can mean the
    /// alert was suppressed by cooldown, no transport matched, or every
    /// delivery failed; failures are logged, never returned.
    pub async fn dispatch(&self, alert: &Alert) -> usize {
        if !self.cooldown.is_zero() {
            let mut last_sent = self.last_sent.lock();
            if let Some(sent_at) = last_sent.get(&alert.kind) {
                if sent_at.elapsed() < self.cooldown {
                    debug!(kind = ?alert.kind, "Alert suppressed by cooldown");
                    return 0;
                }
            }
            last_sent.insert(alert.kind.clone(), Instant::now());
        }

        let mut delivered = 0;
        for transport in &self.transports {
            if !transport.supports(alert.severity) {
                continue;
            }
            match transport.deliver(alert).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        transport = transport.name(),
                        error = %e,
                        "Alert delivery failed; continuing"
                    );
                }
            }
        }
        delivered
    }
}
