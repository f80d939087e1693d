//! # Health Monitoring & Alert Dispatch
//!
//! Periodic probing of the backing store, rolling latency aggregation,
//! threshold evaluation, and severity-routed alert delivery.

pub mod alerts;
pub mod monitor;
pub mod probe;

pub use alerts::{AlertDispatcher, AlertTransport, ChatWebhookTransport, EmailTransport};
pub use monitor::{CyclePhase, CycleReport, MonitorHandle, StoreHealthMonitor};
pub use probe::{
    standard_probes, AppointmentSelectProbe, HealthProbe, TableCountProbe, WindowSelectProbe,
};
