#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Clinic Scheduling Core
//!
//! Core scheduling and monitoring logic for a dental clinic platform: the
//! appointment availability reconciliation engine and the store health
//! monitor with alert dispatch. The surrounding booking and admin
//! applications consume this crate in-process.
//!
//! ## Architecture
//!
//! Two independent components sit on top of one abstract data-access seam:
//!
//! - [`availability`] - maps (date, configured time windows, booked
//!   appointments) to per-window remaining capacity; answers point
//!   availability checks; performs atomic bulk window creation; and offers
//!   a double-booking-safe reservation service.
//! - [`monitoring`] - periodically probes the backing store, keeps a
//!   bounded rolling latency window, evaluates thresholds, and routes
//!   alerts to chat and email transports by severity.
//!
//! Both talk to storage through [`store::ScheduleStore`], with in-memory
//! and Postgres implementations provided.
//!
//! ## Module Organization
//!
//! - [`models`] - Time windows, appointments, availability snapshots, alerts
//! - [`store`] - Data-access trait plus memory and Postgres stores
//! - [`availability`] - Availability engine and capacity reservation
//! - [`monitoring`] - Health monitor, probes, and alert dispatch
//! - [`config`] - Configuration with environment overrides
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use clinic_core::availability::AvailabilityEngine;
//! use clinic_core::store::MemoryScheduleStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryScheduleStore::new());
//! let engine = AvailabilityEngine::new(store);
//!
//! let date = chrono::NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
//! for snapshot in engine.list_available_windows(date).await? {
//!     println!(
//!         "{} - {}: {} of {} open",
//!         snapshot.window.start,
//!         snapshot.window.end,
//!         snapshot.remaining_capacity,
//!         snapshot.window.capacity
//!     );
//! }
//! # Ok(())
//! # }
//! ```

pub mod availability;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod monitoring;
pub mod store;

pub use availability::{AvailabilityEngine, CapacityReservation, SlotReservationService};
pub use config::{AlertingConfig, ClinicConfig, MonitoringConfig};
pub use error::{ClinicCoreError, Result};
pub use models::{
    Alert, AlertKind, AlertSeverity, Appointment, AppointmentStatus, AvailabilitySnapshot,
    BulkWindowSpec, HealthMetricSample, NewAppointment, NewTimeWindow, SlotCheck, TimeWindow,
    WindowScope, WindowTemplate,
};
pub use monitoring::{AlertDispatcher, HealthProbe, MonitorHandle, StoreHealthMonitor};
pub use store::{MemoryScheduleStore, PostgresScheduleStore, ScheduleStore};
