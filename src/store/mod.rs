//! # Data Access Layer
//!
//! The availability engine and the health monitor both talk to the backing
//! store through [`ScheduleStore`] so the hosted platform can be swapped
//! for an in-process store (or a test double) without behavior change.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{NaiveDate, Weekday};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Appointment, AppointmentStatus, NewAppointment, NewTimeWindow, TimeWindow};

pub use memory::MemoryScheduleStore;
pub use postgres::PostgresScheduleStore;

/// Abstract data-access collaborator for schedule data.
///
/// Errors from implementations propagate unchanged to callers; no retry or
/// partial-result recovery happens at this seam.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// All windows currently offered for booking.
    async fn fetch_active_windows(&self) -> Result<Vec<TimeWindow>>;

    /// Every configured window, inactive ones included (admin listings).
    async fn fetch_windows(&self) -> Result<Vec<TimeWindow>>;

    /// All appointments booked on `date`, regardless of status.
    async fn fetch_appointments_on(&self, date: NaiveDate) -> Result<Vec<Appointment>>;

    async fn insert_window(&self, window: NewTimeWindow) -> Result<TimeWindow>;

    /// Supersede a window without losing its history.
    async fn deactivate_window(&self, id: Uuid) -> Result<()>;

    /// Explicit administrative removal.
    async fn delete_window(&self, id: Uuid) -> Result<()>;

    /// Atomic bulk replacement: when `delete_existing` is set, active
    /// recurring windows on `weekdays` are removed and `windows` inserted
    /// as one all-or-nothing operation. Partial application must be
    /// impossible; a failure leaves the schedule exactly as it was.
    async fn replace_recurring_windows(
        &self,
        weekdays: &[Weekday],
        windows: Vec<NewTimeWindow>,
        delete_existing: bool,
    ) -> Result<Vec<TimeWindow>>;

    async fn insert_appointment(&self, appointment: NewAppointment) -> Result<Appointment>;

    async fn update_appointment_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment>;

    /// Row counts per table, for the health monitor's row-count checks.
    async fn table_counts(&self) -> Result<Vec<(String, i64)>>;
}
