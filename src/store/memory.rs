//! In-process store backed by `parking_lot` locks.
//!
//! Serves two purposes: deterministic tests, and a real backing store for
//! deployments that keep schedule state in process memory. Both bulk
//! replacement and the per-call mutations happen under a single write lock,
//! which makes the replace operation trivially atomic.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc, Weekday};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{ClinicCoreError, Result};
use crate::models::{
    Appointment, AppointmentStatus, NewAppointment, NewTimeWindow, TimeWindow, WindowScope,
};

use super::ScheduleStore;

#[derive(Debug, Default)]
struct MemoryState {
    windows: Vec<TimeWindow>,
    appointments: Vec<Appointment>,
}

/// In-memory [`ScheduleStore`] implementation.
#[derive(Debug, Default)]
pub struct MemoryScheduleStore {
    state: RwLock<MemoryState>,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a window directly, bypassing validation. Test setup helper.
    pub fn seed_window(&self, window: TimeWindow) {
        self.state.write().windows.push(window);
    }

    /// Seed an appointment directly. Test setup helper.
    pub fn seed_appointment(&self, appointment: Appointment) {
        self.state.write().appointments.push(appointment);
    }
}

fn materialize(window: NewTimeWindow) -> TimeWindow {
    TimeWindow {
        id: Uuid::new_v4(),
        scope: window.scope,
        start: window.start,
        end: window.end,
        capacity: window.capacity,
        active: window.active,
        effective_from: window.effective_from,
        effective_until: window.effective_until,
    }
}

#[async_trait]
impl ScheduleStore for MemoryScheduleStore {
    async fn fetch_active_windows(&self) -> Result<Vec<TimeWindow>> {
        Ok(self
            .state
            .read()
            .windows
            .iter()
            .filter(|w| w.active)
            .cloned()
            .collect())
    }

    async fn fetch_windows(&self) -> Result<Vec<TimeWindow>> {
        Ok(self.state.read().windows.clone())
    }

    async fn fetch_appointments_on(&self, date: NaiveDate) -> Result<Vec<Appointment>> {
        Ok(self
            .state
            .read()
            .appointments
            .iter()
            .filter(|a| a.date == date)
            .cloned()
            .collect())
    }

    async fn insert_window(&self, window: NewTimeWindow) -> Result<TimeWindow> {
        window.validate()?;
        let created = materialize(window);
        self.state.write().windows.push(created.clone());
        Ok(created)
    }

    async fn deactivate_window(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write();
        match state.windows.iter_mut().find(|w| w.id == id) {
            Some(window) => {
                window.active = false;
                Ok(())
            }
            None => Err(ClinicCoreError::StoreError(format!(
                "time window {id} not found"
            ))),
        }
    }

    async fn delete_window(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write();
        let before = state.windows.len();
        state.windows.retain(|w| w.id != id);
        if state.windows.len() == before {
            return Err(ClinicCoreError::StoreError(format!(
                "time window {id} not found"
            )));
        }
        Ok(())
    }

    async fn replace_recurring_windows(
        &self,
        weekdays: &[Weekday],
        windows: Vec<NewTimeWindow>,
        delete_existing: bool,
    ) -> Result<Vec<TimeWindow>> {
        for window in &windows {
            window.validate()?;
        }

        // Single write lock spans deletion and creation, so no reader ever
        // observes a half-replaced weekly schedule.
        let mut state = self.state.write();
        if delete_existing {
            state.windows.retain(|w| {
                !(w.active
                    && matches!(w.scope, WindowScope::Recurring(day) if weekdays.contains(&day)))
            });
        }
        let created: Vec<TimeWindow> = windows.into_iter().map(materialize).collect();
        state.windows.extend(created.iter().cloned());
        Ok(created)
    }

    async fn insert_appointment(&self, appointment: NewAppointment) -> Result<Appointment> {
        let created = Appointment {
            id: Uuid::new_v4(),
            date: appointment.date,
            start_time: appointment.start_time,
            window_id: appointment.window_id,
            status: appointment.status,
            created_at: Utc::now(),
        };
        self.state.write().appointments.push(created.clone());
        Ok(created)
    }

    async fn update_appointment_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment> {
        let mut state = self.state.write();
        match state.appointments.iter_mut().find(|a| a.id == id) {
            Some(appointment) => {
                appointment.status = status;
                Ok(appointment.clone())
            }
            None => Err(ClinicCoreError::StoreError(format!(
                "appointment {id} not found"
            ))),
        }
    }

    async fn table_counts(&self) -> Result<Vec<(String, i64)>> {
        let state = self.state.read();
        Ok(vec![
            ("time_windows".to_string(), state.windows.len() as i64),
            (
                "appointments".to_string(),
                state.appointments.len() as i64,
            ),
        ])
    }
}
