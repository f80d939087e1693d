//! Atomic check-and-book reservations.
//!
//! The engine's availability check and the appointment insert are two store
//! round-trips; without a serialization point, two concurrent bookings for
//! the last slot can both pass the check. [`SlotReservationService`] closes
//! that race with a per-date async lock, giving the atomic
//! check-and-increment contract a backing store can't be assumed to provide.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use parking_lot::Mutex;
use tracing::{debug, instrument};

use crate::error::{ClinicCoreError, Result};
use crate::models::{Appointment, NewAppointment};
use crate::store::ScheduleStore;

use super::engine::AvailabilityEngine;

/// Contract for double-booking-safe slot reservation.
///
/// `reserve` must behave as an atomic check-and-increment: once a window's
/// capacity is exhausted, further reservations for times inside it fail,
/// even under concurrent callers.
#[async_trait]
pub trait CapacityReservation: Send + Sync {
    async fn reserve(&self, date: NaiveDate, time: NaiveTime) -> Result<Appointment>;
}

/// Per-date-serialized reservation over an [`AvailabilityEngine`].
pub struct SlotReservationService<S> {
    engine: AvailabilityEngine<S>,
    date_locks: Mutex<HashMap<NaiveDate, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S: ScheduleStore> SlotReservationService<S> {
    pub fn new(engine: AvailabilityEngine<S>) -> Self {
        Self {
            engine,
            date_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &AvailabilityEngine<S> {
        &self.engine
    }

    fn lock_for(&self, date: NaiveDate) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.date_locks.lock();
        Arc::clone(locks.entry(date).or_default())
    }

    /// Drop the map entry when no other reservation holds or awaits it.
    ///
    /// Clones are only handed out under the map mutex, so while it is held
    /// the strong count cannot grow: a count of two means the map entry and
    /// our own handle are the last references.
    fn release_lock(&self, date: NaiveDate, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.date_locks.lock();
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&date);
        }
    }

    async fn reserve_locked(&self, date: NaiveDate, time: NaiveTime) -> Result<Appointment> {
        let resolution = self
            .engine
            .resolve_slot(date, time)
            .await?
            .ok_or_else(|| ClinicCoreError::SlotUnavailable {
                date,
                time,
                reason: "no window configured".to_string(),
            })?;

        // Window-level accounting: capacity bounds concurrent appointments
        // across the whole range, not just at this exact time.
        if resolution.booked_in_window >= resolution.window.capacity {
            return Err(ClinicCoreError::SlotUnavailable {
                date,
                time,
                reason: format!(
                    "window capacity exhausted ({}/{})",
                    resolution.booked_in_window, resolution.window.capacity
                ),
            });
        }

        let appointment = self
            .engine
            .store()
            .insert_appointment(NewAppointment::pending(
                date,
                time,
                Some(resolution.window.id),
            ))
            .await?;
        debug!(appointment_id = %appointment.id, %date, %time, "Reserved slot");
        Ok(appointment)
    }
}

#[async_trait]
impl<S: ScheduleStore + 'static> CapacityReservation for SlotReservationService<S> {
    #[instrument(skip(self))]
    async fn reserve(&self, date: NaiveDate, time: NaiveTime) -> Result<Appointment> {
        let date_lock = self.lock_for(date);
        let guard = date_lock.lock().await;
        let result = self.reserve_locked(date, time).await;
        drop(guard);
        self.release_lock(date, date_lock);
        result
    }
}
