//! Slot availability reconciliation.
//!
//! Pure read-and-compute over the store: no side effects, no caching, no
//! date-validity policy (callers restrict to future dates where that
//! matters). Snapshot order is deterministic for identical inputs.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use tracing::{debug, instrument, warn};

use crate::error::Result;
use crate::models::{
    Appointment, AvailabilitySnapshot, BulkWindowSpec, NewTimeWindow, SlotCheck, TimeWindow,
    WindowScope,
};
use crate::store::ScheduleStore;

/// Availability reconciliation over a [`ScheduleStore`].
#[derive(Debug, Clone)]
pub struct AvailabilityEngine<S> {
    store: Arc<S>,
}

impl<S: ScheduleStore> AvailabilityEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Per-window availability for `date`.
    ///
    /// An appointment whose time falls inside several overlapping windows is
    /// counted against all of them; window ranges are expected not to
    /// overlap, and misconfiguration is logged rather than resolved here.
    #[instrument(skip(self))]
    pub async fn list_available_windows(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<AvailabilitySnapshot>> {
        let windows = self.applicable_windows(date).await?;
        let appointments = self.store.fetch_appointments_on(date).await?;

        let snapshots: Vec<AvailabilitySnapshot> = windows
            .into_iter()
            .map(|window| {
                let booked = count_booked_in_window(&appointments, &window);
                AvailabilitySnapshot::compute(window, booked)
            })
            .collect();

        debug!(
            %date,
            windows = snapshots.len(),
            open = snapshots.iter().filter(|s| s.is_available).count(),
            "Computed availability snapshot"
        );
        Ok(snapshots)
    }

    /// Answer "can I book this exact slot".
    ///
    /// Distinct from [`Self::list_available_windows`]: booking UIs call this
    /// as a confirm-before-submit check against a single point in time.
    #[instrument(skip(self))]
    pub async fn check_slot(&self, date: NaiveDate, time: NaiveTime) -> Result<SlotCheck> {
        match self.resolve_slot(date, time).await? {
            None => Ok(SlotCheck::unavailable("no window configured", 0, 0)),
            Some(resolution) => {
                let window = &resolution.window;
                // The point check compares the exact-time booking count to
                // window capacity; the window-level count gates reservations.
                if resolution.booked_at_time < window.capacity
                    && resolution.booked_in_window < window.capacity
                {
                    Ok(SlotCheck::available(
                        window.capacity,
                        resolution.booked_at_time,
                    ))
                } else {
                    Ok(SlotCheck::unavailable(
                        "window capacity exhausted",
                        window.capacity,
                        resolution.booked_at_time,
                    ))
                }
            }
        }
    }

    /// Create one recurring window per selected weekday and template.
    ///
    /// The whole batch is validated before any write and applied atomically
    /// by the store; a failure leaves the weekly schedule untouched.
    #[instrument(skip(self, spec), fields(weekdays = spec.weekdays.len(), templates = spec.templates.len(), replace = spec.replace_existing))]
    pub async fn bulk_create_recurring_windows(
        &self,
        spec: BulkWindowSpec,
    ) -> Result<Vec<TimeWindow>> {
        self.bulk_create_from(spec, Utc::now().date_naive()).await
    }

    pub(crate) async fn bulk_create_from(
        &self,
        spec: BulkWindowSpec,
        today: NaiveDate,
    ) -> Result<Vec<TimeWindow>> {
        spec.validate()?;

        let mut windows = Vec::with_capacity(spec.weekdays.len() * spec.templates.len());
        for &weekday in &spec.weekdays {
            for template in &spec.templates {
                windows.push(NewTimeWindow {
                    scope: WindowScope::Recurring(weekday),
                    start: template.start,
                    end: template.end,
                    capacity: template.capacity,
                    active: true,
                    effective_from: Some(today),
                    effective_until: None,
                });
            }
        }

        let created = self
            .store
            .replace_recurring_windows(&spec.weekdays, windows, spec.replace_existing)
            .await?;
        debug!(created = created.len(), "Bulk window creation committed");
        Ok(created)
    }

    /// The containing window for `time` on `date` plus its booking counts,
    /// or `None` when no window covers the time. Shared with the
    /// reservation service so both see identical slot resolution.
    pub(crate) async fn resolve_slot(
        &self,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<SlotResolution>> {
        let windows = self.applicable_windows(date).await?;
        let mut matching = windows.into_iter().filter(|w| w.contains_time(time));

        let window = match matching.next() {
            Some(window) => window,
            None => return Ok(None),
        };
        if matching.next().is_some() {
            warn!(%date, %time, "Multiple windows cover this time; ranges should not overlap");
        }

        let appointments = self.store.fetch_appointments_on(date).await?;
        let booked_at_time = appointments
            .iter()
            .filter(|a| a.status.consumes_capacity() && a.start_time == time)
            .count() as u32;
        let booked_in_window = count_booked_in_window(&appointments, &window);
        Ok(Some(SlotResolution {
            window,
            booked_at_time,
            booked_in_window,
        }))
    }

    /// Active windows applicable on `date`, sorted by start time then id so
    /// output order is stable across calls.
    async fn applicable_windows(&self, date: NaiveDate) -> Result<Vec<TimeWindow>> {
        let mut windows: Vec<TimeWindow> = self
            .store
            .fetch_active_windows()
            .await?
            .into_iter()
            .filter(|w| w.applies_on(date))
            .collect();
        windows.sort_by(|a, b| a.start.cmp(&b.start).then(a.id.cmp(&b.id)));
        Ok(windows)
    }
}

/// A resolved point-in-time slot: the containing window and how much of it
/// is already booked, both at the exact time and across the whole range.
#[derive(Debug, Clone)]
pub(crate) struct SlotResolution {
    pub window: TimeWindow,
    pub booked_at_time: u32,
    pub booked_in_window: u32,
}

fn count_booked_in_window(appointments: &[Appointment], window: &TimeWindow) -> u32 {
    appointments
        .iter()
        .filter(|a| a.status.consumes_capacity() && window.contains_time(a.start_time))
        .count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentStatus, NewAppointment, WindowTemplate};
    use crate::store::MemoryScheduleStore;
    use chrono::Weekday;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    // 2025-06-02 is a Monday.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    fn monday_window(capacity: u32) -> TimeWindow {
        TimeWindow {
            id: Uuid::new_v4(),
            scope: WindowScope::Recurring(Weekday::Mon),
            start: t(9, 0),
            end: t(12, 0),
            capacity,
            active: true,
            effective_from: None,
            effective_until: None,
        }
    }

    async fn engine_with(
        windows: Vec<TimeWindow>,
    ) -> AvailabilityEngine<MemoryScheduleStore> {
        let store = Arc::new(MemoryScheduleStore::new());
        for window in windows {
            store.seed_window(window);
        }
        AvailabilityEngine::new(store)
    }

    async fn book(
        engine: &AvailabilityEngine<MemoryScheduleStore>,
        date: NaiveDate,
        time: NaiveTime,
        status: AppointmentStatus,
    ) {
        engine
            .store()
            .insert_appointment(NewAppointment {
                date,
                start_time: time,
                window_id: None,
                status,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn partial_booking_leaves_remaining_capacity() {
        let engine = engine_with(vec![monday_window(6)]).await;
        for minutes in [0, 30, 60, 90] {
            book(
                &engine,
                monday(),
                t(9, 0) + chrono::Duration::minutes(minutes),
                AppointmentStatus::Pending,
            )
            .await;
        }

        let snapshots = engine.list_available_windows(monday()).await.unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].booked_count, 4);
        assert_eq!(snapshots[0].remaining_capacity, 2);
        assert!(snapshots[0].is_available);
    }

    #[tokio::test]
    async fn full_window_reports_unavailable_and_rejects_check() {
        let engine = engine_with(vec![monday_window(6)]).await;
        for minutes in [0, 20, 40, 60, 80, 100] {
            book(
                &engine,
                monday(),
                t(9, 0) + chrono::Duration::minutes(minutes),
                AppointmentStatus::Confirmed,
            )
            .await;
        }

        let snapshots = engine.list_available_windows(monday()).await.unwrap();
        assert_eq!(snapshots[0].remaining_capacity, 0);
        assert!(!snapshots[0].is_available);

        let check = engine.check_slot(monday(), t(10, 0)).await.unwrap();
        assert!(!check.available);
        assert_eq!(check.capacity, 6);
    }

    #[tokio::test]
    async fn overbooked_window_clamps_remaining_to_zero() {
        // Capacity manually reduced below the existing booking count.
        let engine = engine_with(vec![monday_window(2)]).await;
        for minutes in [0, 15, 30, 45] {
            book(
                &engine,
                monday(),
                t(9, 0) + chrono::Duration::minutes(minutes),
                AppointmentStatus::Confirmed,
            )
            .await;
        }

        let snapshots = engine.list_available_windows(monday()).await.unwrap();
        assert_eq!(snapshots[0].booked_count, 4);
        assert_eq!(snapshots[0].remaining_capacity, 0);
        assert!(!snapshots[0].is_available);
    }

    #[tokio::test]
    async fn terminal_statuses_never_consume_capacity() {
        let engine = engine_with(vec![monday_window(3)]).await;
        for status in [
            AppointmentStatus::Cancelled,
            AppointmentStatus::Completed,
            AppointmentStatus::NoShow,
            AppointmentStatus::Cancelled,
            AppointmentStatus::Completed,
        ] {
            book(&engine, monday(), t(9, 30), status).await;
        }

        let snapshots = engine.list_available_windows(monday()).await.unwrap();
        assert_eq!(snapshots[0].booked_count, 0);
        assert_eq!(snapshots[0].remaining_capacity, 3);
    }

    #[tokio::test]
    async fn specific_date_and_recurring_windows_both_listed() {
        let specific = TimeWindow {
            id: Uuid::new_v4(),
            scope: WindowScope::SpecificDate(monday()),
            start: t(14, 0),
            end: t(16, 0),
            capacity: 2,
            active: true,
            effective_from: None,
            effective_until: None,
        };
        let engine = engine_with(vec![monday_window(6), specific]).await;

        let snapshots = engine.list_available_windows(monday()).await.unwrap();
        assert_eq!(snapshots.len(), 2);
        assert!(snapshots
            .iter()
            .any(|s| matches!(s.window.scope, WindowScope::Recurring(_))));
        assert!(snapshots
            .iter()
            .any(|s| matches!(s.window.scope, WindowScope::SpecificDate(_))));
    }

    #[tokio::test]
    async fn check_slot_without_window_names_the_reason() {
        let engine = engine_with(vec![monday_window(6)]).await;
        let check = engine.check_slot(monday(), t(15, 0)).await.unwrap();
        assert!(!check.available);
        assert_eq!(check.reason.as_deref(), Some("no window configured"));
    }

    #[tokio::test]
    async fn check_slot_counts_exact_time_only() {
        let engine = engine_with(vec![monday_window(3)]).await;
        book(&engine, monday(), t(9, 0), AppointmentStatus::Pending).await;
        book(&engine, monday(), t(10, 0), AppointmentStatus::Pending).await;

        // The 10:00 booking does not count against the 09:00 point check.
        let check = engine.check_slot(monday(), t(9, 0)).await.unwrap();
        assert!(check.available);
        assert_eq!(check.booked, 1);
    }

    #[tokio::test]
    async fn overlapping_windows_count_the_same_appointment() {
        let mut second = monday_window(4);
        second.start = t(10, 0);
        second.end = t(13, 0);
        let engine = engine_with(vec![monday_window(4), second]).await;
        book(&engine, monday(), t(11, 0), AppointmentStatus::Confirmed).await;

        let snapshots = engine.list_available_windows(monday()).await.unwrap();
        assert_eq!(snapshots.len(), 2);
        for snapshot in &snapshots {
            assert_eq!(snapshot.booked_count, 1);
        }
    }

    #[tokio::test]
    async fn listing_order_is_deterministic() {
        let mut early = monday_window(2);
        early.start = t(8, 0);
        early.end = t(8, 45);
        let engine = engine_with(vec![monday_window(2), early]).await;

        let first = engine.list_available_windows(monday()).await.unwrap();
        let second = engine.list_available_windows(monday()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].window.start, t(8, 0));
    }

    #[tokio::test]
    async fn bulk_creation_without_replace_keeps_existing_windows() {
        let engine = engine_with(vec![monday_window(6)]).await;
        let spec = BulkWindowSpec {
            weekdays: vec![Weekday::Mon, Weekday::Tue, Weekday::Wed],
            templates: vec![WindowTemplate {
                start: t(14, 0),
                end: t(17, 0),
                capacity: 3,
            }],
            replace_existing: false,
        };

        let created = engine
            .bulk_create_from(spec, monday())
            .await
            .unwrap();
        assert_eq!(created.len(), 3);
        assert!(created.iter().all(|w| w.effective_from == Some(monday())));

        // Old and new Monday windows both appear in subsequent listings.
        let snapshots = engine.list_available_windows(monday()).await.unwrap();
        assert_eq!(snapshots.len(), 2);
    }

    #[tokio::test]
    async fn bulk_creation_with_replace_supersedes_selected_days() {
        let engine = engine_with(vec![monday_window(6)]).await;
        let spec = BulkWindowSpec {
            weekdays: vec![Weekday::Mon],
            templates: vec![WindowTemplate {
                start: t(14, 0),
                end: t(17, 0),
                capacity: 3,
            }],
            replace_existing: true,
        };

        engine.bulk_create_from(spec, monday()).await.unwrap();
        let snapshots = engine.list_available_windows(monday()).await.unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].window.start, t(14, 0));
    }

    #[tokio::test]
    async fn bulk_creation_rejects_bad_template_before_any_write() {
        let engine = engine_with(vec![monday_window(6)]).await;
        let spec = BulkWindowSpec {
            weekdays: vec![Weekday::Mon],
            templates: vec![
                WindowTemplate {
                    start: t(14, 0),
                    end: t(17, 0),
                    capacity: 3,
                },
                WindowTemplate {
                    start: t(17, 0),
                    end: t(14, 0),
                    capacity: 3,
                },
            ],
            replace_existing: true,
        };

        assert!(engine.bulk_create_from(spec, monday()).await.is_err());
        // Nothing was deleted or created.
        let snapshots = engine.list_available_windows(monday()).await.unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].window.start, t(9, 0));
    }

    proptest! {
        #[test]
        fn remaining_capacity_never_goes_negative(capacity in 1u32..50, booked in 0u32..100) {
            let snapshot = AvailabilitySnapshot::compute(
                TimeWindow {
                    id: Uuid::new_v4(),
                    scope: WindowScope::Recurring(Weekday::Mon),
                    start: t(9, 0),
                    end: t(12, 0),
                    capacity,
                    active: true,
                    effective_from: None,
                    effective_until: None,
                },
                booked,
            );
            prop_assert_eq!(snapshot.remaining_capacity, capacity.saturating_sub(booked));
            prop_assert_eq!(snapshot.is_available, booked < capacity);
        }
    }
}
