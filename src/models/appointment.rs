//! Booked appointment occurrences.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Appointment lifecycle status.
///
/// Only `Pending`, `Confirmed`, and `InProgress` consume window capacity;
/// terminal statuses free the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    /// Whether an appointment in this status counts against window capacity.
    pub fn consumes_capacity(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Pending
                | AppointmentStatus::Confirmed
                | AppointmentStatus::InProgress
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "in_progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(AppointmentStatus::Pending),
            "confirmed" => Some(AppointmentStatus::Confirmed),
            "in_progress" => Some(AppointmentStatus::InProgress),
            "completed" => Some(AppointmentStatus::Completed),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            "no_show" => Some(AppointmentStatus::NoShow),
            _ => None,
        }
    }
}

/// A booked occurrence on the calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    /// Window the booking flow attributed this appointment to, when known.
    /// Capacity accounting goes by time containment, not by this field.
    pub window_id: Option<Uuid>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

/// An appointment awaiting insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAppointment {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub window_id: Option<Uuid>,
    pub status: AppointmentStatus,
}

impl NewAppointment {
    /// Patient-facing bookings start out pending.
    pub fn pending(date: NaiveDate, start_time: NaiveTime, window_id: Option<Uuid>) -> Self {
        Self {
            date,
            start_time,
            window_id,
            status: AppointmentStatus::Pending,
        }
    }
}
