//! Derived availability results. Never stored; recomputed on every check.

use serde::{Deserialize, Serialize};

use super::time_window::TimeWindow;

/// Per-window availability for one calendar date, computed at query time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilitySnapshot {
    pub window: TimeWindow,
    pub booked_count: u32,
    /// Clamped at zero even when bookings exceed capacity after a manual
    /// capacity reduction.
    pub remaining_capacity: u32,
    pub is_available: bool,
}

impl AvailabilitySnapshot {
    pub fn compute(window: TimeWindow, booked_count: u32) -> Self {
        let remaining_capacity = window.capacity.saturating_sub(booked_count);
        Self {
            window,
            booked_count,
            remaining_capacity,
            is_available: remaining_capacity > 0,
        }
    }
}

/// Answer to "can I book this exact slot".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotCheck {
    pub available: bool,
    /// Populated when unavailable, e.g. "no window configured".
    pub reason: Option<String>,
    pub capacity: u32,
    pub booked: u32,
}

impl SlotCheck {
    pub fn unavailable(reason: impl Into<String>, capacity: u32, booked: u32) -> Self {
        Self {
            available: false,
            reason: Some(reason.into()),
            capacity,
            booked,
        }
    }

    pub fn available(capacity: u32, booked: u32) -> Self {
        Self {
            available: true,
            reason: None,
            capacity,
            booked,
        }
    }
}
