//! Configured bookable intervals.
//!
//! A [`TimeWindow`] is either recurring on a weekday or pinned to a single
//! calendar date; the enum makes the exactly-one-scope invariant structural.

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ClinicCoreError, Result};

/// Where a window applies on the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum WindowScope {
    /// Applies every week on the given weekday, subject to effective bounds.
    Recurring(Weekday),
    /// Applies on exactly one calendar date.
    SpecificDate(NaiveDate),
}

/// A configured bookable interval.
///
/// Inactive windows are never offered for booking but are retained for
/// history; deletion is always an explicit administrative action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub id: Uuid,
    pub scope: WindowScope,
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// Maximum concurrent appointments allowed in this window.
    pub capacity: u32,
    pub active: bool,
    pub effective_from: Option<NaiveDate>,
    pub effective_until: Option<NaiveDate>,
}

/// A window awaiting insertion (no generated fields yet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTimeWindow {
    pub scope: WindowScope,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub capacity: u32,
    pub active: bool,
    pub effective_from: Option<NaiveDate>,
    pub effective_until: Option<NaiveDate>,
}

/// One `{start, end, capacity}` template inside a bulk creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowTemplate {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub capacity: u32,
}

/// Administrative bulk creation request: every selected weekday gets one
/// recurring window per template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkWindowSpec {
    pub weekdays: Vec<Weekday>,
    pub templates: Vec<WindowTemplate>,
    /// When set, active recurring windows on the selected weekdays are
    /// deleted before the new ones are created.
    pub replace_existing: bool,
}

impl TimeWindow {
    /// Whether this window is offered on `date`.
    ///
    /// Active windows only; recurring scope additionally honors the
    /// `[effective_from, effective_until]` bounds where set.
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        if !self.active {
            return false;
        }
        match self.scope {
            WindowScope::SpecificDate(d) => d == date,
            WindowScope::Recurring(weekday) => {
                if date.weekday() != weekday {
                    return false;
                }
                if let Some(from) = self.effective_from {
                    if date < from {
                        return false;
                    }
                }
                if let Some(until) = self.effective_until {
                    if date > until {
                        return false;
                    }
                }
                true
            }
        }
    }

    /// Whether `time` falls inside `[start, end]`, inclusive of both ends.
    pub fn contains_time(&self, time: NaiveTime) -> bool {
        time >= self.start && time <= self.end
    }
}

impl NewTimeWindow {
    /// Validates the `start < end` and `capacity >= 1` invariants.
    pub fn validate(&self) -> Result<()> {
        validate_interval(self.start, self.end, self.capacity)
    }
}

impl WindowTemplate {
    pub fn validate(&self) -> Result<()> {
        validate_interval(self.start, self.end, self.capacity)
    }
}

impl BulkWindowSpec {
    /// Rejects the whole request before any write when any part is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.weekdays.is_empty() {
            return Err(ClinicCoreError::validation(
                "weekdays",
                "at least one weekday must be selected",
            ));
        }
        if self.templates.is_empty() {
            return Err(ClinicCoreError::validation(
                "templates",
                "at least one window template is required",
            ));
        }
        for template in &self.templates {
            template.validate()?;
        }
        Ok(())
    }
}

fn validate_interval(start: NaiveTime, end: NaiveTime, capacity: u32) -> Result<()> {
    if start >= end {
        return Err(ClinicCoreError::validation(
            "start",
            format!("start {start} must be before end {end}"),
        ));
    }
    if capacity == 0 {
        return Err(ClinicCoreError::validation(
            "capacity",
            "capacity must be at least 1",
        ));
    }
    Ok(())
}
