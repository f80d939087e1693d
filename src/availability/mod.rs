//! # Availability Engine
//!
//! Reconciles configured time windows against booked appointments: per-date
//! slot listings, point availability checks, administrative bulk window
//! creation, and atomic check-and-book reservations.

pub mod engine;
pub mod reservation;

pub use engine::AvailabilityEngine;
pub use reservation::{CapacityReservation, SlotReservationService};
