pub mod appointment;
pub mod availability;
pub mod monitoring;
pub mod time_window;

// Re-export core models for easy access
pub use appointment::{Appointment, AppointmentStatus, NewAppointment};
pub use availability::{AvailabilitySnapshot, SlotCheck};
pub use monitoring::{Alert, AlertKind, AlertSeverity, HealthMetricSample};
pub use time_window::{BulkWindowSpec, NewTimeWindow, TimeWindow, WindowScope, WindowTemplate};
