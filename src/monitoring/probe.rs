//! Health probes: named minimal test queries against the backing store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::error::Result;
use crate::store::ScheduleStore;

/// A named test query the monitor times on every cycle.
///
/// An `Err` from `execute` is captured as a failed sample by the monitor,
/// never propagated as a cycle failure.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    fn name(&self) -> &str;
    async fn execute(&self) -> Result<()>;
}

/// Minimal read against the time-window table.
pub struct WindowSelectProbe<S> {
    store: Arc<S>,
}

impl<S> WindowSelectProbe<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: ScheduleStore> HealthProbe for WindowSelectProbe<S> {
    fn name(&self) -> &str {
        "time_windows_select"
    }

    async fn execute(&self) -> Result<()> {
        self.store.fetch_active_windows().await.map(|_| ())
    }
}

/// Minimal read against today's appointments.
pub struct AppointmentSelectProbe<S> {
    store: Arc<S>,
}

impl<S> AppointmentSelectProbe<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: ScheduleStore> HealthProbe for AppointmentSelectProbe<S> {
    fn name(&self) -> &str {
        "appointments_select"
    }

    async fn execute(&self) -> Result<()> {
        self.store
            .fetch_appointments_on(Utc::now().date_naive())
            .await
            .map(|_| ())
    }
}

/// Row-count check across the monitored tables.
pub struct TableCountProbe<S> {
    store: Arc<S>,
}

impl<S> TableCountProbe<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: ScheduleStore> HealthProbe for TableCountProbe<S> {
    fn name(&self) -> &str {
        "table_counts"
    }

    async fn execute(&self) -> Result<()> {
        let counts = self.store.table_counts().await?;
        for (table, rows) in &counts {
            debug!(table = %table, rows, "Row count probe");
        }
        Ok(())
    }
}

/// The standard probe set run against a schedule store.
pub fn standard_probes<S: ScheduleStore + 'static>(store: Arc<S>) -> Vec<Arc<dyn HealthProbe>> {
    vec![
        Arc::new(WindowSelectProbe::new(Arc::clone(&store))),
        Arc::new(AppointmentSelectProbe::new(Arc::clone(&store))),
        Arc::new(TableCountProbe::new(store)),
    ]
}
