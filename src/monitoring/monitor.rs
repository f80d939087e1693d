//! The store health monitor.
//!
//! Each cycle walks Idle → Probing → Aggregating → Evaluating →
//! (Alerting | Idle). Cycles never overlap: the loop awaits the running
//! cycle and skips missed ticks instead of stacking them.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::MonitoringConfig;
use crate::error::Result;
use crate::models::{Alert, AlertKind, AlertSeverity, HealthMetricSample};

use super::alerts::AlertDispatcher;
use super::probe::HealthProbe;

/// Where a monitor currently is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Probing,
    Aggregating,
    Evaluating,
    Alerting,
}

/// Outcome of one completed cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub samples_recorded: usize,
    pub rolling_mean_ms: f64,
    pub alerts_raised: Vec<Alert>,
    pub alerts_delivered: usize,
}

/// Periodic health monitor over a set of named probes.
///
/// All rolling state lives on the instance; multiple independently
/// configured monitors can coexist in one process.
pub struct StoreHealthMonitor {
    config: MonitoringConfig,
    probes: Vec<Arc<dyn HealthProbe>>,
    dispatcher: Arc<AlertDispatcher>,
    samples: Mutex<VecDeque<HealthMetricSample>>,
    phase: Mutex<CyclePhase>,
}

/// Graceful-stop handle for a spawned monitor loop.
pub struct MonitorHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl MonitorHandle {
    /// Signal the loop to exit and wait for it to drain.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.join.await;
    }
}

impl StoreHealthMonitor {
    pub fn new(config: MonitoringConfig, dispatcher: Arc<AlertDispatcher>) -> Self {
        Self {
            config,
            probes: Vec::new(),
            dispatcher,
            samples: Mutex::new(VecDeque::new()),
            phase: Mutex::new(CyclePhase::Idle),
        }
    }

    pub fn with_probes(mut self, probes: Vec<Arc<dyn HealthProbe>>) -> Self {
        self.probes = probes;
        self
    }

    pub fn add_probe(&mut self, probe: Arc<dyn HealthProbe>) {
        self.probes.push(probe);
    }

    pub fn current_phase(&self) -> CyclePhase {
        *self.phase.lock()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.lock().len()
    }

    /// Mean latency across the rolling window, in milliseconds.
    pub fn rolling_mean_ms(&self) -> f64 {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().map(|s| s.duration_ms as f64).sum::<f64>() / samples.len() as f64
    }

    fn set_phase(&self, phase: CyclePhase) {
        *self.phase.lock() = phase;
    }

    /// Run one probe cycle to completion.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        self.set_phase(CyclePhase::Probing);
        let mut cycle_samples = Vec::with_capacity(self.probes.len());
        let mut failures: Vec<(String, String)> = Vec::new();

        for probe in &self.probes {
            let started = std::time::Instant::now();
            let outcome = probe.execute().await;
            let duration_ms = started.elapsed().as_millis() as u64;

            let success = match outcome {
                Ok(()) => true,
                Err(e) => {
                    // Probe failure is data, not a cycle error.
                    failures.push((probe.name().to_string(), e.to_string()));
                    false
                }
            };
            cycle_samples.push(HealthMetricSample {
                timestamp: Utc::now(),
                probe: probe.name().to_string(),
                duration_ms,
                success,
            });
        }

        self.set_phase(CyclePhase::Aggregating);
        self.push_samples(&cycle_samples);
        let mean = self.rolling_mean_ms();

        self.set_phase(CyclePhase::Evaluating);
        let alerts = self.evaluate(&cycle_samples, &failures, mean);

        let mut delivered = 0;
        if alerts.is_empty() {
            debug!(mean_latency_ms = mean, "Cycle healthy, no alerts");
        } else {
            self.set_phase(CyclePhase::Alerting);
            for alert in &alerts {
                delivered += self.dispatcher.dispatch(alert).await;
            }
            warn!(
                alerts = alerts.len(),
                delivered, mean_latency_ms = mean, "Cycle raised alerts"
            );
        }

        self.set_phase(CyclePhase::Idle);
        Ok(CycleReport {
            samples_recorded: cycle_samples.len(),
            rolling_mean_ms: mean,
            alerts_raised: alerts,
            alerts_delivered: delivered,
        })
    }

    /// Append samples to the rolling window, evicting oldest-first beyond
    /// the configured size.
    fn push_samples(&self, new_samples: &[HealthMetricSample]) {
        let mut samples = self.samples.lock();
        for sample in new_samples {
            samples.push_back(sample.clone());
            while samples.len() > self.config.sample_window_size {
                samples.pop_front();
            }
        }
    }

    /// Threshold evaluation over this cycle's samples and the rolling mean.
    fn evaluate(
        &self,
        cycle_samples: &[HealthMetricSample],
        failures: &[(String, String)],
        mean_ms: f64,
    ) -> Vec<Alert> {
        let mut alerts = Vec::new();

        for (probe, reason) in failures {
            alerts.push(
                Alert::new(
                    AlertKind::HealthCheckFailed(probe.clone()),
                    AlertSeverity::Critical,
                    format!("Health check failed: {probe}"),
                )
                .with_details(vec![reason.clone()])
                .with_mean_latency(mean_ms as u64),
            );
        }

        for sample in cycle_samples {
            if sample.success && sample.duration_ms > self.config.slow_query_ms {
                alerts.push(
                    Alert::new(
                        AlertKind::SlowQuery(sample.probe.clone()),
                        AlertSeverity::Warning,
                        format!("Slow query: {}", sample.probe),
                    )
                    .with_details(vec![format!(
                        "{} took {} ms (bound {} ms)",
                        sample.probe, sample.duration_ms, self.config.slow_query_ms
                    )])
                    .with_mean_latency(mean_ms as u64),
                );
            }
        }

        if mean_ms > self.config.mean_latency_warn_ms as f64 {
            alerts.push(
                Alert::new(
                    AlertKind::MeanLatencyHigh,
                    AlertSeverity::Warning,
                    "Mean query latency above threshold",
                )
                .with_details(vec![format!(
                    "rolling mean {:.0} ms exceeds {} ms over {} samples",
                    mean_ms,
                    self.config.mean_latency_warn_ms,
                    self.sample_count()
                )])
                .with_mean_latency(mean_ms as u64),
            );
        }

        alerts
    }

    /// Run the monitor until `shutdown` flips to true.
    ///
    /// Ticks that land while a cycle is still running are skipped, so two
    /// cycles never overlap. A cycle that errors or panics is escalated as
    /// its own critical alert and the loop carries on.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.interval_seconds));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            interval_seconds = self.config.interval_seconds,
            probes = self.probes.len(),
            "Health monitor started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let cycle = std::panic::AssertUnwindSafe(self.run_cycle())
                        .catch_unwind()
                        .await;
                    match cycle {
                        Ok(Ok(report)) => {
                            debug!(
                                samples = report.samples_recorded,
                                mean_latency_ms = report.rolling_mean_ms,
                                alerts = report.alerts_raised.len(),
                                "Cycle complete"
                            );
                        }
                        Ok(Err(e)) => self.escalate_cycle_failure(e.to_string()).await,
                        Err(panic) => {
                            let message = panic
                                .downcast_ref::<&str>()
                                .map(|s| (*s).to_string())
                                .or_else(|| panic.downcast_ref::<String>().cloned())
                                .unwrap_or_else(|| "monitor cycle panicked".to_string());
                            self.escalate_cycle_failure(message).await;
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Health monitor stopped");
    }

    /// Fail-safe: a bug in the monitor itself must be visible, not silent.
    async fn escalate_cycle_failure(&self, message: String) {
        error!(error = %message, "Monitoring cycle failed");
        let alert = Alert::new(
            AlertKind::MonitorFailure,
            AlertSeverity::Critical,
            "Monitoring cycle failure",
        )
        .with_details(vec![message]);
        self.dispatcher.dispatch(&alert).await;
        self.set_phase(CyclePhase::Idle);
    }

    /// Spawn the monitor loop on the current runtime.
    pub fn spawn(self: Arc<Self>) -> MonitorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(shutdown_rx));
        MonitorHandle {
            shutdown: shutdown_tx,
            join,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClinicCoreError;
    use crate::monitoring::alerts::AlertTransport;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTransport {
        delivered: Mutex<Vec<Alert>>,
    }

    impl CountingTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                delivered: Mutex::new(Vec::new()),
            })
        }

        fn alerts(&self) -> Vec<Alert> {
            self.delivered.lock().clone()
        }
    }

    #[async_trait]
    impl AlertTransport for CountingTransport {
        fn name(&self) -> &str {
            "counting"
        }

        fn supports(&self, _severity: AlertSeverity) -> bool {
            true
        }

        async fn deliver(&self, alert: &Alert) -> Result<()> {
            self.delivered.lock().push(alert.clone());
            Ok(())
        }
    }

    /// Probe that fails on selected invocations.
    struct ScriptedProbe {
        name: &'static str,
        calls: AtomicUsize,
        fail_on: Vec<usize>,
        sleep_ms: u64,
    }

    #[async_trait]
    impl HealthProbe for ScriptedProbe {
        fn name(&self) -> &str {
            self.name
        }

        async fn execute(&self) -> Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.sleep_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.sleep_ms)).await;
            }
            if self.fail_on.contains(&call) {
                return Err(ClinicCoreError::StoreError("connection refused".to_string()));
            }
            Ok(())
        }
    }

    /// Probe with a logic bug that panics instead of returning.
    struct PanickingProbe;

    #[async_trait]
    impl HealthProbe for PanickingProbe {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn execute(&self) -> Result<()> {
            panic!("probe index out of bounds");
        }
    }

    fn sample(probe: &str, duration_ms: u64, success: bool) -> HealthMetricSample {
        HealthMetricSample {
            timestamp: Utc::now(),
            probe: probe.to_string(),
            duration_ms,
            success,
        }
    }

    fn monitor_with(
        config: MonitoringConfig,
        transport: Arc<CountingTransport>,
    ) -> StoreHealthMonitor {
        let dispatcher = Arc::new(AlertDispatcher::new(Duration::ZERO).with_transport(transport));
        StoreHealthMonitor::new(config, dispatcher)
    }

    #[tokio::test]
    async fn rolling_mean_tracks_recent_samples() {
        let transport = CountingTransport::new();
        let monitor = monitor_with(MonitoringConfig::default(), transport.clone());

        monitor.push_samples(&[
            sample("probe", 100, true),
            sample("probe", 200, true),
            sample("probe", 300, true),
        ]);
        assert_eq!(monitor.rolling_mean_ms(), 200.0);
        // Below the 500 ms threshold, no warning.
        let alerts = monitor.evaluate(&[], &[], monitor.rolling_mean_ms());
        assert!(alerts.is_empty());

        // A fourth probe at 1200 ms: exactly one slow-query warning, and
        // the rolling mean now includes it.
        let slow = sample("probe", 1200, true);
        monitor.push_samples(std::slice::from_ref(&slow));
        assert_eq!(monitor.rolling_mean_ms(), 450.0);
        let alerts = monitor.evaluate(&[slow], &[], monitor.rolling_mean_ms());
        assert_eq!(alerts.len(), 1);
        assert!(matches!(alerts[0].kind, AlertKind::SlowQuery(_)));
        assert_eq!(alerts[0].severity, AlertSeverity::Warning);
    }

    #[tokio::test]
    async fn sustained_slowness_raises_mean_latency_warning() {
        let transport = CountingTransport::new();
        let monitor = monitor_with(MonitoringConfig::default(), transport);

        monitor.push_samples(&[
            sample("probe", 600, true),
            sample("probe", 700, true),
            sample("probe", 800, true),
        ]);
        let alerts = monitor.evaluate(&[], &[], monitor.rolling_mean_ms());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::MeanLatencyHigh);
    }

    #[tokio::test]
    async fn window_evicts_oldest_samples_first() {
        let transport = CountingTransport::new();
        let config = MonitoringConfig {
            sample_window_size: 3,
            ..MonitoringConfig::default()
        };
        let monitor = monitor_with(config, transport);

        monitor.push_samples(&[
            sample("probe", 100, true),
            sample("probe", 200, true),
            sample("probe", 300, true),
            sample("probe", 400, true),
        ]);
        assert_eq!(monitor.sample_count(), 3);
        // The 100 ms sample was evicted: mean of 200/300/400.
        assert_eq!(monitor.rolling_mean_ms(), 300.0);
    }

    #[tokio::test]
    async fn failed_probe_becomes_data_and_a_critical_alert() {
        let transport = CountingTransport::new();
        let monitor = monitor_with(MonitoringConfig::default(), transport.clone())
            .with_probes(vec![Arc::new(ScriptedProbe {
                name: "store_select",
                calls: AtomicUsize::new(0),
                fail_on: vec![0],
                sleep_ms: 0,
            })]);

        // First cycle: probe fails, recorded as success=false, critical alert.
        let report = monitor.run_cycle().await.unwrap();
        assert_eq!(report.samples_recorded, 1);
        assert_eq!(report.alerts_raised.len(), 1);
        assert_eq!(report.alerts_raised[0].severity, AlertSeverity::Critical);
        assert!(matches!(
            report.alerts_raised[0].kind,
            AlertKind::HealthCheckFailed(_)
        ));

        // Next cycle proceeds independently, no crash-loop.
        let report = monitor.run_cycle().await.unwrap();
        assert!(report.alerts_raised.is_empty());
        assert_eq!(monitor.sample_count(), 2);
        assert_eq!(transport.alerts().len(), 1);
    }

    #[tokio::test]
    async fn slow_probe_raises_slow_query_warning_through_full_cycle() {
        let transport = CountingTransport::new();
        let config = MonitoringConfig {
            slow_query_ms: 1,
            mean_latency_warn_ms: 10_000,
            ..MonitoringConfig::default()
        };
        let monitor = monitor_with(config, transport.clone()).with_probes(vec![Arc::new(
            ScriptedProbe {
                name: "slow_select",
                calls: AtomicUsize::new(0),
                fail_on: vec![],
                sleep_ms: 20,
            },
        )]);

        let report = monitor.run_cycle().await.unwrap();
        assert_eq!(report.alerts_raised.len(), 1);
        assert_eq!(
            report.alerts_raised[0].kind,
            AlertKind::SlowQuery("slow_select".to_string())
        );
        assert_eq!(report.alerts_delivered, 1);
    }

    #[tokio::test]
    async fn panicking_cycle_escalates_as_monitor_failure_and_loop_survives() {
        let transport = CountingTransport::new();
        let config = MonitoringConfig {
            interval_seconds: 1,
            ..MonitoringConfig::default()
        };
        let monitor = Arc::new(
            monitor_with(config, transport.clone()).with_probes(vec![Arc::new(PanickingProbe)]),
        );

        let handle = Arc::clone(&monitor).spawn();
        // First tick fires immediately and panics; the loop must outlive it.
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop().await;

        let alerts = transport.alerts();
        assert!(!alerts.is_empty());
        for alert in &alerts {
            assert_eq!(alert.kind, AlertKind::MonitorFailure);
            assert_eq!(alert.severity, AlertSeverity::Critical);
            assert!(alert.details[0].contains("probe index out of bounds"));
        }
        // Fail-safe resets the phase so the next tick can run.
        assert_eq!(monitor.current_phase(), CyclePhase::Idle);
    }

    #[tokio::test]
    async fn spawned_monitor_stops_on_handle() {
        let transport = CountingTransport::new();
        let config = MonitoringConfig {
            interval_seconds: 3600,
            ..MonitoringConfig::default()
        };
        let monitor = Arc::new(monitor_with(config, transport).with_probes(vec![]));

        let handle = Arc::clone(&monitor).spawn();
        // First tick fires immediately; give it a moment, then stop.
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop().await;
        assert_eq!(monitor.current_phase(), CyclePhase::Idle);
    }
}
