//! Event Bridge Metrics
//!
//! Process-wide Prometheus counters for the job event path and manual
//! triggers. The collectors are created lazily on first use and exported
//! only once [`BridgeMetrics::register`] is called at process start;
//! recording works whether or not they were registered.

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

#[derive(Debug, Clone)]
pub struct BridgeMetrics {
    pub events_total: IntCounterVec,
    pub events_ignored_total: IntCounter,
    pub events_dropped_total: IntCounter,
    pub manual_triggers_total: IntCounterVec,
}

static METRICS: Lazy<BridgeMetrics> = Lazy::new(BridgeMetrics::new);

/// Process-wide metrics instance
pub fn bridge_metrics() -> &'static BridgeMetrics {
    &METRICS
}

impl BridgeMetrics {
    fn new() -> Self {
        let events_total = IntCounterVec::new(
            Opts::new(
                "cronpilot_job_events_total",
                "Job lifecycle events turned into audit events",
            ),
            &["reason"],
        )
        .expect("static metric definition");
        let events_ignored_total = IntCounter::new(
            "cronpilot_job_events_ignored_total",
            "Job lifecycle events with a reason that is not audited",
        )
        .expect("static metric definition");
        let events_dropped_total = IntCounter::new(
            "cronpilot_job_events_dropped_total",
            "Job lifecycle events dropped because the audit sink failed",
        )
        .expect("static metric definition");
        let manual_triggers_total = IntCounterVec::new(
            Opts::new(
                "cronpilot_manual_triggers_total",
                "Manual cronjob runs by outcome",
            ),
            &["outcome"],
        )
        .expect("static metric definition");

        Self {
            events_total,
            events_ignored_total,
            events_dropped_total,
            manual_triggers_total,
        }
    }

    /// Register metrics with Prometheus registry
    pub fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.events_total.clone()))?;
        registry.register(Box::new(self.events_ignored_total.clone()))?;
        registry.register(Box::new(self.events_dropped_total.clone()))?;
        registry.register(Box::new(self.manual_triggers_total.clone()))?;
        Ok(())
    }

    pub fn record_event(&self, reason: &str) {
        self.events_total.with_label_values(&[reason]).inc();
    }

    pub fn record_ignored(&self) {
        self.events_ignored_total.inc();
    }

    pub fn record_dropped(&self) {
        self.events_dropped_total.inc();
    }

    pub fn record_trigger(&self, outcome: &str) {
        self.manual_triggers_total.with_label_values(&[outcome]).inc();
    }
}
