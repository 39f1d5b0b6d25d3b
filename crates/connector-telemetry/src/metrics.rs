//! Prometheus metrics for the connector host.
//!
//! All metrics follow the naming convention: `ch_<area>_<metric>_<unit>`
//!
//! [`PrometheusRecorder`] implements the core's [`MetricsRecorder`] port,
//! so providers, the directory and the install guard feed these collectors
//! without knowing about Prometheus.

use std::time::Duration;

use connector_core::{MetricsRecorder, State, SubscriptionEvent};
use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Lifecycle transitions by component and target state
    pub static ref STATE_TRANSITIONS: CounterVec = CounterVec::new(
        Opts::new("ch_lifecycle_transitions_total", "Total lifecycle state transitions"),
        &["component", "to"]
    ).expect("metric creation failed");

    /// Subscription bookkeeping events
    pub static ref SUBSCRIPTION_EVENTS: CounterVec = CounterVec::new(
        Opts::new("ch_subscriptions_events_total", "Subscriptions added, rejected, removed or invalidated"),
        &["event"]
    ).expect("metric creation failed");

    /// Callback deliveries by outcome
    pub static ref NOTIFICATIONS: CounterVec = CounterVec::new(
        Opts::new("ch_notifications_total", "Change notifications delivered to subscribers"),
        &["outcome"]  // delivered/failed
    ).expect("metric creation failed");

    /// Reads by provider and outcome
    pub static ref READS: CounterVec = CounterVec::new(
        Opts::new("ch_reads_total", "Source reads"),
        &["provider", "outcome"]
    ).expect("metric creation failed");

    /// Read latency
    pub static ref READ_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("ch_read_duration_seconds", "Time spent reading from a source")
            .buckets(exponential_buckets(0.0001, 2.0, 15).expect("valid buckets")),
        &["provider"]
    ).expect("metric creation failed");

    /// Install attempts by outcome
    pub static ref INSTALLS: CounterVec = CounterVec::new(
        Opts::new("ch_installs_total", "Install and reload attempts"),
        &["outcome"]  // accepted/rejected
    ).expect("metric creation failed");
}

/// Register all collectors with [`REGISTRY`]. Safe to call more than once.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(STATE_TRANSITIONS.clone()),
        Box::new(SUBSCRIPTION_EVENTS.clone()),
        Box::new(NOTIFICATIONS.clone()),
        Box::new(READS.clone()),
        Box::new(READ_DURATION.clone()),
        Box::new(INSTALLS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// [`MetricsRecorder`] backed by the global Prometheus collectors.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusRecorder;

impl MetricsRecorder for PrometheusRecorder {
    fn record_transition(&self, component: &str, _from: State, to: State) {
        let to = to.to_string();
        STATE_TRANSITIONS
            .with_label_values(&[component, to.as_str()])
            .inc();
    }

    fn record_subscription(&self, event: SubscriptionEvent) {
        let (label, count) = match event {
            SubscriptionEvent::Added => ("added", 1),
            SubscriptionEvent::Rejected => ("rejected", 1),
            SubscriptionEvent::Removed => ("removed", 1),
            SubscriptionEvent::Invalidated(n) => ("invalidated", n),
        };
        SUBSCRIPTION_EVENTS
            .with_label_values(&[label])
            .inc_by(count as f64);
    }

    fn record_notification(&self, delivered: usize, failed: usize) {
        NOTIFICATIONS
            .with_label_values(&["delivered"])
            .inc_by(delivered as f64);
        NOTIFICATIONS
            .with_label_values(&["failed"])
            .inc_by(failed as f64);
    }

    fn record_read(&self, provider: &str, duration: Duration, ok: bool) {
        let outcome = if ok { "ok" } else { "failed" };
        READS.with_label_values(&[provider, outcome]).inc();
        READ_DURATION
            .with_label_values(&[provider])
            .observe(duration.as_secs_f64());
    }

    fn record_install(&self, accepted: bool) {
        let outcome = if accepted { "accepted" } else { "rejected" };
        INSTALLS.with_label_values(&[outcome]).inc();
    }
}
