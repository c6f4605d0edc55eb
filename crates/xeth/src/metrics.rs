//! Prometheus diagnostics for the reconciler
//!
//! Counts received messages, emitted notes, decode failures and light events
//! that referenced a device the registry has not learned yet.

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::fmt;
use std::sync::Arc;

/// Prometheus metrics collector shared by the registry and reconciler
#[derive(Clone)]
pub struct MetricsCollector {
    messages: IntCounterVec,
    notes: IntCounterVec,
    unknown_device: IntCounterVec,
    decode_errors: IntCounter,
    links: IntGauge,

    registry: Arc<Registry>,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let messages = IntCounterVec::new(
            Opts::new("xeth_messages_total", "Driver messages received by kind"),
            &["kind"],
        )?;
        registry.register(Box::new(messages.clone()))?;

        let notes = IntCounterVec::new(
            Opts::new("xeth_notes_total", "Lifecycle notes emitted by type"),
            &["note"],
        )?;
        registry.register(Box::new(notes.clone()))?;

        let unknown_device = IntCounterVec::new(
            Opts::new(
                "xeth_unknown_device_total",
                "Events referencing a device missing from the registry",
            ),
            &["context"],
        )?;
        registry.register(Box::new(unknown_device.clone()))?;

        let decode_errors =
            IntCounter::new("xeth_decode_errors_total", "Messages that failed to decode")?;
        registry.register(Box::new(decode_errors.clone()))?;

        let links = IntGauge::new("xeth_links", "Devices currently held in the registry")?;
        registry.register(Box::new(links.clone()))?;

        Ok(Self {
            messages,
            notes,
            unknown_device,
            decode_errors,
            links,
            registry: Arc::new(registry),
        })
    }

    pub fn record_message(&self, kind: &str) {
        self.messages.with_label_values(&[kind]).inc();
    }

    pub fn record_note(&self, note: &str) {
        self.notes.with_label_values(&[note]).inc();
    }

    pub fn record_unknown_device(&self, context: &str) {
        self.unknown_device.with_label_values(&[context]).inc();
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.inc();
    }

    pub fn link_added(&self) {
        self.links.inc();
    }

    pub fn link_removed(&self) {
        self.links.dec();
    }

    /// Current value of the links gauge
    pub fn link_count(&self) -> i64 {
        self.links.get()
    }

    /// Unknown-device count for one context label
    pub fn unknown_device_count(&self, context: &str) -> u64 {
        self.unknown_device.with_label_values(&[context]).get()
    }

    /// Gather metrics in Prometheus text format
    pub fn gather_metrics(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buf = vec![];
        encoder.encode(&self.registry.gather(), &mut buf).ok();
        String::from_utf8(buf).unwrap_or_else(|_| String::from("# Error encoding metrics\n"))
    }
}

impl fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsCollector").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        assert!(MetricsCollector::new().is_ok());
    }

    #[test]
    fn test_record_message() {
        let collector = MetricsCollector::new().unwrap();
        collector.record_message("ifinfo");
        let metrics = collector.gather_metrics();
        assert!(metrics.contains("xeth_messages_total{kind=\"ifinfo\"} 1"));
    }

    #[test]
    fn test_record_unknown_device() {
        let collector = MetricsCollector::new().unwrap();
        collector.record_unknown_device("admin-up");
        collector.record_unknown_device("admin-up");
        assert_eq!(collector.unknown_device_count("admin-up"), 2);
        assert_eq!(collector.unknown_device_count("admin-down"), 0);
    }

    #[test]
    fn test_links_gauge() {
        let collector = MetricsCollector::new().unwrap();
        collector.link_added();
        collector.link_added();
        collector.link_removed();
        assert_eq!(collector.link_count(), 1);
        assert!(collector.gather_metrics().contains("xeth_links 1"));
    }

    #[test]
    fn test_gather_metrics_format() {
        let collector = MetricsCollector::new().unwrap();
        collector.record_decode_error();
        let metrics = collector.gather_metrics();
        assert!(metrics.contains("# HELP"));
        assert!(metrics.contains("# TYPE"));
        assert!(metrics.contains("xeth_decode_errors_total 1"));
    }
}
