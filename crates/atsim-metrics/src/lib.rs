//! Metrics infrastructure for the AT modem emulator.
//!
//! This crate declares every metric the emulator emits as a structured
//! [`Metric`] constant and re-exports the `metrics` crate for convenience.
//!
//! # Example
//!
//! ```rust,ignore
//! use atsim_metrics::{metric_defs, describe_metrics};
//!
//! // Initialize metrics descriptions at startup
//! describe_metrics();
//!
//! metrics::counter!(metric_defs::COMMANDS.name, "modem" => "modem-0", "result" => "ok")
//!     .increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric (counter, gauge, or histogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
    /// A histogram for recording distributions.
    Histogram,
}

impl MetricKind {
    /// Returns the kind as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric declaration with its metadata.
///
/// ```rust
/// use atsim_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const LINES: Metric = Metric::counter("atsim.lines")
///     .with_description("Command lines received")
///     .with_unit(Unit::Count)
///     .with_labels(&["modem"]);
///
/// assert_eq!(LINES.name, "atsim.lines");
/// assert_eq!(LINES.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "atsim.commands").
    pub name: &'static str,
    /// The kind of metric (counter, gauge, histogram).
    pub kind: MetricKind,
    /// Human-readable description of the metric.
    pub description: &'static str,
    /// The unit of measurement (optional).
    pub unit: Option<Unit>,
    /// Expected label keys for this metric.
    pub labels: &'static [&'static str],
}

impl Metric {
    /// Creates a new counter metric with the given name.
    pub const fn counter(name: &'static str) -> Self {
        Self::with_kind(name, MetricKind::Counter)
    }

    /// Creates a new gauge metric with the given name.
    pub const fn gauge(name: &'static str) -> Self {
        Self::with_kind(name, MetricKind::Gauge)
    }

    /// Creates a new histogram metric with the given name.
    pub const fn histogram(name: &'static str) -> Self {
        Self::with_kind(name, MetricKind::Histogram)
    }

    const fn with_kind(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Sets the description for the metric.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit for the metric.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the expected label keys for the metric.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the metrics recorder.
    ///
    /// This should be called once at startup for each metric.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Gauge, Some(unit)) => {
                describe_gauge!(self.name, unit, self.description);
            }
            (MetricKind::Gauge, None) => {
                describe_gauge!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

/// All metric definitions for the emulator.
pub mod metric_defs {
    use super::{Metric, Unit};

    /// Labels present on all session-scoped metrics.
    pub const SESSION_LABELS: &[&str] = &["modem"];

    /// Command lines received.
    pub const LINES: Metric = Metric::counter("atsim.lines")
        .with_description("Command lines received")
        .with_unit(Unit::Count)
        .with_labels(SESSION_LABELS);

    /// Sub-commands dispatched, by terminal result.
    ///
    /// Labels: modem, result (`ok`, `error`, `extended`)
    pub const COMMANDS: Metric = Metric::counter("atsim.commands")
        .with_description("Sub-commands dispatched")
        .with_unit(Unit::Count)
        .with_labels(&["modem", "result"]);

    /// Messages submitted through two-phase input.
    pub const SMS_SENT: Metric = Metric::counter("atsim.sms.sent")
        .with_description("Messages submitted with +CMGS")
        .with_unit(Unit::Count)
        .with_labels(SESSION_LABELS);

    /// Size of submitted message bodies.
    pub const SMS_BODY_SIZE: Metric = Metric::histogram("atsim.sms.body_size_bytes")
        .with_description("Size of submitted message bodies")
        .with_unit(Unit::Bytes)
        .with_labels(SESSION_LABELS);

    /// Connected host sessions.
    pub const SESSIONS_ACTIVE: Metric = Metric::gauge("atsim.sessions.active")
        .with_description("Connected host sessions")
        .with_unit(Unit::Count);

    /// All metrics, for bulk description.
    pub const ALL: &[Metric] = &[LINES, COMMANDS, SMS_SENT, SMS_BODY_SIZE, SESSIONS_ACTIVE];
}

/// Describes all metrics used by the emulator.
///
/// Call once at startup, after the recorder is installed.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

/// Install a Prometheus exporter listening on `addr` as the global recorder.
#[cfg(feature = "prometheus")]
pub fn install_prometheus(
    addr: std::net::SocketAddr,
) -> Result<(), metrics_exporter_prometheus::BuildError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_definitions() {
        assert_eq!(metric_defs::COMMANDS.name, "atsim.commands");
        assert_eq!(metric_defs::COMMANDS.kind, MetricKind::Counter);
        assert_eq!(metric_defs::COMMANDS.labels, &["modem", "result"]);
        assert_eq!(metric_defs::SESSIONS_ACTIVE.kind, MetricKind::Gauge);
        assert_eq!(metric_defs::SMS_BODY_SIZE.unit, Some(Unit::Bytes));
    }

    #[test]
    fn test_all_metrics_count() {
        assert_eq!(metric_defs::ALL.len(), 5);
    }

    #[test]
    fn test_metric_minimal() {
        const MINIMAL: Metric = Metric::histogram("minimal");

        assert_eq!(MINIMAL.name, "minimal");
        assert_eq!(MINIMAL.kind, MetricKind::Histogram);
        assert_eq!(MINIMAL.description, "");
        assert_eq!(MINIMAL.unit, None);
        assert_eq!(MINIMAL.labels, &[] as &[&str]);
    }

    #[test]
    fn test_describe_without_recorder_is_noop() {
        describe_metrics();
    }
}
