//! Metric event types shared by the collector and the forwarder.

/// Cumulative bytes transferred, accumulated from interval reports.
pub const BYTES: &str = "bytes";

/// Instantaneous transfer rate from the latest interval report.
pub const BITRATE: &str = "bitrate";

/// Exit status of the supervised process (-1 = unknown/abnormal).
pub const STATUS: &str = "status";

/// Number of benchmark processes currently running (0 or 1).
pub const RUNNING: &str = "running";

/// How repeated events with the same name combine within one flush window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Last-write-wins instantaneous value.
    Gauge,
    /// Positive delta added to a running counter.
    Increment,
    /// Positive delta subtracted from a running counter.
    Decrement,
}

/// One measurement flowing from the collector to the forwarder.
///
/// Events are immutable after creation and consumed exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricEvent {
    /// Metric name, without the collector prefix.
    pub name: &'static str,
    /// Signed magnitude.
    pub value: i64,
    /// Aggregation semantics.
    pub kind: MetricKind,
}

impl MetricEvent {
    /// A last-write-wins value.
    pub fn gauge(name: &'static str, value: i64) -> Self {
        Self {
            name,
            value,
            kind: MetricKind::Gauge,
        }
    }

    /// A positive counter delta.
    pub fn increment(name: &'static str, value: i64) -> Self {
        Self {
            name,
            value,
            kind: MetricKind::Increment,
        }
    }

    /// A negative counter delta.
    pub fn decrement(name: &'static str, value: i64) -> Self {
        Self {
            name,
            value,
            kind: MetricKind::Decrement,
        }
    }
}
