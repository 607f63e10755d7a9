//! Minimal statsd push client and flush-window aggregation.
//!
//! Covers the slice of the statsd wire protocol the forwarder needs:
//! gauge sets and counter increments/decrements, batched into
//! newline-separated UDP datagrams.

use crate::metric::{MetricEvent, MetricKind};
use std::collections::HashMap;
use std::io;
use tokio::net::UdpSocket;
use tracing::warn;

/// Aggregated state for one metric name within a flush window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// Last-write-wins value.
    Gauge(i64),
    /// Accumulated counter delta.
    Count(i64),
}

/// Combines events per metric name between flushes.
///
/// Gauges overwrite, increments and decrements accumulate. An event of
/// the other family restarts the slot.
#[derive(Debug, Default)]
pub struct AggregateBuffer {
    slots: HashMap<&'static str, Slot>,
}

impl AggregateBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Fold one event into its slot.
    pub fn record(&mut self, event: MetricEvent) {
        match event.kind {
            MetricKind::Gauge => {
                self.slots.insert(event.name, Slot::Gauge(event.value));
            }
            MetricKind::Increment => self.add(event.name, event.value),
            MetricKind::Decrement => self.add(event.name, -event.value),
        }
    }

    fn add(&mut self, name: &'static str, delta: i64) {
        let slot = self.slots.entry(name).or_insert(Slot::Count(0));
        *slot = match *slot {
            Slot::Count(total) => Slot::Count(total.saturating_add(delta)),
            Slot::Gauge(_) => Slot::Count(delta),
        };
    }

    /// Encode all slots as prefixed wire lines and clear the buffer.
    ///
    /// A negative gauge is preceded by a zero reset line: a signed gauge
    /// value is a delta in the statsd protocol, so `-1` alone would
    /// decrement the previous value instead of setting it.
    pub fn encode(&mut self, prefix: &str) -> String {
        let mut slots: Vec<_> = self.slots.drain().collect();
        // Stable line order across flushes.
        slots.sort_by_key(|(name, _)| *name);

        let mut lines = Vec::with_capacity(slots.len());
        for (name, slot) in slots {
            match slot {
                Slot::Gauge(value) => {
                    if value < 0 {
                        lines.push(format!("{prefix}{name}:0|g"));
                    }
                    lines.push(format!("{prefix}{name}:{value}|g"));
                }
                Slot::Count(value) => lines.push(format!("{prefix}{name}:{value}|c")),
            }
        }
        lines.join("\n")
    }
}

/// Push client over a connected UDP socket.
pub struct StatsdClient {
    socket: UdpSocket,
    prefix: String,
}

impl StatsdClient {
    /// Bind an ephemeral local socket and connect it to the collector.
    ///
    /// Name resolution happens here, so an unresolvable collector host
    /// fails the daemon at startup instead of on the first flush.
    pub async fn connect(host: &str, port: u16, prefix: &str) -> io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect((host, port)).await?;
        Ok(Self {
            socket,
            prefix: prefix.to_string(),
        })
    }

    /// Metric name prefix applied to every transmitted line.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Encode, send, and clear the buffer as one datagram.
    ///
    /// UDP send failures are logged and dropped; delivery is best-effort
    /// once the socket exists.
    pub async fn flush(&self, buffer: &mut AggregateBuffer) {
        if buffer.is_empty() {
            return;
        }
        let payload = buffer.encode(&self.prefix);
        if let Err(err) = self.socket.send(payload.as_bytes()).await {
            warn!("Dropped metrics datagram: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::{BITRATE, RUNNING, STATUS};
    use std::time::Duration;

    // -------------------------------------------------------------------------
    // AggregateBuffer semantics
    // -------------------------------------------------------------------------

    #[test]
    fn counters_accumulate_within_a_window() {
        let mut buffer = AggregateBuffer::new();
        for _ in 0..3 {
            buffer.record(MetricEvent::increment(RUNNING, 1));
        }
        buffer.record(MetricEvent::decrement(RUNNING, 1));

        assert_eq!(buffer.encode("t."), "t.running:2|c");
    }

    #[test]
    fn gauges_keep_only_the_last_value() {
        let mut buffer = AggregateBuffer::new();
        buffer.record(MetricEvent::gauge(BITRATE, 100));
        buffer.record(MetricEvent::gauge(BITRATE, 250));
        buffer.record(MetricEvent::gauge(BITRATE, 175));

        assert_eq!(buffer.encode("t."), "t.bitrate:175|g");
    }

    #[test]
    fn negative_gauge_emits_zero_reset_line() {
        let mut buffer = AggregateBuffer::new();
        buffer.record(MetricEvent::gauge(STATUS, -1));

        assert_eq!(buffer.encode("t."), "t.status:0|g\nt.status:-1|g");
    }

    #[test]
    fn counter_after_gauge_restarts_the_slot() {
        let mut buffer = AggregateBuffer::new();
        buffer.record(MetricEvent::gauge(RUNNING, 5));
        buffer.record(MetricEvent::increment(RUNNING, 1));

        assert_eq!(buffer.encode(""), "running:1|c");
    }

    #[test]
    fn encode_clears_the_buffer() {
        let mut buffer = AggregateBuffer::new();
        buffer.record(MetricEvent::increment(RUNNING, 1));

        assert!(!buffer.is_empty());
        let _ = buffer.encode("t.");
        assert!(buffer.is_empty());
        assert_eq!(buffer.encode("t."), "");
    }

    #[test]
    fn lines_are_sorted_by_metric_name() {
        let mut buffer = AggregateBuffer::new();
        buffer.record(MetricEvent::gauge(STATUS, 0));
        buffer.record(MetricEvent::gauge(BITRATE, 10));

        assert_eq!(buffer.encode(""), "bitrate:10|g\nstatus:0|g");
    }

    // -------------------------------------------------------------------------
    // StatsdClient over loopback UDP
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn flush_sends_one_prefixed_datagram() {
        let listener = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let client = StatsdClient::connect("127.0.0.1", port, "perf.server.")
            .await
            .unwrap();

        let mut buffer = AggregateBuffer::new();
        buffer.record(MetricEvent::increment(RUNNING, 1));
        buffer.record(MetricEvent::gauge(STATUS, 0));
        client.flush(&mut buffer).await;

        let mut buf = [0u8; 1024];
        let (len, _) = tokio::time::timeout(Duration::from_secs(1), listener.recv_from(&mut buf))
            .await
            .expect("datagram should arrive")
            .unwrap();
        let payload = std::str::from_utf8(&buf[..len]).unwrap();

        assert_eq!(payload, "perf.server.running:1|c\nperf.server.status:0|g");
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn flush_of_empty_buffer_sends_nothing() {
        let listener = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let client = StatsdClient::connect("127.0.0.1", port, "t.").await.unwrap();
        client.flush(&mut AggregateBuffer::new()).await;

        let mut buf = [0u8; 64];
        let outcome =
            tokio::time::timeout(Duration::from_millis(100), listener.recv_from(&mut buf)).await;
        assert!(outcome.is_err(), "no datagram expected for an empty buffer");
    }
}
