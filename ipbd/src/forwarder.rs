//! Aggregation and push of metric events to the collector.

use ipb_common::metric::{MetricEvent, MetricKind};
use ipb_common::statsd::{AggregateBuffer, StatsdClient};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

/// How long events accumulate before a flush.
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(2);

/// Run the forwarding loop until the event channel closes.
///
/// Never returns during normal operation: the supervision loop holds the
/// sending half for the lifetime of the process.
pub async fn forward(client: StatsdClient, events: mpsc::Receiver<MetricEvent>) {
    forward_every(client, events, FLUSH_INTERVAL).await;
}

pub(crate) async fn forward_every(
    client: StatsdClient,
    mut events: mpsc::Receiver<MetricEvent>,
    window: Duration,
) {
    let mut buffer = AggregateBuffer::new();
    // The first tick of a plain interval fires immediately; the first
    // window should be a full one.
    let mut ticker = time::interval_at(time::Instant::now() + window, window);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    match event.kind {
                        MetricKind::Gauge => {
                            debug!("metric {}{} = {}", client.prefix(), event.name, event.value)
                        }
                        MetricKind::Increment => {
                            debug!("metric {}{} += {}", client.prefix(), event.name, event.value)
                        }
                        MetricKind::Decrement => {
                            debug!("metric {}{} -= {}", client.prefix(), event.name, event.value)
                        }
                    }
                    buffer.record(event);
                }
                None => break,
            },
            _ = ticker.tick() => client.flush(&mut buffer).await,
        }
    }

    // The sender side is gone; push whatever is still buffered.
    client.flush(&mut buffer).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipb_common::metric::{BITRATE, RUNNING, STATUS};
    use tokio::net::UdpSocket;

    async fn loopback_pair(prefix: &str) -> (UdpSocket, StatsdClient) {
        let listener = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let client = StatsdClient::connect("127.0.0.1", port, prefix).await.unwrap();
        (listener, client)
    }

    async fn recv_payload(listener: &UdpSocket) -> String {
        let mut buf = [0u8; 2048];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), listener.recv_from(&mut buf))
            .await
            .expect("datagram should arrive")
            .unwrap();
        String::from_utf8(buf[..len].to_vec()).unwrap()
    }

    #[tokio::test]
    async fn window_aggregates_before_flushing() {
        let (listener, client) = loopback_pair("t.").await;
        let (sink, events) = mpsc::channel(1);

        tokio::spawn(forward_every(client, events, Duration::from_millis(250)));

        for _ in 0..3 {
            sink.send(MetricEvent::increment(RUNNING, 1)).await.unwrap();
        }
        sink.send(MetricEvent::decrement(RUNNING, 1)).await.unwrap();
        sink.send(MetricEvent::gauge(BITRATE, 100)).await.unwrap();
        sink.send(MetricEvent::gauge(BITRATE, 250)).await.unwrap();

        let payload = recv_payload(&listener).await;
        assert!(payload.contains("t.running:2|c"), "payload: {payload}");
        assert!(payload.contains("t.bitrate:250|g"), "payload: {payload}");
        assert!(!payload.contains("t.bitrate:100|g"), "payload: {payload}");
    }

    #[tokio::test]
    async fn closing_the_channel_flushes_remaining_events() {
        let (listener, client) = loopback_pair("t.").await;
        let (sink, events) = mpsc::channel(1);

        // A window far longer than the test: only the final flush can
        // deliver the event.
        let task = tokio::spawn(forward_every(client, events, Duration::from_secs(3600)));

        sink.send(MetricEvent::gauge(STATUS, 0)).await.unwrap();
        drop(sink);

        task.await.unwrap();
        let payload = recv_payload(&listener).await;
        assert_eq!(payload, "t.status:0|g");
    }
}
