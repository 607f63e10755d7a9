//! Event loop joining one process execution to the metric sink.

use anyhow::{Context, Result};
use ipb_common::metric::{self, MetricEvent};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::parse::IntervalParser;
use crate::runner::{self, RunningBench};

/// Consume one process execution to completion.
///
/// stdout lines are logged and parsed for measurements, stderr lines are
/// logged only. Every event parsed from one line reaches the sink before
/// the next line is taken. The terminal exit signal is forwarded as a
/// `status` gauge and ends the loop; a process that never exits keeps
/// the collector alive for as long as it runs.
pub async fn collect(mut bench: RunningBench, sink: &mpsc::Sender<MetricEvent>) -> Result<()> {
    let parser = IntervalParser::new();

    loop {
        tokio::select! {
            Some(line) = bench.stdout.recv() => {
                info!("{}", line);
                for event in parser.parse(&line)? {
                    sink.send(event).await.context("metric sink closed")?;
                }
            }
            Some(line) = bench.stderr.recv() => {
                warn!("{}", line);
            }
            code = &mut bench.exit => {
                let code = code.unwrap_or(runner::EXIT_ABNORMAL);
                sink.send(MetricEvent::gauge(metric::STATUS, i64::from(code)))
                    .await
                    .context("metric sink closed")?;
                return Ok(());
            }
        }
    }
}
