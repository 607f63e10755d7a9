//! iperf bridge - Daemon
//!
//! Supervises a long-running iperf instance, extracts throughput
//! measurements from its streaming output, and pushes them to a statsd
//! collector over UDP.

#![forbid(unsafe_code)]

mod collector;
mod forwarder;
mod parse;
mod runner;

use anyhow::{Context, Result};
use clap::Parser;
use ipb_common::metric::{self, MetricEvent};
use ipb_common::{Config, LogConfig, StatsdClient, init_logging};
use tokio::sync::mpsc;
use tracing::info;

#[derive(Parser)]
#[command(name = "ipbd")]
#[command(author, version, about = "iperf bridge daemon - benchmark supervision and statsd export")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Print the resolved benchmark command line and exit
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let mut log_config = LogConfig::from_env("info");
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    let _logging_guards = init_logging(&log_config)?;

    // Load configuration once; nothing reads the environment after this.
    let config = Config::from_env()?;
    let args = config.bench.to_args();

    if cli.dry_run {
        println!("{} {}", config.bench.binary.display(), args.join(" "));
        return Ok(());
    }

    info!(
        "Forwarding stats to {}:{} with prefix '{}'",
        config.collector.host, config.collector.port, config.collector.prefix
    );
    let client = StatsdClient::connect(
        &config.collector.host,
        config.collector.port,
        &config.collector.prefix,
    )
    .await
    .context("could not start statsd forwarder")?;

    let (sink, events) = mpsc::channel(1);
    tokio::spawn(forwarder::forward(client, events));

    supervise(&config, &args, &sink).await
}

/// Restart the benchmark process forever, with bookkeeping metrics
/// around each cycle.
///
/// The delay between cycles is constant: no backoff growth, no jitter.
/// Fatal errors from a cycle propagate immediately and end the daemon.
async fn supervise(
    config: &Config,
    args: &[String],
    sink: &mpsc::Sender<MetricEvent>,
) -> Result<()> {
    loop {
        emit(
            sink,
            MetricEvent::gauge(metric::STATUS, i64::from(runner::EXIT_ABNORMAL)),
        )
        .await?;
        emit(sink, MetricEvent::increment(metric::RUNNING, 1)).await?;

        let bench = runner::spawn_bench(&config.bench.binary, args)?;
        collector::collect(bench, sink).await?;

        emit(sink, MetricEvent::decrement(metric::RUNNING, 1)).await?;

        info!(
            "Going to re-start in {} seconds...",
            config.restart_delay.as_secs()
        );
        tokio::time::sleep(config.restart_delay).await;
    }
}

async fn emit(sink: &mpsc::Sender<MetricEvent>, event: MetricEvent) -> Result<()> {
    sink.send(event).await.context("metric sink closed")
}
