//! Daemon configuration loaded once from the environment.
//!
//! Everything is read in a single pass at startup into one immutable
//! [`Config`] that is passed by reference from `main`; nothing re-reads
//! the process environment afterwards.

mod env;

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub use self::env::{EnvError, EnvParser};

/// Default benchmark binary location.
const DEFAULT_BENCH_BIN: &str = "/usr/local/bin/iperf3";

/// Default benchmark port.
const DEFAULT_BENCH_PORT: u16 = 5201;

/// Default restart delay between supervision cycles, in seconds.
const DEFAULT_RESTART_SECONDS: u64 = 10;

/// Metric prefixes applied when IPB_STATSD_PREFIX is unset.
const DEFAULT_PREFIX_SERVER: &str = "perf.server.";
const DEFAULT_PREFIX_CLIENT: &str = "perf.client.";

/// Errors produced while assembling the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {}", format_env_errors(.0))]
    Env(Vec<EnvError>),
}

fn format_env_errors(errors: &[EnvError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Which side of the benchmark this instance runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Server,
    Client,
}

impl Side {
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "server" => Some(Self::Server),
            "client" => Some(Self::Client),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Client => "client",
        }
    }
}

/// Collector endpoint and metric naming.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// statsd host.
    pub host: String,
    /// statsd UDP port.
    pub port: u16,
    /// Prefix applied to every metric name.
    pub prefix: String,
}

/// Benchmark process settings.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Path to the benchmark binary.
    pub binary: PathBuf,
    /// Server or client side.
    pub side: Side,
    /// Bind host (server) or peer host (client).
    pub host: String,
    /// Benchmark port.
    pub port: u16,
    /// Parallel client streams.
    pub parallel: u32,
    /// Optional client bitrate cap, passed through verbatim.
    pub bitrate: Option<String>,
    /// Use UDP instead of TCP on the client side.
    pub udp: bool,
    /// Extra arguments appended to the command line.
    pub extra_args: Vec<String>,
}

impl BenchConfig {
    /// Argument vector handed to the benchmark binary.
    ///
    /// `-f K` keeps interval reports in KBytes and `--forceflush` makes
    /// the tool emit every interval line immediately, which the parser
    /// depends on.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            "K".to_string(),
            "--forceflush".to_string(),
            "-p".to_string(),
            self.port.to_string(),
        ];

        match self.side {
            Side::Server => {
                args.push("-s".to_string());
                args.push(self.host.clone());
            }
            Side::Client => {
                args.push("-c".to_string());
                args.push(self.host.clone());
                args.push("-P".to_string());
                args.push(self.parallel.to_string());

                if let Some(bitrate) = &self.bitrate {
                    args.push("-b".to_string());
                    args.push(bitrate.clone());
                }
                if self.udp {
                    args.push("-u".to_string());
                }
            }
        }

        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// Full daemon configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub collector: CollectorConfig,
    pub bench: BenchConfig,
    /// Pause between supervision cycles. Constant, no backoff.
    pub restart_delay: Duration,
}

impl Config {
    /// Load from IPB_* environment variables.
    ///
    /// Collects every problem before failing so a misconfigured
    /// deployment is diagnosed in one round trip.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut parser = EnvParser::new();

        let statsd_host = parser.require_string("STATSD_HOST");
        let statsd_port = parser.require_u16("STATSD_PORT");
        let prefix_override = parser.get_string_opt("STATSD_PREFIX");

        let side = match parser.require_string("SIDE") {
            Some(value) => match Side::parse(&value) {
                Some(side) => Some(side),
                None => {
                    parser.invalid_value("SIDE", "'server' or 'client'", &value);
                    None
                }
            },
            None => None,
        };

        let bench_host = parser.get_string_opt("HOST");
        let bench_port = parser.get_u16("PORT", DEFAULT_BENCH_PORT);
        let parallel = parser.get_u32_range("PARALLEL", 1, 1, 128);
        let bitrate = parser.get_string_opt("BITRATE");
        let udp = parser.get_bool("UDP", false);
        let extra_args: Vec<String> = parser
            .get_string_opt("EXTRA_ARGS")
            .map(|raw| raw.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        let restart_seconds =
            parser.get_u64_range("RESTART_SECONDS", DEFAULT_RESTART_SECONDS, 1, 3600);
        let binary = PathBuf::from(parser.get_string("IPERF_BIN", DEFAULT_BENCH_BIN));

        // The server binds anywhere when no host is given; the client has
        // no sensible default peer. Prefix defaults track the side so the
        // two ends of one benchmark do not collide in the collector.
        let (host, prefix) = match side {
            Some(Side::Server) => (
                bench_host.unwrap_or_else(|| "0.0.0.0".to_string()),
                prefix_override.unwrap_or_else(|| DEFAULT_PREFIX_SERVER.to_string()),
            ),
            Some(Side::Client) => {
                let host = match bench_host {
                    Some(host) => host,
                    None => {
                        parser.missing("HOST");
                        String::new()
                    }
                };
                (
                    host,
                    prefix_override.unwrap_or_else(|| DEFAULT_PREFIX_CLIENT.to_string()),
                )
            }
            None => (
                bench_host.unwrap_or_default(),
                prefix_override.unwrap_or_default(),
            ),
        };

        match (statsd_host, statsd_port, side) {
            (Some(statsd_host), Some(statsd_port), Some(side)) if !parser.has_errors() => {
                Ok(Self {
                    collector: CollectorConfig {
                        host: statsd_host,
                        port: statsd_port,
                        prefix,
                    },
                    bench: BenchConfig {
                        binary,
                        side,
                        host,
                        port: bench_port,
                        parallel,
                        bitrate,
                        udp,
                        extra_args,
                    },
                    restart_delay: Duration::from_secs(restart_seconds),
                })
            }
            _ => Err(ConfigError::Env(parser.take_errors())),
        }
    }
}
