//! iperf bridge - Common Library
//!
//! Shared configuration, logging, metric types, and the statsd wire
//! client used by the ipbd daemon.

#![forbid(unsafe_code)]

pub mod config;
pub mod logging;
pub mod metric;
pub mod statsd;
pub mod units;

pub use config::{BenchConfig, CollectorConfig, Config, ConfigError, EnvError, EnvParser, Side};
pub use logging::{LogConfig, LogFormat, LoggingGuards, init_logging};
pub use metric::{MetricEvent, MetricKind};
pub use statsd::{AggregateBuffer, StatsdClient};
pub use units::{BASE_BITS, BASE_BYTES, UnitError, scaled_value};
