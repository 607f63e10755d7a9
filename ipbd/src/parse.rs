//! Extraction of throughput measurements from benchmark output lines.

use ipb_common::metric::{self, MetricEvent};
use ipb_common::units::{BASE_BITS, BASE_BYTES, UnitError, scaled_value};
use regex::Regex;

/// Recognizes the per-interval transfer report, e.g.
/// `[  5]   0.00-1.00   sec   129 KBytes  1056 KBytes/sec`.
pub struct IntervalParser {
    pattern: Regex,
}

impl IntervalParser {
    pub fn new() -> Self {
        let pattern =
            Regex::new(r"(?i)(?:^|\s)([0-9.]+)\s+([kmgt])bytes\s+([0-9.]+)\s+([kmgt])bytes/sec")
                .expect("interval pattern must compile");
        Self { pattern }
    }

    /// Scan one stdout line for an interval report.
    ///
    /// Non-matching lines produce no events. A matching line with a
    /// malformed magnitude is an error: the output grammar has drifted
    /// and every subsequent measurement would be suspect.
    pub fn parse(&self, line: &str) -> Result<Vec<MetricEvent>, UnitError> {
        let Some(caps) = self.pattern.captures(line) else {
            return Ok(Vec::new());
        };

        // Bytes transferred use binary scaling, the rate uses decimal.
        let bytes = scaled_value(&caps[1], &caps[2], BASE_BYTES)?;
        let bitrate = scaled_value(&caps[3], &caps[4], BASE_BITS)?;

        Ok(vec![
            MetricEvent::increment(metric::BYTES, bytes),
            MetricEvent::gauge(metric::BITRATE, bitrate),
        ])
    }
}

impl Default for IntervalParser {
    fn default() -> Self {
        Self::new()
    }
}
