//! MetricsSampler: byte throughput from counter samples, block time and TPS
//! from block pairs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::api::NodeApi;
use crate::error::{bounded, WatchError};

/// Cumulative bytes sent counter in the node's exposition.
pub const SENT_BYTES_COUNTER: &str = "algod_network_sent_bytes_total";
/// Cumulative bytes received counter in the node's exposition.
pub const RECEIVED_BYTES_COUNTER: &str = "algod_network_received_bytes_total";

const DEFAULT_WINDOW: u64 = 100;

/// Rate-based runtime statistics.
///
/// Carries the previous sample as a baseline; on a failed fetch the numeric
/// fields keep their last-known values and only `enabled` flips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub enabled: bool,
    /// Rounds over which block time and TPS are averaged.
    pub window: u64,
    /// Average block interval over the window. Zero until first sampled.
    pub round_time: Duration,
    pub tps: f64,
    pub rx_bytes_per_sec: u64,
    pub tx_bytes_per_sec: u64,
    pub last_sample_time: Option<DateTime<Utc>>,
    pub last_rx_counter: u64,
    pub last_tx_counter: u64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

/// Averages derived from two blocks `window` rounds apart.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BlockMetrics {
    pub avg_block_time: Duration,
    pub tps: f64,
}

/// Parse the node's plaintext counter exposition.
///
/// The text must be non-empty and start with `#`. Comment and blank lines are
/// skipped; every other line must be `key SP integer`.
pub fn parse_exposition(text: &str) -> Result<HashMap<String, u64>, WatchError> {
    if !text.starts_with('#') {
        return Err(WatchError::InvalidMetricsFormat);
    }

    let mut counters = HashMap::new();
    for line in text.lines() {
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            return Err(WatchError::InvalidMetricsFormat);
        };
        let parsed = value
            .parse::<u64>()
            .map_err(|_| WatchError::InvalidCounterValue {
                key: key.to_string(),
                value: value.to_string(),
            })?;
        counters.insert(key.to_string(), parsed);
    }
    Ok(counters)
}

/// Bytes per second between two cumulative counter readings, clamped at zero.
fn rate(previous: u64, current: u64, elapsed_secs: f64) -> u64 {
    if elapsed_secs <= 0.0 || current <= previous {
        return 0;
    }
    ((current - previous) as f64 / elapsed_secs) as u64
}

impl Metrics {
    /// A disabled, zeroed sampler. A zero window falls back to 100.
    pub fn new(window: u64) -> Self {
        Self {
            enabled: false,
            window: if window == 0 { DEFAULT_WINDOW } else { window },
            round_time: Duration::ZERO,
            tps: 0.0,
            rx_bytes_per_sec: 0,
            tx_bytes_per_sec: 0,
            last_sample_time: None,
            last_rx_counter: 0,
            last_tx_counter: 0,
        }
    }

    /// Record a counter sample and update the byte rates.
    ///
    /// Counter resets (node restart) yield a zero rate, never a negative one.
    /// The first sample has no baseline and yields zero rates.
    pub fn sample(&mut self, now: DateTime<Utc>, sent: u64, received: u64) {
        let elapsed_secs = self
            .last_sample_time
            .map(|last| (now - last).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0);

        self.tx_bytes_per_sec = rate(self.last_tx_counter, sent, elapsed_secs);
        self.rx_bytes_per_sec = rate(self.last_rx_counter, received, elapsed_secs);

        self.last_sample_time = Some(now);
        self.last_tx_counter = sent;
        self.last_rx_counter = received;
    }

    /// Fetch counters, update byte rates and, once enough history exists,
    /// block time and TPS.
    ///
    /// A counter fetch or parse failure disables metrics and returns the error.
    /// A block sampling failure propagates but leaves `enabled` untouched.
    pub async fn refresh<C: NodeApi>(
        &mut self,
        client: &C,
        current_round: u64,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> Result<(), WatchError> {
        let text = match bounded("get metrics", timeout, client.get_metrics_text()).await {
            Ok(text) => text,
            Err(e) => {
                self.enabled = false;
                return Err(e);
            }
        };
        let counters = match parse_exposition(&text) {
            Ok(counters) => counters,
            Err(e) => {
                self.enabled = false;
                return Err(e);
            }
        };

        self.enabled = true;
        let sent = counters.get(SENT_BYTES_COUNTER).copied().unwrap_or(0);
        let received = counters.get(RECEIVED_BYTES_COUNTER).copied().unwrap_or(0);
        self.sample(now, sent, received);

        if current_round > self.window {
            let blocks = sample_blocks(client, current_round, self.window, timeout).await?;
            self.tps = blocks.tps;
            self.round_time = blocks.avg_block_time;
        }
        Ok(())
    }
}

/// Average block interval and TPS between `current_round` and `current_round - window`.
///
/// Requires `current_round > window`. The current block is fetched first and
/// its error wins. Missing timestamps yield a zero result, not an error.
pub async fn sample_blocks<C: NodeApi>(
    client: &C,
    current_round: u64,
    window: u64,
    timeout: Duration,
) -> Result<BlockMetrics, WatchError> {
    let mut averages = BlockMetrics::default();
    if window == 0 || current_round <= window {
        return Ok(averages);
    }

    let current = bounded("get block", timeout, client.get_block(current_round)).await?;
    let previous = bounded("get block", timeout, client.get_block(current_round - window)).await?;

    let (Some(ts_current), Some(ts_previous)) = (current.timestamp, previous.timestamp) else {
        return Ok(averages);
    };

    let span_nanos = (ts_current - ts_previous).max(0) as u128 * 1_000_000_000;
    let avg_nanos = span_nanos / window as u128;
    averages.avg_block_time = Duration::from_nanos(u64::try_from(avg_nanos).unwrap_or(u64::MAX));

    if let (Some(tc_current), Some(tc_previous)) = (current.txn_counter, previous.txn_counter) {
        let avg_secs = averages.avg_block_time.as_secs_f64();
        if avg_secs > 0.0 {
            let txns = tc_current.saturating_sub(tc_previous) as f64;
            averages.tps = txns / (window as f64 * avg_secs);
        }
    }

    Ok(averages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const EXPOSITION: &str = "# HELP algod_telemetry_drops_total telemetry messages dropped due to full queues
# TYPE algod_telemetry_drops_total counter
algod_telemetry_drops_total 0
# HELP algod_network_sent_bytes_total bytes sent
# TYPE algod_network_sent_bytes_total counter
algod_network_sent_bytes_total 2048
# HELP algod_network_received_bytes_total bytes received
# TYPE algod_network_received_bytes_total counter
algod_network_received_bytes_total 4096
";

    #[test]
    fn test_parse_minimal_exposition() {
        let counters = parse_exposition("# HELP x\n# TYPE x counter\nx 42\n").unwrap();
        assert_eq!(counters.len(), 1);
        assert_eq!(counters["x"], 42);
    }

    #[test]
    fn test_parse_node_exposition() {
        let counters = parse_exposition(EXPOSITION).unwrap();
        assert_eq!(counters["algod_telemetry_drops_total"], 0);
        assert_eq!(counters[SENT_BYTES_COUNTER], 2048);
        assert_eq!(counters[RECEIVED_BYTES_COUNTER], 4096);
    }

    #[test]
    fn test_parse_rejects_missing_comment_marker() {
        assert!(matches!(
            parse_exposition("INVALID"),
            Err(WatchError::InvalidMetricsFormat)
        ));
        assert!(matches!(
            parse_exposition(""),
            Err(WatchError::InvalidMetricsFormat)
        ));
    }

    #[test]
    fn test_parse_rejects_non_integer_value() {
        let text = "# HELP x\n# TYPE x counter\nx NAN";
        match parse_exposition(text) {
            Err(WatchError::InvalidCounterValue { key, value }) => {
                assert_eq!(key, "x");
                assert_eq!(value, "NAN");
            }
            other => panic!("expected counter error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_line_without_value() {
        assert!(matches!(
            parse_exposition("# TYPE x counter\nx\n"),
            Err(WatchError::InvalidMetricsFormat)
        ));
    }

    #[test]
    fn test_parse_duplicate_keys_overwrite() {
        let counters = parse_exposition("# dup\nx 1\nx 2\n").unwrap();
        assert_eq!(counters["x"], 2);
    }

    #[test]
    fn test_sample_computes_rates() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut metrics = Metrics::new(100);

        metrics.sample(t0, 1_000, 500);
        assert_eq!(metrics.tx_bytes_per_sec, 0);
        assert_eq!(metrics.rx_bytes_per_sec, 0);

        metrics.sample(t0 + chrono::Duration::seconds(10), 11_000, 2_500);
        assert_eq!(metrics.tx_bytes_per_sec, 1_000);
        assert_eq!(metrics.rx_bytes_per_sec, 200);
        assert_eq!(metrics.last_tx_counter, 11_000);
        assert_eq!(metrics.last_rx_counter, 2_500);
    }

    #[test]
    fn test_sample_counter_reset_is_not_negative() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut metrics = Metrics::new(100);
        metrics.sample(t0, 100, 100);
        metrics.sample(t0 + chrono::Duration::seconds(5), 0, 0);
        assert_eq!(metrics.tx_bytes_per_sec, 0);
        assert_eq!(metrics.rx_bytes_per_sec, 0);
        // The reset value becomes the new baseline.
        assert_eq!(metrics.last_tx_counter, 0);
    }

    #[test]
    fn test_new_defaults_window() {
        assert_eq!(Metrics::new(0).window, 100);
        assert_eq!(Metrics::new(1_000).window, 1_000);
        assert!(!Metrics::default().enabled);
    }
}
