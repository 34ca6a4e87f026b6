//! Prometheus gauges mirroring the latest published snapshot.

use prometheus::{
    register_gauge, register_int_counter_vec, register_int_gauge, Encoder, Gauge, IntCounterVec,
    IntGauge, TextEncoder,
};
use std::sync::LazyLock;

use crate::state::StateModel;

pub static LAST_ROUND: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!("nodewatch_last_round", "Last round seen by the watcher").unwrap()
});

pub static TPS: LazyLock<Gauge> = LazyLock::new(|| {
    register_gauge!("nodewatch_tps", "Transactions per second over the sample window").unwrap()
});

pub static ROUND_TIME: LazyLock<Gauge> = LazyLock::new(|| {
    register_gauge!(
        "nodewatch_round_time_seconds",
        "Average block interval over the sample window"
    )
    .unwrap()
});

pub static RX_BYTES: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!("nodewatch_rx_bytes_per_second", "Network bytes received per second")
        .unwrap()
});

pub static TX_BYTES: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!("nodewatch_tx_bytes_per_second", "Network bytes sent per second").unwrap()
});

pub static METRICS_ENABLED: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!(
        "nodewatch_metrics_enabled",
        "1 when the node metrics endpoint answered on the last sample"
    )
    .unwrap()
});

pub static NON_RESIDENT_ACCOUNTS: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!(
        "nodewatch_non_resident_accounts",
        "Online accounts whose registered key is not held by this node"
    )
    .unwrap()
});

pub static TICK_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "nodewatch_tick_errors_total",
        "Errors encountered by the watch loop",
        &["stage"]
    )
    .unwrap()
});

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Copy the snapshot's figures into the gauges.
pub fn observe(state: &StateModel) {
    LAST_ROUND.set(saturating_i64(state.status.last_round));
    TPS.set(state.metrics.tps);
    ROUND_TIME.set(state.metrics.round_time.as_secs_f64());
    RX_BYTES.set(saturating_i64(state.metrics.rx_bytes_per_sec));
    TX_BYTES.set(saturating_i64(state.metrics.tx_bytes_per_sec));
    METRICS_ENABLED.set(i64::from(state.metrics.enabled));
    NON_RESIDENT_ACCOUNTS.set(saturating_i64(state.non_resident_count() as u64));
}

pub fn record_error(stage: &str) {
    TICK_ERRORS.with_label_values(&[stage]).inc();
}

/// Text exposition of every registered metric.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
