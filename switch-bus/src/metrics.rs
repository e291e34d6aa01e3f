//! Prometheus metrics for the bus gateway

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};

lazy_static! {
    /// Total envelopes produced
    pub static ref BUS_PRODUCE_TOTAL: CounterVec = register_counter_vec!(
        "switch_bus_produce_total",
        "Total envelopes produced",
        &["topic", "status"]
    )
    .unwrap();

    /// Produce duration
    pub static ref BUS_PRODUCE_DURATION: HistogramVec = register_histogram_vec!(
        "switch_bus_produce_duration_seconds",
        "Envelope produce duration in seconds",
        &["topic"]
    )
    .unwrap();

    /// Total envelopes received
    pub static ref BUS_CONSUME_TOTAL: CounterVec = register_counter_vec!(
        "switch_bus_consume_total",
        "Total envelopes received",
        &["topic", "status"]
    )
    .unwrap();

    /// Handler processing duration
    pub static ref BUS_PROCESS_DURATION: HistogramVec = register_histogram_vec!(
        "switch_bus_process_duration_seconds",
        "Envelope handler duration in seconds",
        &["topic"]
    )
    .unwrap();

    /// Offset commits (explicit acks)
    pub static ref BUS_COMMIT_TOTAL: CounterVec = register_counter_vec!(
        "switch_bus_commit_total",
        "Offset commits",
        &["topic", "status"]
    )
    .unwrap();
}
