//! Tests for telemetry setup

use job_streamer_agent::util::{init_tracing, DEFAULT_LOG_FILTER};

#[test]
fn test_init_tracing_can_be_called_repeatedly() {
    init_tracing();
    init_tracing();
    tracing::info!(component = "unit", "tracing initialized");
}

#[test]
fn test_default_filter_targets_crate() {
    assert!(DEFAULT_LOG_FILTER.starts_with("job_streamer_agent"));
}
