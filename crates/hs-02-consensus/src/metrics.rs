//! Prometheus counters for round outcomes, compiled in behind the
//! `metrics` feature. Without the feature every recorder is a no-op.

#[cfg(feature = "metrics")]
mod inner {
    use lazy_static::lazy_static;
    use prometheus::{register_int_counter, IntCounter};

    lazy_static! {
        pub static ref ROUNDS_STARTED: IntCounter = register_int_counter!(
            "hs_consensus_rounds_started_total",
            "Consensus rounds opened by this replica"
        )
        .unwrap();
        pub static ref ROUNDS_COMMITTED: IntCounter = register_int_counter!(
            "hs_consensus_rounds_committed_total",
            "Consensus rounds that reached commitment"
        )
        .unwrap();
        pub static ref ROUNDS_FAILED: IntCounter = register_int_counter!(
            "hs_consensus_rounds_failed_total",
            "Consensus rounds that failed terminally"
        )
        .unwrap();
        pub static ref VIEW_CHANGES: IntCounter = register_int_counter!(
            "hs_consensus_view_changes_total",
            "View changes completed across all rounds"
        )
        .unwrap();
    }
}

pub fn record_round_started() {
    #[cfg(feature = "metrics")]
    inner::ROUNDS_STARTED.inc();
}

pub fn record_round_committed() {
    #[cfg(feature = "metrics")]
    inner::ROUNDS_COMMITTED.inc();
}

pub fn record_round_failed() {
    #[cfg(feature = "metrics")]
    inner::ROUNDS_FAILED.inc();
}

pub fn record_view_change() {
    #[cfg(feature = "metrics")]
    inner::VIEW_CHANGES.inc();
}
