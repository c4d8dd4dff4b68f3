//! Prometheus counters for coordination outcomes, compiled in behind the
//! `metrics` feature. Without the feature every recorder is a no-op.

#[cfg(feature = "metrics")]
mod inner {
    use lazy_static::lazy_static;
    use prometheus::{register_int_counter, IntCounter};

    lazy_static! {
        pub static ref ELECTIONS_WON: IntCounter = register_int_counter!(
            "hs_queen_elections_won_total",
            "Elections this queen has won"
        )
        .unwrap();
        pub static ref DIRECTIVES_DISPATCHED: IntCounter = register_int_counter!(
            "hs_queen_directives_dispatched_total",
            "Directives delivered to workers"
        )
        .unwrap();
        pub static ref DIRECTIVES_COMPLETED: IntCounter = register_int_counter!(
            "hs_queen_directives_completed_total",
            "Directives reported successful"
        )
        .unwrap();
        pub static ref DIRECTIVES_FAILED: IntCounter = register_int_counter!(
            "hs_queen_directives_failed_total",
            "Directives reported failed"
        )
        .unwrap();
        pub static ref PROPOSALS_DECIDED: IntCounter = register_int_counter!(
            "hs_queen_proposals_decided_total",
            "Proposals that reached a terminal outcome"
        )
        .unwrap();
    }
}

pub fn record_election_won() {
    #[cfg(feature = "metrics")]
    inner::ELECTIONS_WON.inc();
}

pub fn record_directive_dispatched() {
    #[cfg(feature = "metrics")]
    inner::DIRECTIVES_DISPATCHED.inc();
}

pub fn record_directive_completed() {
    #[cfg(feature = "metrics")]
    inner::DIRECTIVES_COMPLETED.inc();
}

pub fn record_directive_failed() {
    #[cfg(feature = "metrics")]
    inner::DIRECTIVES_FAILED.inc();
}

pub fn record_proposal_decided() {
    #[cfg(feature = "metrics")]
    inner::PROPOSALS_DECIDED.inc();
}
