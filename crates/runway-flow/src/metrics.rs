//! Observability metrics for run orchestration.
//!
//! Prometheus-compatible counters exposed via the `metrics` crate facade.
//!
//! ## Metrics Exported
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `runway_events_ingested_total` | Counter | `level` | Events accepted into the log |
//! | `runway_status_transitions_total` | Counter | `from`, `to` | Run status transitions applied |
//! | `runway_delegations_total` | Counter | `outcome` | Delegation attempts by outcome |
//! | `runway_feed_messages_total` | Counter | `kind` | Feed messages relayed to subscribers |
//!
//! ## Integration
//!
//! To export to Prometheus, install a recorder at startup:
//!
//! ```rust,ignore
//! use metrics_exporter_prometheus::PrometheusBuilder;
//!
//! PrometheusBuilder::new()
//!     .with_http_listener(([0, 0, 0, 0], 9090))
//!     .install()
//!     .expect("failed to install Prometheus recorder");
//! ```

use metrics::counter;

use crate::run::RunStatus;

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: Events accepted into the log.
    pub const EVENTS_INGESTED_TOTAL: &str = "runway_events_ingested_total";
    /// Counter: Run status transitions applied.
    pub const STATUS_TRANSITIONS_TOTAL: &str = "runway_status_transitions_total";
    /// Counter: Delegation attempts by outcome.
    pub const DELEGATIONS_TOTAL: &str = "runway_delegations_total";
    /// Counter: Feed messages relayed to subscribers.
    pub const FEED_MESSAGES_TOTAL: &str = "runway_feed_messages_total";
}

/// Label keys used across metrics.
pub mod labels {
    /// Event severity level.
    pub const LEVEL: &str = "level";
    /// Previous run status (for transitions).
    pub const FROM: &str = "from";
    /// Target run status (for transitions).
    pub const TO: &str = "to";
    /// Delegation outcome (accepted, failed).
    pub const OUTCOME: &str = "outcome";
    /// Feed message kind (snapshot, event, heartbeat).
    pub const KIND: &str = "kind";
}

/// Records an accepted event append.
pub fn record_event_ingested(level: &crate::event::EventLevel) {
    counter!(
        names::EVENTS_INGESTED_TOTAL,
        labels::LEVEL => level.to_string(),
    )
    .increment(1);
}

/// Records an applied status transition.
pub fn record_status_transition(from: RunStatus, to: RunStatus) {
    counter!(
        names::STATUS_TRANSITIONS_TOTAL,
        labels::FROM => from.to_string(),
        labels::TO => to.to_string(),
    )
    .increment(1);
}

/// Records a delegation attempt outcome.
pub fn record_delegation(outcome: &str) {
    counter!(
        names::DELEGATIONS_TOTAL,
        labels::OUTCOME => outcome.to_string(),
    )
    .increment(1);
}

/// Records a feed message relayed to a subscriber.
pub fn record_feed_message(kind: &str) {
    counter!(
        names::FEED_MESSAGES_TOTAL,
        labels::KIND => kind.to_string(),
    )
    .increment(1);
}
