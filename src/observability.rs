use std::net::SocketAddr;

use crate::booking::Transition;

// ── Booking lifecycle ───────────────────────────────────────────

/// Counter: booking transitions attempted. Labels: transition, outcome.
pub const BOOKING_TRANSITIONS_TOTAL: &str = "lessonbook_booking_transitions_total";

/// Counter: requests refused because the instructor was already booked.
pub const BOOKING_CONFLICTS_TOTAL: &str = "lessonbook_booking_conflicts_total";

/// Histogram: time spent waiting for a per-instructor lock, in seconds.
pub const INSTRUCTOR_LOCK_WAIT_SECONDS: &str = "lessonbook_instructor_lock_wait_seconds";

// ── Side channels ───────────────────────────────────────────────

/// Counter: audit entries the sink refused. They are logged and dropped.
pub const AUDIT_FAILURES_TOTAL: &str = "lessonbook_audit_failures_total";

/// Counter: notifications emitted. Labels: event.
pub const NOTIFICATIONS_TOTAL: &str = "lessonbook_notifications_total";

// ── Escalation ──────────────────────────────────────────────────

/// Counter: bookings escalated.
pub const ESCALATIONS_TOTAL: &str = "lessonbook_escalations_total";

/// Counter: escalation passes skipped because one was already running.
pub const ESCALATION_PASSES_SKIPPED_TOTAL: &str = "lessonbook_escalation_passes_skipped_total";

/// Histogram: escalation pass duration in seconds.
pub const ESCALATION_PASS_DURATION_SECONDS: &str = "lessonbook_escalation_pass_duration_seconds";

// ── Storage ─────────────────────────────────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "lessonbook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "lessonbook_wal_flush_batch_size";

/// Install the Prometheus exporter on `port`. No-op if `port` is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Short label for a transition, used on metrics and log lines.
pub fn transition_label(transition: Transition) -> &'static str {
    match transition {
        Transition::Create => "create",
        Transition::Approve => "approve",
        Transition::Complete => "complete",
        Transition::Cancel => "cancel",
        Transition::Escalate => "escalate",
    }
}

pub fn record_transition(transition: Transition, outcome: &'static str) {
    metrics::counter!(
        BOOKING_TRANSITIONS_TOTAL,
        "transition" => transition_label(transition),
        "outcome" => outcome
    )
    .increment(1);
}
