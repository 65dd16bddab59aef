//! Booking lifecycle: validation, conflict checks, status transitions and
//! their audit/notification side effects.
//!
//! ```text
//! REQUESTED ──approve──▶ APPROVED ──complete──▶ COMPLETED
//!     │   └─approve+instructor─▶ ASSIGNED ──complete──┘
//!     └──────────── cancel (from any active) ──────────▶ CANCELLED
//! ```
//!
//! Assigning an instructor (create with instructor, approve with one) holds a
//! per-(tenant, instructor) mutex across the conflict check and the write, so
//! two overlapping requests for the same instructor cannot both pass.

mod access;
mod conflict;
mod error;
mod queries;
mod transitions;
#[cfg(test)]
mod tests;

pub use access::{authorize, is_allowed, Action};
pub use conflict::has_conflict;
pub use error::BookingError;

pub(crate) use conflict::validate_span;

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use ulid::Ulid;

use crate::audit::{AuditEntry, AuditSink};
use crate::clock::Clock;
use crate::model::*;
use crate::notify::{Notification, NotificationKind, Notifier};
use crate::observability;
use crate::store::{Repository, StoreError};
use crate::tenant::TenantId;

/// Label for metrics and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Create,
    Approve,
    Complete,
    Cancel,
    Escalate,
}

pub struct BookingService {
    repo: Arc<dyn Repository>,
    audit: Arc<dyn AuditSink>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    instructor_locks: DashMap<(TenantId, Ulid), Arc<Mutex<()>>>,
}

impl BookingService {
    pub fn new(
        repo: Arc<dyn Repository>,
        audit: Arc<dyn AuditSink>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            audit,
            notifier,
            clock,
            instructor_locks: DashMap::new(),
        }
    }

    pub fn now(&self) -> Ms {
        self.clock.now_ms()
    }

    /// Serialize check-and-write for one instructor.
    async fn lock_instructor(&self, tenant: &TenantId, instructor_id: Ulid) -> OwnedMutexGuard<()> {
        let lock = self
            .instructor_locks
            .entry((tenant.clone(), instructor_id))
            .or_default()
            .clone();
        let started = Instant::now();
        let guard = lock.lock_owned().await;
        metrics::histogram!(observability::INSTRUCTOR_LOCK_WAIT_SECONDS)
            .record(started.elapsed().as_secs_f64());
        guard
    }

    async fn load(&self, tenant: &TenantId, id: Ulid) -> Result<Booking, BookingError> {
        self.repo
            .find_by_id(tenant, id)
            .await?
            .ok_or(BookingError::NotFound(id))
    }

    /// Map a failed conditional write to what the caller should see: the row
    /// moved on underneath us, so report its current status.
    async fn write_refused(
        &self,
        tenant: &TenantId,
        id: Ulid,
        action: &'static str,
        err: StoreError,
    ) -> BookingError {
        match err {
            StoreError::PreconditionFailed(_) => match self.load(tenant, id).await {
                Ok(current) => BookingError::InvalidState {
                    action,
                    status: current.status,
                },
                Err(e) => e,
            },
            other => other.into(),
        }
    }

    /// Best effort. A failing sink is logged and counted, never propagated.
    async fn record(&self, entry: AuditEntry) {
        let action = entry.action;
        if let Err(e) = self.audit.append(entry).await {
            metrics::counter!(observability::AUDIT_FAILURES_TOTAL).increment(1);
            tracing::error!("failed to write audit entry {action}: {e}");
        }
    }

    fn notify(&self, kind: NotificationKind, booking: &Booking) {
        self.notifier.emit(Notification::new(kind, booking.clone()));
    }

    fn observe<T>(transition: Transition, result: &Result<T, BookingError>) {
        let outcome = match result {
            Ok(_) => "ok",
            Err(e) => {
                if let BookingError::Conflict { .. } = e {
                    metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL).increment(1);
                }
                tracing::debug!(
                    "{} refused: {e}",
                    observability::transition_label(transition)
                );
                e.code()
            }
        };
        observability::record_transition(transition, outcome);
    }
}
