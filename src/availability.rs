//! Instructor availability windows. Purely informational: the conflict
//! detector never looks at them.

use std::sync::Arc;

use serde_json::json;
use tracing::info;
use ulid::Ulid;

use crate::audit::{AuditAction, AuditEntry, AuditSink};
use crate::booking::{validate_span, BookingError};
use crate::clock::Clock;
use crate::model::*;
use crate::observability;
use crate::store::AvailabilityRepository;
use crate::tenant::TenantId;

const RESOURCE: &str = "availability";

pub struct AvailabilityService {
    repo: Arc<dyn AvailabilityRepository>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
}

impl AvailabilityService {
    pub fn new(
        repo: Arc<dyn AvailabilityRepository>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { repo, audit, clock }
    }

    /// Declare a window owned by `actor`.
    pub async fn add(
        &self,
        actor: &Identity,
        start: Ms,
        end: Ms,
        recurring: bool,
    ) -> Result<AvailabilityWindow, BookingError> {
        if actor.role == Role::Student {
            return Err(BookingError::Forbidden);
        }
        let span = validate_span(start, end)?;
        let now = self.clock.now_ms();
        let window = self
            .repo
            .insert_window(AvailabilityWindow {
                id: Ulid::new(),
                tenant: actor.tenant.clone(),
                instructor_id: actor.user_id,
                span,
                recurring,
                created_at: now,
            })
            .await?;
        info!(tenant = %window.tenant, window = %window.id, "availability added");

        self.record(
            AuditEntry::new(window.tenant.clone(), AuditAction::AvailabilityCreated, RESOURCE, now)
                .actor(actor.user_id)
                .resource(window.id)
                .after(json!({ "start": span.start, "end": span.end, "recurring": recurring }))
                .correlation_id(actor.correlation_id.clone()),
        )
        .await;
        Ok(window)
    }

    /// Windows that have not ended yet, optionally for one instructor.
    pub async fn list(
        &self,
        tenant: &TenantId,
        instructor_id: Option<Ulid>,
    ) -> Result<Vec<AvailabilityWindow>, BookingError> {
        Ok(self
            .repo
            .list_windows(tenant, instructor_id, self.clock.now_ms())
            .await?)
    }

    /// Owners remove their own windows, admins any. Everyone else gets
    /// NotFound.
    pub async fn remove(&self, actor: &Identity, id: Ulid) -> Result<(), BookingError> {
        let window = self
            .repo
            .find_window(&actor.tenant, id)
            .await?
            .filter(|w| actor.role == Role::Admin || w.instructor_id == actor.user_id)
            .ok_or(BookingError::NotFound(id))?;
        self.repo.remove_window(&actor.tenant, id).await?;
        info!(tenant = %actor.tenant, window = %id, "availability removed");

        self.record(
            AuditEntry::new(
                actor.tenant.clone(),
                AuditAction::AvailabilityDeleted,
                RESOURCE,
                self.clock.now_ms(),
            )
            .actor(actor.user_id)
            .resource(id)
            .before(json!({
                "instructor_id": window.instructor_id,
                "start": window.span.start,
                "end": window.span.end,
            }))
            .correlation_id(actor.correlation_id.clone()),
        )
        .await;
        Ok(())
    }

    async fn record(&self, entry: AuditEntry) {
        let action = entry.action;
        if let Err(e) = self.audit.append(entry).await {
            metrics::counter!(observability::AUDIT_FAILURES_TOTAL).increment(1);
            tracing::error!("failed to write audit entry {action}: {e}");
        }
    }
}
