use serde_json::json;
use tracing::info;
use ulid::Ulid;

use crate::audit::{AuditAction, AuditEntry};
use crate::limits::*;
use crate::model::*;
use crate::notify::{Notification, NotificationKind};
use crate::store::{BookingPatch, Precondition};
use crate::tenant::TenantId;

use super::access::{authorize, Action};
use super::conflict::validate_times;
use super::{BookingError, BookingService, Transition};

const RESOURCE: &str = "booking";

fn validate_text(title: &str, notes: Option<&str>) -> Result<String, BookingError> {
    let title = title.trim();
    let len = title.chars().count();
    if !(MIN_TITLE_LEN..=MAX_TITLE_LEN).contains(&len) {
        return Err(BookingError::validation(format!(
            "title must be {MIN_TITLE_LEN} to {MAX_TITLE_LEN} characters"
        )));
    }
    if notes.is_some_and(|n| n.chars().count() > MAX_NOTES_LEN) {
        return Err(BookingError::validation(format!(
            "notes must be at most {MAX_NOTES_LEN} characters"
        )));
    }
    Ok(title.to_string())
}

impl BookingService {
    /// Request a booking on behalf of `actor`, who becomes its student.
    pub async fn create(&self, actor: &Identity, req: NewBooking) -> Result<Booking, BookingError> {
        let result = self.create_inner(actor, req).await;
        Self::observe(Transition::Create, &result);
        result
    }

    async fn create_inner(&self, actor: &Identity, req: NewBooking) -> Result<Booking, BookingError> {
        let now = self.now();
        let span = validate_times(req.start, req.end, now)?;
        let title = validate_text(&req.title, req.notes.as_deref())?;

        let booking = Booking {
            id: Ulid::new(),
            tenant: actor.tenant.clone(),
            title,
            span,
            status: BookingStatus::Requested,
            notes: req.notes,
            student_id: actor.user_id,
            instructor_id: req.instructor_id,
            created_at: now,
            escalated_at: None,
        };

        let created = match req.instructor_id {
            Some(instructor_id) => {
                let _held = self.lock_instructor(&actor.tenant, instructor_id).await;
                if self
                    .detect_conflict(&actor.tenant, instructor_id, span, None)
                    .await?
                {
                    return Err(BookingError::Conflict { instructor_id });
                }
                self.repo.insert(booking).await?
            }
            None => self.repo.insert(booking).await?,
        };
        info!(tenant = %created.tenant, booking = %created.id, "booking requested");

        self.record(
            AuditEntry::new(created.tenant.clone(), AuditAction::BookingCreated, RESOURCE, now)
                .actor(actor.user_id)
                .resource(created.id)
                .after(json!({
                    "status": created.status,
                    "start": created.span.start,
                    "end": created.span.end,
                    "instructor_id": created.instructor_id,
                }))
                .correlation_id(actor.correlation_id.clone()),
        )
        .await;
        self.notify(NotificationKind::BookingRequested, &created);
        Ok(created)
    }

    /// Admin approval. With an instructor (supplied or requested at creation)
    /// the booking becomes Assigned, otherwise Approved.
    pub async fn approve(
        &self,
        actor: &Identity,
        id: Ulid,
        instructor_id: Option<Ulid>,
    ) -> Result<Booking, BookingError> {
        let result = self.approve_inner(actor, id, instructor_id).await;
        Self::observe(Transition::Approve, &result);
        result
    }

    async fn approve_inner(
        &self,
        actor: &Identity,
        id: Ulid,
        instructor_id: Option<Ulid>,
    ) -> Result<Booking, BookingError> {
        let tenant = &actor.tenant;
        let booking = self.load(tenant, id).await?;
        authorize(Action::Approve, actor, &booking)?;
        if !booking.status.can_transition_to(BookingStatus::Approved) {
            return Err(BookingError::InvalidState {
                action: "approve",
                status: booking.status,
            });
        }

        let precondition = Precondition::status_in(&[BookingStatus::Requested]);
        let updated = match instructor_id.or(booking.instructor_id) {
            Some(instructor_id) => {
                let _held = self.lock_instructor(tenant, instructor_id).await;
                if self
                    .detect_conflict(tenant, instructor_id, booking.span, Some(id))
                    .await?
                {
                    return Err(BookingError::Conflict { instructor_id });
                }
                let patch = BookingPatch {
                    status: Some(BookingStatus::Assigned),
                    instructor_id: Some(instructor_id),
                    ..BookingPatch::default()
                };
                self.repo.update(tenant, id, patch, precondition).await
            }
            None => {
                self.repo
                    .update(tenant, id, BookingPatch::status(BookingStatus::Approved), precondition)
                    .await
            }
        };
        let updated = match updated {
            Ok(b) => b,
            Err(e) => return Err(self.write_refused(tenant, id, "approve", e).await),
        };
        info!(tenant = %tenant, booking = %id, status = %updated.status, "booking approved");

        self.record(
            AuditEntry::new(tenant.clone(), AuditAction::BookingApproved, RESOURCE, self.now())
                .actor(actor.user_id)
                .resource(id)
                .before(json!({ "status": booking.status, "instructor_id": booking.instructor_id }))
                .after(json!({ "status": updated.status, "instructor_id": updated.instructor_id }))
                .correlation_id(actor.correlation_id.clone()),
        )
        .await;
        self.notify(NotificationKind::BookingApproved, &updated);
        Ok(updated)
    }

    /// Mark an approved or assigned booking as held. No scheduling impact.
    pub async fn complete(&self, actor: &Identity, id: Ulid) -> Result<Booking, BookingError> {
        let result = self.complete_inner(actor, id).await;
        Self::observe(Transition::Complete, &result);
        result
    }

    async fn complete_inner(&self, actor: &Identity, id: Ulid) -> Result<Booking, BookingError> {
        let tenant = &actor.tenant;
        let booking = self.load(tenant, id).await?;
        authorize(Action::Complete, actor, &booking)?;
        if !booking.status.can_transition_to(BookingStatus::Completed) {
            return Err(BookingError::InvalidState {
                action: "complete",
                status: booking.status,
            });
        }

        let updated = match self
            .repo
            .update(
                tenant,
                id,
                BookingPatch::status(BookingStatus::Completed),
                Precondition::status_in(&[BookingStatus::Approved, BookingStatus::Assigned]),
            )
            .await
        {
            Ok(b) => b,
            Err(e) => return Err(self.write_refused(tenant, id, "complete", e).await),
        };
        info!(tenant = %tenant, booking = %id, "booking completed");

        self.record(
            AuditEntry::new(tenant.clone(), AuditAction::BookingCompleted, RESOURCE, self.now())
                .actor(actor.user_id)
                .resource(id)
                .before(json!({ "status": booking.status }))
                .after(json!({ "status": updated.status }))
                .correlation_id(actor.correlation_id.clone()),
        )
        .await;
        Ok(updated)
    }

    /// Cancel an active booking. Students may only cancel their own.
    pub async fn cancel(&self, actor: &Identity, id: Ulid) -> Result<Booking, BookingError> {
        let result = self.cancel_inner(actor, id).await;
        Self::observe(Transition::Cancel, &result);
        result
    }

    async fn cancel_inner(&self, actor: &Identity, id: Ulid) -> Result<Booking, BookingError> {
        let tenant = &actor.tenant;
        let booking = self.load(tenant, id).await?;
        authorize(Action::Cancel, actor, &booking)?;
        if !booking.status.can_transition_to(BookingStatus::Cancelled) {
            return Err(BookingError::InvalidState {
                action: "cancel",
                status: booking.status,
            });
        }

        let updated = match self
            .repo
            .update(
                tenant,
                id,
                BookingPatch::status(BookingStatus::Cancelled),
                Precondition::status_in(BookingStatus::ACTIVE),
            )
            .await
        {
            Ok(b) => b,
            Err(e) => return Err(self.write_refused(tenant, id, "cancel", e).await),
        };
        info!(tenant = %tenant, booking = %id, "booking cancelled");

        self.record(
            AuditEntry::new(tenant.clone(), AuditAction::BookingCancelled, RESOURCE, self.now())
                .actor(actor.user_id)
                .resource(id)
                .before(json!({ "status": booking.status }))
                .after(json!({ "status": updated.status }))
                .correlation_id(actor.correlation_id.clone()),
        )
        .await;
        self.notify(NotificationKind::BookingCancelled, &updated);
        Ok(updated)
    }

    /// Flag a stale unassigned booking. `Ok(None)` when the booking no longer
    /// qualifies (assigned, cancelled or escalated since it was selected).
    pub async fn escalate(
        &self,
        tenant: &TenantId,
        id: Ulid,
        now: Ms,
    ) -> Result<Option<Booking>, BookingError> {
        let result = self.escalate_inner(tenant, id, now).await;
        Self::observe(Transition::Escalate, &result);
        result
    }

    async fn escalate_inner(
        &self,
        tenant: &TenantId,
        id: Ulid,
        now: Ms,
    ) -> Result<Option<Booking>, BookingError> {
        let patch = BookingPatch {
            escalated_at: Some(now),
            ..BookingPatch::default()
        };
        let escalated = match self
            .repo
            .update(tenant, id, patch, Precondition::stale_unescalated())
            .await
        {
            Ok(b) => b,
            Err(crate::store::StoreError::PreconditionFailed(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let elapsed_hours = (now - escalated.created_at) / HOUR_MS;

        self.notifier.emit(Notification {
            kind: NotificationKind::BookingEscalated,
            booking: escalated.clone(),
            elapsed_hours: Some(elapsed_hours),
        });
        self.record(
            AuditEntry::new(tenant.clone(), AuditAction::BookingEscalated, RESOURCE, now)
                .resource(id)
                .before(json!({ "status": BookingStatus::Requested, "escalated_at": null }))
                .after(json!({ "escalated_at": now })),
        )
        .await;
        Ok(Some(escalated))
    }
}
