use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::tenant::TenantId;

use super::{BookingError, BookingService};

/// True if any active booking of `instructor_id` in `bookings` overlaps
/// `span`, ignoring `exclude`. Boundary-touching spans never conflict.
pub fn has_conflict<'a>(
    bookings: impl IntoIterator<Item = &'a Booking>,
    instructor_id: Ulid,
    span: &Span,
    exclude: Option<Ulid>,
) -> bool {
    bookings.into_iter().any(|b| {
        Some(b.id) != exclude
            && b.instructor_id == Some(instructor_id)
            && b.is_active()
            && b.span.overlaps(span)
    })
}

/// Turn caller-supplied times into a span, or say why not.
pub(crate) fn validate_span(start: Ms, end: Ms) -> Result<Span, BookingError> {
    let span = Span::try_new(start, end)
        .ok_or_else(|| BookingError::validation("end time must be after start time"))?;
    if span.start < 0 {
        return Err(BookingError::validation("start time out of range"));
    }
    if span.end > MAX_VALID_TIMESTAMP_MS {
        return Err(BookingError::validation("end time out of range"));
    }
    if span.duration_ms() > MAX_SPAN_DURATION_MS {
        return Err(BookingError::validation("time range too long"));
    }
    Ok(span)
}

/// `validate_span` plus: a booking may not start before `now`.
pub(crate) fn validate_times(start: Ms, end: Ms, now: Ms) -> Result<Span, BookingError> {
    let span = validate_span(start, end)?;
    if span.start < now {
        return Err(BookingError::validation("cannot book in the past"));
    }
    Ok(span)
}

impl BookingService {
    /// Repository-backed conflict check. Callers that go on to write must hold
    /// the instructor lock across this call and the write.
    pub async fn detect_conflict(
        &self,
        tenant: &TenantId,
        instructor_id: Ulid,
        span: Span,
        exclude: Option<Ulid>,
    ) -> Result<bool, BookingError> {
        let candidates = self
            .repo
            .find_active_overlapping(tenant, instructor_id, span, exclude)
            .await?;
        Ok(has_conflict(&candidates, instructor_id, &span, exclude))
    }
}
