use async_trait::async_trait;
use ulid::Ulid;

use crate::model::*;
use crate::tenant::TenantId;

use super::StoreError;

/// Fields a transition may change. Everything else on a booking is fixed at
/// creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookingPatch {
    pub status: Option<BookingStatus>,
    pub instructor_id: Option<Ulid>,
    pub escalated_at: Option<Ms>,
}

impl BookingPatch {
    pub fn status(status: BookingStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn apply(&self, booking: &mut Booking) {
        if let Some(status) = self.status {
            booking.status = status;
        }
        if let Some(instructor_id) = self.instructor_id {
            booking.instructor_id = Some(instructor_id);
        }
        if let Some(at) = self.escalated_at {
            booking.escalated_at = Some(at);
        }
    }
}

/// What the row must still look like for a conditional update to apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Precondition {
    pub status_in: Option<&'static [BookingStatus]>,
    pub unassigned: bool,
    pub unescalated: bool,
}

impl Precondition {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn status_in(statuses: &'static [BookingStatus]) -> Self {
        Self {
            status_in: Some(statuses),
            ..Self::default()
        }
    }

    /// The escalation selection predicate, re-checked at write time.
    pub fn stale_unescalated() -> Self {
        Self {
            status_in: Some(&[BookingStatus::Requested]),
            unassigned: true,
            unescalated: true,
        }
    }

    pub fn holds(&self, booking: &Booking) -> bool {
        self.status_in.is_none_or(|s| s.contains(&booking.status))
            && (!self.unassigned || booking.instructor_id.is_none())
            && (!self.unescalated || booking.escalated_at.is_none())
    }
}

/// Booking persistence consumed by the booking service and the escalation
/// scheduler.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn find_by_id(&self, tenant: &TenantId, id: Ulid) -> Result<Option<Booking>, StoreError>;

    /// Active bookings of `instructor_id` overlapping `span`, minus `exclude`.
    async fn find_active_overlapping(
        &self,
        tenant: &TenantId,
        instructor_id: Ulid,
        span: Span,
        exclude: Option<Ulid>,
    ) -> Result<Vec<Booking>, StoreError>;

    async fn insert(&self, booking: Booking) -> Result<Booking, StoreError>;

    /// Apply `patch` if `precondition` still holds, atomically with respect to
    /// other updates of the same booking.
    async fn update(
        &self,
        tenant: &TenantId,
        id: Ulid,
        patch: BookingPatch,
        precondition: Precondition,
    ) -> Result<Booking, StoreError>;

    /// Cross-tenant: bookings in `status` with no instructor, created at or
    /// before `cutoff`, never escalated. Oldest first.
    async fn find_stale_unescalated(
        &self,
        status: BookingStatus,
        cutoff: Ms,
    ) -> Result<Vec<Booking>, StoreError>;

    /// Tenant bookings matching `filter`, ordered by start time.
    async fn list(&self, tenant: &TenantId, filter: &BookingFilter) -> Result<Vec<Booking>, StoreError>;
}

#[async_trait]
pub trait AvailabilityRepository: Send + Sync {
    async fn insert_window(&self, window: AvailabilityWindow) -> Result<AvailabilityWindow, StoreError>;

    async fn find_window(
        &self,
        tenant: &TenantId,
        id: Ulid,
    ) -> Result<Option<AvailabilityWindow>, StoreError>;

    async fn remove_window(&self, tenant: &TenantId, id: Ulid) -> Result<(), StoreError>;

    /// Windows ending at or after `ending_after`, ordered by start time.
    async fn list_windows(
        &self,
        tenant: &TenantId,
        instructor_id: Option<Ulid>,
        ending_after: Ms,
    ) -> Result<Vec<AvailabilityWindow>, StoreError>;
}
