use ulid::Ulid;

use crate::model::*;
use crate::tenant::TenantId;

use super::{SharedBooking, Store};

impl Store {
    pub async fn get_booking(&self, tenant: &TenantId, id: Ulid) -> Option<Booking> {
        let shared = self.shared(&id)?;
        let guard = shared.read().await;
        (&guard.tenant == tenant).then(|| guard.clone())
    }

    pub async fn active_overlapping(
        &self,
        tenant: &TenantId,
        instructor_id: Ulid,
        span: Span,
        exclude: Option<Ulid>,
    ) -> Vec<Booking> {
        let ids = self
            .by_instructor
            .get(&(tenant.clone(), instructor_id))
            .map(|e| e.value().clone())
            .unwrap_or_default();

        let mut hits = Vec::new();
        for id in ids {
            if Some(id) == exclude {
                continue;
            }
            let Some(shared) = self.shared(&id) else { continue };
            let guard = shared.read().await;
            // The index may lag a reassignment by one lock hand-off.
            if guard.instructor_id == Some(instructor_id)
                && &guard.tenant == tenant
                && guard.is_active()
                && guard.span.overlaps(&span)
            {
                hits.push(guard.clone());
            }
        }
        hits
    }

    pub async fn stale_unescalated(&self, status: BookingStatus, cutoff: Ms) -> Vec<Booking> {
        let mut stale = Vec::new();
        for shared in self.snapshot_handles() {
            let guard = shared.read().await;
            if guard.status == status
                && guard.instructor_id.is_none()
                && guard.escalated_at.is_none()
                && guard.created_at <= cutoff
            {
                stale.push(guard.clone());
            }
        }
        stale.sort_by_key(|b| (b.created_at, b.id));
        stale
    }

    pub async fn list_bookings(&self, tenant: &TenantId, filter: &BookingFilter) -> Vec<Booking> {
        let mut out = Vec::new();
        for shared in self.snapshot_handles() {
            let guard = shared.read().await;
            if &guard.tenant == tenant && filter.matches(&guard) {
                out.push(guard.clone());
            }
        }
        out.sort_by_key(|b| (b.span.start, b.id));
        out
    }

    pub fn windows_for(
        &self,
        tenant: &TenantId,
        instructor_id: Option<Ulid>,
        ending_after: Ms,
    ) -> Vec<AvailabilityWindow> {
        let mut out: Vec<_> = self
            .windows
            .iter()
            .filter(|w| {
                &w.tenant == tenant
                    && instructor_id.is_none_or(|i| w.instructor_id == i)
                    && w.span.end >= ending_after
            })
            .map(|w| w.value().clone())
            .collect();
        out.sort_by_key(|w| (w.span.start, w.id));
        out
    }

    /// Clone the row handles out so no map shard is held across an await.
    fn snapshot_handles(&self) -> Vec<SharedBooking> {
        self.bookings.iter().map(|e| e.value().clone()).collect()
    }
}
