use ulid::Ulid;

use crate::limits::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use crate::model::*;

use super::access::{authorize, Action};
use super::{BookingError, BookingService};

impl BookingService {
    /// Fetch one booking the actor is allowed to see.
    pub async fn get(&self, actor: &Identity, id: Ulid) -> Result<Booking, BookingError> {
        let booking = self.load(&actor.tenant, id).await?;
        authorize(Action::View, actor, &booking)?;
        Ok(booking)
    }

    /// Paginated listing, narrowed by role: students see their own bookings,
    /// instructors those assigned to them, admins the whole tenant.
    pub async fn list(&self, actor: &Identity, query: BookingQuery) -> Result<Page<Booking>, BookingError> {
        let mut filter = BookingFilter {
            status: query.status,
            from: query.from,
            to: query.to,
            ..BookingFilter::default()
        };
        match actor.role {
            Role::Student => filter.student_id = Some(actor.user_id),
            Role::Instructor => filter.instructor_id = Some(actor.user_id),
            Role::Admin => {}
        }

        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);

        let all = self.repo.list(&actor.tenant, &filter).await?;
        let total = all.len();
        let items = all
            .into_iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .collect();

        Ok(Page {
            items,
            page,
            limit,
            total,
            total_pages: total.div_ceil(limit),
        })
    }
}
