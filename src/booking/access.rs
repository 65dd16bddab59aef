use crate::model::{Booking, Identity, Role};

use super::BookingError;

/// Things an actor may try to do to an existing booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    Approve,
    Complete,
    Cancel,
}

/// The one place role rules live.
pub fn is_allowed(action: Action, actor: &Identity, booking: &Booking) -> bool {
    if actor.tenant != booking.tenant {
        return false;
    }
    let owns = booking.student_id == actor.user_id;
    let assigned = booking.instructor_id == Some(actor.user_id);
    match (action, actor.role) {
        (_, Role::Admin) => true,
        (Action::View, Role::Student) => owns,
        (Action::View, Role::Instructor) => assigned,
        (Action::Approve, _) => false,
        (Action::Complete, Role::Instructor) => true,
        (Action::Complete, Role::Student) => false,
        (Action::Cancel, Role::Instructor) => true,
        (Action::Cancel, Role::Student) => owns,
    }
}

pub fn authorize(action: Action, actor: &Identity, booking: &Booking) -> Result<(), BookingError> {
    if is_allowed(action, actor, booking) {
        Ok(())
    } else {
        Err(BookingError::Forbidden)
    }
}
