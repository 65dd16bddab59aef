use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::tenant::TenantId;

/// Unix milliseconds. The only time type.
pub type Ms = i64;

pub const HOUR_MS: Ms = 3_600_000;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// Checked constructor for spans coming from callers.
    pub fn try_new(start: Ms, end: Ms) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn duration_ms(&self) -> Ms {
        self.end.saturating_sub(self.start)
    }

    /// Boundary-touching spans do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && self.end > other.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Requested,
    Approved,
    Assigned,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub const ACTIVE: &'static [BookingStatus] = &[Self::Requested, Self::Approved, Self::Assigned];

    /// Requested, Approved and Assigned bookings hold their slot.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Requested | Self::Approved | Self::Assigned)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Requested, Approved)
                | (Requested, Assigned)
                | (Approved, Completed)
                | (Assigned, Completed)
                | (Requested, Cancelled)
                | (Approved, Cancelled)
                | (Assigned, Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "REQUESTED",
            Self::Approved => "APPROVED",
            Self::Assigned => "ASSIGNED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

/// Authenticated caller as handed over by the request layer. Trusted as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Ulid,
    pub role: Role,
    pub tenant: TenantId,
    pub correlation_id: Option<String>,
}

impl Identity {
    pub fn new(user_id: Ulid, role: Role, tenant: TenantId) -> Self {
        Self {
            user_id,
            role,
            tenant,
            correlation_id: None,
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub tenant: TenantId,
    pub title: String,
    pub span: Span,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub student_id: Ulid,
    pub instructor_id: Option<Ulid>,
    pub created_at: Ms,
    pub escalated_at: Option<Ms>,
}

impl Booking {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Caller-supplied fields for a new booking. Times are unchecked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub title: String,
    pub start: Ms,
    pub end: Ms,
    pub instructor_id: Option<Ulid>,
    pub notes: Option<String>,
}

impl NewBooking {
    pub fn new(title: impl Into<String>, start: Ms, end: Ms) -> Self {
        Self {
            title: title.into(),
            start,
            end,
            instructor_id: None,
            notes: None,
        }
    }

    pub fn with_instructor(mut self, instructor_id: Ulid) -> Self {
        self.instructor_id = Some(instructor_id);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Declared free window of an instructor. Informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub id: Ulid,
    pub tenant: TenantId,
    pub instructor_id: Ulid,
    pub span: Span,
    pub recurring: bool,
    pub created_at: Ms,
}

/// The WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    BookingCreated(Booking),
    /// Full post-update row; replay keeps the last one.
    BookingUpdated(Booking),
    WindowAdded(AvailabilityWindow),
    WindowRemoved { id: Ulid, tenant: TenantId },
}

// ── Query types ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub status: Option<BookingStatus>,
    /// Inclusive lower bound on start time.
    pub from: Option<Ms>,
    /// Inclusive upper bound on start time.
    pub to: Option<Ms>,
}

/// Repository-level filter, already narrowed to what the caller may see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingFilter {
    pub student_id: Option<Ulid>,
    pub instructor_id: Option<Ulid>,
    pub status: Option<BookingStatus>,
    pub from: Option<Ms>,
    pub to: Option<Ms>,
}

impl BookingFilter {
    pub fn matches(&self, b: &Booking) -> bool {
        self.student_id.is_none_or(|s| b.student_id == s)
            && self.instructor_id.is_none_or(|i| b.instructor_id == Some(i))
            && self.status.is_none_or(|s| b.status == s)
            && self.from.is_none_or(|f| b.span.start >= f)
            && self.to.is_none_or(|t| b.span.start <= t)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
}
