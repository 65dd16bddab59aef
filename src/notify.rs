use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::model::Booking;
use crate::tenant::TenantId;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    BookingRequested,
    BookingApproved,
    BookingCancelled,
    BookingEscalated,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BookingRequested => "BOOKING_REQUESTED",
            Self::BookingApproved => "BOOKING_APPROVED",
            Self::BookingCancelled => "BOOKING_CANCELLED",
            Self::BookingEscalated => "BOOKING_ESCALATED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub booking: Booking,
    /// Hours the booking sat unassigned; escalations only.
    pub elapsed_hours: Option<i64>,
}

impl Notification {
    pub fn new(kind: NotificationKind, booking: Booking) -> Self {
        Self {
            kind,
            booking,
            elapsed_hours: None,
        }
    }
}

/// Fire-and-forget outbound notifications. No delivery guarantee.
pub trait Notifier: Send + Sync {
    fn emit(&self, notification: Notification);
}

/// Per-tenant broadcast of notifications. Every emit also writes the mail
/// stub log line, so nothing is lost when no one subscribes.
pub struct NotifyHub {
    channels: DashMap<TenantId, broadcast::Sender<Notification>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to a tenant's notifications. Creates the channel if needed.
    pub fn subscribe(&self, tenant: &TenantId) -> broadcast::Receiver<Notification> {
        self.channels
            .entry(tenant.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Drop a tenant's channel; current subscribers see the stream close.
    pub fn remove(&self, tenant: &TenantId) {
        self.channels.remove(tenant);
    }
}

impl Notifier for NotifyHub {
    fn emit(&self, n: Notification) {
        let b = &n.booking;
        let instructor = b
            .instructor_id
            .map_or_else(|| "unassigned".to_string(), |i| i.to_string());
        match n.kind {
            NotificationKind::BookingEscalated => tracing::warn!(
                "[EMAIL STUB - ESCALATION] tenant={} booking={} student={} no instructor assigned after {}h",
                b.tenant,
                b.id,
                b.student_id,
                n.elapsed_hours.unwrap_or_default()
            ),
            kind => tracing::info!(
                "[EMAIL STUB] event={} booking={} student={} instructor={} start={}",
                kind.as_str(),
                b.id,
                b.student_id,
                instructor,
                b.span.start
            ),
        }
        metrics::counter!(crate::observability::NOTIFICATIONS_TOTAL, "event" => n.kind.as_str())
            .increment(1);

        if let Some(sender) = self.channels.get(&b.tenant) {
            let _ = sender.send(n);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BookingStatus, Span};
    use ulid::Ulid;

    fn booking(tenant: &str) -> Booking {
        Booking {
            id: Ulid::new(),
            tenant: TenantId::new(tenant).unwrap(),
            title: "Guitar".into(),
            span: Span::new(0, 1_000),
            status: BookingStatus::Requested,
            notes: None,
            student_id: Ulid::new(),
            instructor_id: None,
            created_at: 0,
            escalated_at: None,
        }
    }

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = NotifyHub::new();
        let b = booking("t1");
        let mut rx = hub.subscribe(&b.tenant);

        let n = Notification::new(NotificationKind::BookingRequested, b);
        hub.emit(n.clone());

        assert_eq!(rx.recv().await.unwrap(), n);
    }

    #[tokio::test]
    async fn tenants_do_not_see_each_other() {
        let hub = NotifyHub::new();
        let mine = booking("mine");
        let mut rx = hub.subscribe(&mine.tenant);

        hub.emit(Notification::new(NotificationKind::BookingCancelled, booking("theirs")));
        assert!(matches!(rx.try_recv(), Err(broadcast::error::TryRecvError::Empty)));
    }

    #[test]
    fn emit_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        let mut n = Notification::new(NotificationKind::BookingEscalated, booking("t"));
        n.elapsed_hours = Some(3);
        hub.emit(n);
    }

    #[tokio::test]
    async fn remove_closes_channel() {
        let hub = NotifyHub::new();
        let t = TenantId::new("gone").unwrap();
        let mut rx = hub.subscribe(&t);
        hub.remove(&t);
        assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Closed)));
    }
}
