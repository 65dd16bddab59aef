use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use ulid::Ulid;

use super::*;
use crate::audit::{AuditAction, AuditError, MemoryAuditLog};
use crate::clock::ManualClock;
use crate::notify::NotifyHub;
use crate::store::Store;

const H: Ms = HOUR_MS;
const M: Ms = 60_000;
/// 2030-01-01T00:00:00Z
const NOW: Ms = 1_893_456_000_000;

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("lessonbook_test_booking");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

struct Harness {
    service: Arc<BookingService>,
    store: Arc<Store>,
    audit: Arc<MemoryAuditLog>,
    hub: Arc<NotifyHub>,
    clock: Arc<ManualClock>,
    tenant: TenantId,
}

impl Harness {
    fn new(name: &str) -> Self {
        let store = Arc::new(Store::open(test_wal_path(name)).unwrap());
        let audit = Arc::new(MemoryAuditLog::new());
        let hub = Arc::new(NotifyHub::new());
        let clock = Arc::new(ManualClock::new(NOW));
        let service = Arc::new(BookingService::new(
            store.clone(),
            audit.clone(),
            hub.clone(),
            clock.clone(),
        ));
        Self {
            service,
            store,
            audit,
            hub,
            clock,
            tenant: TenantId::new("school").unwrap(),
        }
    }

    fn actor(&self, role: Role) -> Identity {
        Identity::new(Ulid::new(), role, self.tenant.clone())
    }

    /// Tomorrow at `hour`:`minute`.
    fn at(hour: Ms, minute: Ms) -> Ms {
        NOW + 24 * H + hour * H + minute * M
    }
}

#[tokio::test]
async fn create_starts_requested_and_is_audited() {
    let h = Harness::new("create_starts_requested.wal");
    let student = h.actor(Role::Student).with_correlation_id("req-1");
    let mut rx = h.hub.subscribe(&h.tenant);

    let b = h
        .service
        .create(&student, NewBooking::new("  Piano basics  ", Harness::at(9, 0), Harness::at(10, 0)))
        .await
        .unwrap();

    assert_eq!(b.status, BookingStatus::Requested);
    assert_eq!(b.title, "Piano basics");
    assert_eq!(b.student_id, student.user_id);
    assert_eq!(b.created_at, NOW);
    assert!(b.instructor_id.is_none() && b.escalated_at.is_none());

    let entries = h.audit.for_resource(b.id).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::BookingCreated);
    assert_eq!(entries[0].actor, Some(student.user_id));
    assert_eq!(entries[0].correlation_id.as_deref(), Some("req-1"));
    assert_eq!(entries[0].after.as_ref().unwrap()["status"], "REQUESTED");

    let n = rx.recv().await.unwrap();
    assert_eq!(n.kind, NotificationKind::BookingRequested);
    assert_eq!(n.booking.id, b.id);
}

#[tokio::test]
async fn create_rejects_inverted_and_empty_ranges() {
    let h = Harness::new("create_rejects_ranges.wal");
    let student = h.actor(Role::Student);
    for (start, end) in [
        (Harness::at(10, 0), Harness::at(9, 0)),
        (Harness::at(10, 0), Harness::at(10, 0)),
    ] {
        let req = NewBooking::new("Lesson", start, end).with_instructor(Ulid::new());
        let err = h.service.create(&student, req).await.unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)), "{err}");
    }
    assert_eq!(h.store.booking_count(), 0);
}

#[tokio::test]
async fn create_rejects_past_start() {
    let h = Harness::new("create_rejects_past.wal");
    let err = h
        .service
        .create(&h.actor(Role::Student), NewBooking::new("Lesson", NOW - M, NOW + H))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));
}

#[tokio::test]
async fn create_rejects_extreme_timestamps() {
    let h = Harness::new("create_rejects_extreme.wal");
    let student = h.actor(Role::Student);
    for (start, end) in [(Ms::MIN, 0), (Ms::MIN, Ms::MAX), (NOW, Ms::MAX)] {
        let err = h
            .service
            .create(&student, NewBooking::new("Lesson", start, end))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)), "[{start}, {end}): {err}");
    }
    assert_eq!(h.store.booking_count(), 0);
}

#[tokio::test]
async fn create_checks_title_and_notes_length() {
    let h = Harness::new("create_checks_text.wal");
    let student = h.actor(Role::Student);
    let (s, e) = (Harness::at(9, 0), Harness::at(10, 0));

    let short = h.service.create(&student, NewBooking::new(" ab ", s, e)).await;
    assert!(matches!(short, Err(BookingError::Validation(_))));

    let long = h.service.create(&student, NewBooking::new("x".repeat(201), s, e)).await;
    assert!(matches!(long, Err(BookingError::Validation(_))));

    let notes = NewBooking::new("Lesson", s, e).with_notes("n".repeat(501));
    assert!(matches!(
        h.service.create(&student, notes).await,
        Err(BookingError::Validation(_))
    ));

    let ok = NewBooking::new("Lesson", s, e).with_notes("n".repeat(500));
    assert!(h.service.create(&student, ok).await.is_ok());
}

#[tokio::test]
async fn overlapping_request_for_same_instructor_conflicts() {
    let h = Harness::new("overlap_conflicts.wal");
    let instructor = Ulid::new();
    let student = h.actor(Role::Student);

    h.service
        .create(
            &student,
            NewBooking::new("A", Harness::at(9, 0), Harness::at(11, 0)).with_instructor(instructor),
        )
        .await
        .unwrap();

    let err = h
        .service
        .create(
            &student,
            NewBooking::new("B", Harness::at(10, 0), Harness::at(12, 0)).with_instructor(instructor),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Conflict { instructor_id } if instructor_id == instructor));
    assert_eq!(err.code(), "CONFLICT");
    assert_eq!(h.store.booking_count(), 1);
}

#[tokio::test]
async fn adjacent_and_other_instructor_bookings_are_free() {
    let h = Harness::new("adjacent_free.wal");
    let instructor = Ulid::new();
    let student = h.actor(Role::Student);
    let req = |title: &str, s, e, i| NewBooking::new(title, s, e).with_instructor(i);

    h.service
        .create(&student, req("A", Harness::at(9, 0), Harness::at(11, 0), instructor))
        .await
        .unwrap();
    h.service
        .create(&student, req("B", Harness::at(11, 0), Harness::at(12, 0), instructor))
        .await
        .unwrap();
    h.service
        .create(&student, req("C", Harness::at(9, 0), Harness::at(11, 0), Ulid::new()))
        .await
        .unwrap();
}

#[tokio::test]
async fn conflict_is_scoped_to_tenant() {
    let h = Harness::new("conflict_tenant_scope.wal");
    let instructor = Ulid::new();
    let span = (Harness::at(9, 0), Harness::at(10, 0));

    let here = h.actor(Role::Student);
    let there = Identity::new(Ulid::new(), Role::Student, TenantId::new("other").unwrap());
    for actor in [&here, &there] {
        h.service
            .create(actor, NewBooking::new("Lesson", span.0, span.1).with_instructor(instructor))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn approve_assigns_instructor_then_blocks_overlaps() {
    let h = Harness::new("approve_assigns.wal");
    let admin = h.actor(Role::Admin);
    let student = h.actor(Role::Student);
    let instructor = Ulid::new();

    let a = h
        .service
        .create(&student, NewBooking::new("A", Harness::at(9, 0), Harness::at(11, 0)))
        .await
        .unwrap();
    let approved = h.service.approve(&admin, a.id, Some(instructor)).await.unwrap();
    assert_eq!(approved.status, BookingStatus::Assigned);
    assert_eq!(approved.instructor_id, Some(instructor));

    let err = h
        .service
        .create(
            &student,
            NewBooking::new("C", Harness::at(9, 30), Harness::at(10, 30)).with_instructor(instructor),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Conflict { .. }));

    let audit = h.audit.for_resource(a.id).await;
    let last = audit.last().unwrap();
    assert_eq!(last.action, AuditAction::BookingApproved);
    assert_eq!(last.before.as_ref().unwrap()["status"], "REQUESTED");
    assert_eq!(last.after.as_ref().unwrap()["status"], "ASSIGNED");
}

#[tokio::test]
async fn approve_excludes_the_booking_itself() {
    let h = Harness::new("approve_excludes_self.wal");
    let instructor = Ulid::new();
    let b = h
        .service
        .create(
            &h.actor(Role::Student),
            NewBooking::new("Lesson", Harness::at(9, 0), Harness::at(10, 0)).with_instructor(instructor),
        )
        .await
        .unwrap();

    // requested instructor is picked up when approve names none
    let approved = h.service.approve(&h.actor(Role::Admin), b.id, None).await.unwrap();
    assert_eq!(approved.status, BookingStatus::Assigned);
    assert_eq!(approved.instructor_id, Some(instructor));
}

#[tokio::test]
async fn approve_without_instructor_leaves_it_unassigned() {
    let h = Harness::new("approve_unassigned.wal");
    let b = h
        .service
        .create(
            &h.actor(Role::Student),
            NewBooking::new("Lesson", Harness::at(9, 0), Harness::at(10, 0)),
        )
        .await
        .unwrap();
    let approved = h.service.approve(&h.actor(Role::Admin), b.id, None).await.unwrap();
    assert_eq!(approved.status, BookingStatus::Approved);
    assert_eq!(approved.instructor_id, None);
}

#[tokio::test]
async fn approve_twice_fails_invalid_state() {
    let h = Harness::new("approve_twice.wal");
    let admin = h.actor(Role::Admin);
    let b = h
        .service
        .create(&h.actor(Role::Student), NewBooking::new("Lesson", Harness::at(9, 0), Harness::at(10, 0)))
        .await
        .unwrap();

    h.service.approve(&admin, b.id, Some(Ulid::new())).await.unwrap();
    let err = h.service.approve(&admin, b.id, Some(Ulid::new())).await.unwrap_err();
    assert!(matches!(
        err,
        BookingError::InvalidState { action: "approve", status: BookingStatus::Assigned }
    ));
}

#[tokio::test]
async fn only_admins_approve() {
    let h = Harness::new("only_admins_approve.wal");
    let student = h.actor(Role::Student);
    let b = h
        .service
        .create(&student, NewBooking::new("Lesson", Harness::at(9, 0), Harness::at(10, 0)))
        .await
        .unwrap();
    for actor in [student, h.actor(Role::Instructor)] {
        let err = h.service.approve(&actor, b.id, None).await.unwrap_err();
        assert!(matches!(err, BookingError::Forbidden));
    }
    assert_eq!(h.store.get_booking(&h.tenant, b.id).await.unwrap().status, BookingStatus::Requested);
}

#[tokio::test]
async fn concurrent_approvals_for_one_instructor_admit_one() {
    let h = Harness::new("concurrent_approvals.wal");
    let admin = h.actor(Role::Admin);
    let instructor = Ulid::new();

    let mut ids = Vec::new();
    for i in 0..8 {
        let b = h
            .service
            .create(
                &h.actor(Role::Student),
                NewBooking::new(format!("Lesson {i}"), Harness::at(9, i), Harness::at(10, i)),
            )
            .await
            .unwrap();
        ids.push(b.id);
    }

    let tasks: Vec<_> = ids
        .into_iter()
        .map(|id| {
            let service = h.service.clone();
            let admin = admin.clone();
            tokio::spawn(async move { service.approve(&admin, id, Some(instructor)).await })
        })
        .collect();

    let mut assigned = 0;
    let mut conflicts = 0;
    for t in tasks {
        match t.await.unwrap() {
            Ok(_) => assigned += 1,
            Err(BookingError::Conflict { .. }) => conflicts += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(assigned, 1);
    assert_eq!(conflicts, 7);
}

#[tokio::test]
async fn complete_then_cancel_fails_invalid_state() {
    let h = Harness::new("complete_then_cancel.wal");
    let admin = h.actor(Role::Admin);
    let e = h
        .service
        .create(&h.actor(Role::Student), NewBooking::new("E", Harness::at(9, 0), Harness::at(10, 0)))
        .await
        .unwrap();
    h.service.approve(&admin, e.id, None).await.unwrap();

    let done = h.service.complete(&h.actor(Role::Instructor), e.id).await.unwrap();
    assert_eq!(done.status, BookingStatus::Completed);

    let err = h.service.cancel(&admin, e.id).await.unwrap_err();
    assert!(matches!(
        err,
        BookingError::InvalidState { action: "cancel", status: BookingStatus::Completed }
    ));
    assert_eq!(err.code(), "INVALID_STATE");
}

#[tokio::test]
async fn cancel_twice_fails_invalid_state() {
    let h = Harness::new("cancel_twice.wal");
    let student = h.actor(Role::Student);
    let b = h
        .service
        .create(&student, NewBooking::new("Lesson", Harness::at(9, 0), Harness::at(10, 0)))
        .await
        .unwrap();

    h.service.cancel(&student, b.id).await.unwrap();
    let err = h.service.cancel(&student, b.id).await.unwrap_err();
    assert!(matches!(
        err,
        BookingError::InvalidState { action: "cancel", status: BookingStatus::Cancelled }
    ));
    assert_eq!(h.audit.for_resource(b.id).await.len(), 2);
}

#[tokio::test]
async fn refused_roles_do_not_learn_the_status() {
    let h = Harness::new("refused_roles_status.wal");
    let owner = h.actor(Role::Student);
    let b = h
        .service
        .create(&owner, NewBooking::new("Lesson", Harness::at(9, 0), Harness::at(10, 0)))
        .await
        .unwrap();
    h.service.cancel(&owner, b.id).await.unwrap();

    for actor in [owner.clone(), h.actor(Role::Instructor)] {
        let err = h.service.approve(&actor, b.id, None).await.unwrap_err();
        assert!(matches!(err, BookingError::Forbidden), "{:?}: {err}", actor.role);
    }
    assert!(matches!(
        h.service.complete(&owner, b.id).await,
        Err(BookingError::Forbidden)
    ));
    assert!(matches!(
        h.service.cancel(&h.actor(Role::Student), b.id).await,
        Err(BookingError::Forbidden)
    ));
    // the owner may cancel, so the state check still applies to them
    assert!(matches!(
        h.service.cancel(&owner, b.id).await,
        Err(BookingError::InvalidState { .. })
    ));
}

#[tokio::test]
async fn complete_requires_approval_and_staff() {
    let h = Harness::new("complete_requires.wal");
    let student = h.actor(Role::Student);
    let b = h
        .service
        .create(&student, NewBooking::new("Lesson", Harness::at(9, 0), Harness::at(10, 0)))
        .await
        .unwrap();

    let err = h.service.complete(&h.actor(Role::Admin), b.id).await.unwrap_err();
    assert!(matches!(err, BookingError::InvalidState { action: "complete", .. }));

    h.service.approve(&h.actor(Role::Admin), b.id, None).await.unwrap();
    let err = h.service.complete(&student, b.id).await.unwrap_err();
    assert!(matches!(err, BookingError::Forbidden));
}

#[tokio::test]
async fn cancel_frees_the_slot() {
    let h = Harness::new("cancel_frees_slot.wal");
    let student = h.actor(Role::Student);
    let instructor = Ulid::new();
    let req = || NewBooking::new("Lesson", Harness::at(9, 0), Harness::at(10, 0)).with_instructor(instructor);

    let mut rx = h.hub.subscribe(&h.tenant);
    let first = h.service.create(&student, req()).await.unwrap();
    assert!(h.service.create(&student, req()).await.is_err());

    let cancelled = h.service.cancel(&student, first.id).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    h.service.create(&student, req()).await.unwrap();

    let kinds: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).map(|n| n.kind).collect();
    assert_eq!(
        kinds,
        vec![
            NotificationKind::BookingRequested,
            NotificationKind::BookingCancelled,
            NotificationKind::BookingRequested,
        ]
    );
}

#[tokio::test]
async fn students_cancel_only_their_own() {
    let h = Harness::new("students_cancel_own.wal");
    let owner = h.actor(Role::Student);
    let b = h
        .service
        .create(&owner, NewBooking::new("Lesson", Harness::at(9, 0), Harness::at(10, 0)))
        .await
        .unwrap();

    let err = h.service.cancel(&h.actor(Role::Student), b.id).await.unwrap_err();
    assert!(matches!(err, BookingError::Forbidden));
    h.service.cancel(&owner, b.id).await.unwrap();
}

#[tokio::test]
async fn other_tenant_sees_not_found() {
    let h = Harness::new("other_tenant_not_found.wal");
    let b = h
        .service
        .create(&h.actor(Role::Student), NewBooking::new("Lesson", Harness::at(9, 0), Harness::at(10, 0)))
        .await
        .unwrap();

    let outsider = Identity::new(Ulid::new(), Role::Admin, TenantId::new("other").unwrap());
    assert!(matches!(h.service.get(&outsider, b.id).await, Err(BookingError::NotFound(id)) if id == b.id));
    assert!(matches!(h.service.cancel(&outsider, b.id).await, Err(BookingError::NotFound(_))));
    assert!(matches!(
        h.service.approve(&outsider, Ulid::new(), None).await,
        Err(BookingError::NotFound(_))
    ));
}

#[tokio::test]
async fn get_respects_view_rules() {
    let h = Harness::new("get_view_rules.wal");
    let owner = h.actor(Role::Student);
    let instructor = h.actor(Role::Instructor);
    let b = h
        .service
        .create(
            &owner,
            NewBooking::new("Lesson", Harness::at(9, 0), Harness::at(10, 0)).with_instructor(instructor.user_id),
        )
        .await
        .unwrap();

    assert!(h.service.get(&owner, b.id).await.is_ok());
    assert!(h.service.get(&instructor, b.id).await.is_ok());
    assert!(h.service.get(&h.actor(Role::Admin), b.id).await.is_ok());
    assert!(matches!(
        h.service.get(&h.actor(Role::Student), b.id).await,
        Err(BookingError::Forbidden)
    ));
}

#[tokio::test]
async fn list_is_narrowed_by_role_and_paginated() {
    let h = Harness::new("list_paginated.wal");
    let alice = h.actor(Role::Student);
    let bob = h.actor(Role::Student);
    let instructor = h.actor(Role::Instructor);

    for i in 0..5 {
        h.service
            .create(&alice, NewBooking::new(format!("Alice {i}"), Harness::at(i, 0), Harness::at(i, 30)))
            .await
            .unwrap();
    }
    h.service
        .create(
            &bob,
            NewBooking::new("Bob", Harness::at(12, 0), Harness::at(13, 0)).with_instructor(instructor.user_id),
        )
        .await
        .unwrap();

    let page = h
        .service
        .list(&alice, BookingQuery { page: Some(2), limit: Some(2), ..BookingQuery::default() })
        .await
        .unwrap();
    assert_eq!((page.total, page.total_pages, page.page, page.limit), (5, 3, 2, 2));
    let titles: Vec<_> = page.items.iter().map(|b| b.title.as_str()).collect();
    assert_eq!(titles, vec!["Alice 2", "Alice 3"]);

    let mine = h.service.list(&instructor, BookingQuery::default()).await.unwrap();
    assert_eq!(mine.total, 1);
    assert_eq!(mine.items[0].title, "Bob");

    let all = h.service.list(&h.actor(Role::Admin), BookingQuery::default()).await.unwrap();
    assert_eq!(all.total, 6);
    assert_eq!(all.limit, 20);
}

#[tokio::test]
async fn list_clamps_limit_and_filters_status() {
    let h = Harness::new("list_clamps.wal");
    let admin = h.actor(Role::Admin);
    let b = h
        .service
        .create(&h.actor(Role::Student), NewBooking::new("Lesson", Harness::at(9, 0), Harness::at(10, 0)))
        .await
        .unwrap();
    h.service
        .create(&h.actor(Role::Student), NewBooking::new("Other", Harness::at(11, 0), Harness::at(12, 0)))
        .await
        .unwrap();
    h.service.cancel(&admin, b.id).await.unwrap();

    let page = h
        .service
        .list(
            &admin,
            BookingQuery {
                page: Some(0),
                limit: Some(1_000),
                status: Some(BookingStatus::Cancelled),
                ..BookingQuery::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.page, 1);
    assert_eq!(page.limit, 100);
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, b.id);
}

#[tokio::test]
async fn escalate_sets_timestamp_once() {
    let h = Harness::new("escalate_once.wal");
    let mut rx = h.hub.subscribe(&h.tenant);
    let d = h
        .service
        .create(&h.actor(Role::Student), NewBooking::new("D", Harness::at(9, 0), Harness::at(10, 0)))
        .await
        .unwrap();
    let _ = rx.recv().await.unwrap();

    h.clock.advance(3 * H);
    let now = h.service.now();
    let escalated = h.service.escalate(&h.tenant, d.id, now).await.unwrap().unwrap();
    assert_eq!(escalated.status, BookingStatus::Requested);
    assert_eq!(escalated.escalated_at, Some(now));

    let n = rx.recv().await.unwrap();
    assert_eq!(n.kind, NotificationKind::BookingEscalated);
    assert_eq!(n.elapsed_hours, Some(3));

    assert!(h.service.escalate(&h.tenant, d.id, now + H).await.unwrap().is_none());
    let audit = h.audit.for_resource(d.id).await;
    let escalations: Vec<_> = audit
        .iter()
        .filter(|e| e.action == AuditAction::BookingEscalated)
        .collect();
    assert_eq!(escalations.len(), 1);
    assert_eq!(escalations[0].actor, None);
}

#[tokio::test]
async fn escalate_skips_assigned_and_cancelled() {
    let h = Harness::new("escalate_skips.wal");
    let admin = h.actor(Role::Admin);
    let student = h.actor(Role::Student);
    let a = h
        .service
        .create(&student, NewBooking::new("A", Harness::at(9, 0), Harness::at(10, 0)))
        .await
        .unwrap();
    let c = h
        .service
        .create(&student, NewBooking::new("C", Harness::at(11, 0), Harness::at(12, 0)))
        .await
        .unwrap();
    h.service.approve(&admin, a.id, Some(Ulid::new())).await.unwrap();
    h.service.cancel(&student, c.id).await.unwrap();

    for id in [a.id, c.id] {
        assert!(h.service.escalate(&h.tenant, id, NOW + 3 * H).await.unwrap().is_none());
    }
}

struct FailingAudit;

#[async_trait]
impl crate::audit::AuditSink for FailingAudit {
    async fn append(&self, _entry: crate::audit::AuditEntry) -> Result<(), AuditError> {
        Err(AuditError::Unavailable("disk full".into()))
    }
}

#[tokio::test]
async fn audit_failure_does_not_fail_the_transition() {
    let store = Arc::new(Store::open(test_wal_path("audit_failure.wal")).unwrap());
    let service = BookingService::new(
        store.clone(),
        Arc::new(FailingAudit),
        Arc::new(NotifyHub::new()),
        Arc::new(ManualClock::new(NOW)),
    );
    let tenant = TenantId::new("school").unwrap();
    let student = Identity::new(Ulid::new(), Role::Student, tenant.clone());

    let b = service
        .create(&student, NewBooking::new("Lesson", Harness::at(9, 0), Harness::at(10, 0)))
        .await
        .unwrap();
    let cancelled = service.cancel(&student, b.id).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(
        store.get_booking(&tenant, b.id).await.unwrap().status,
        BookingStatus::Cancelled
    );
}

#[tokio::test]
async fn state_survives_reopen() {
    let path = test_wal_path("survives_reopen.wal");
    let tenant = TenantId::new("school").unwrap();
    let admin = Identity::new(Ulid::new(), Role::Admin, tenant.clone());
    let instructor = Ulid::new();

    let id = {
        let store = Arc::new(Store::open(path.clone()).unwrap());
        let service = BookingService::new(
            store,
            Arc::new(MemoryAuditLog::new()),
            Arc::new(NotifyHub::new()),
            Arc::new(ManualClock::new(NOW)),
        );
        let b = service
            .create(&admin, NewBooking::new("Lesson", Harness::at(9, 0), Harness::at(10, 0)))
            .await
            .unwrap();
        service.approve(&admin, b.id, Some(instructor)).await.unwrap();
        b.id
    };

    let store = Arc::new(Store::open(path).unwrap());
    let b = store.get_booking(&tenant, id).await.unwrap();
    assert_eq!(b.status, BookingStatus::Assigned);
    assert_eq!(b.instructor_id, Some(instructor));

    let service = BookingService::new(
        store,
        Arc::new(MemoryAuditLog::new()),
        Arc::new(NotifyHub::new()),
        Arc::new(ManualClock::new(NOW)),
    );
    assert!(service
        .detect_conflict(&tenant, instructor, b.span, None)
        .await
        .unwrap());
    assert!(!service
        .detect_conflict(&tenant, instructor, b.span, Some(id))
        .await
        .unwrap());
}
