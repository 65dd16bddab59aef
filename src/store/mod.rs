mod compactor;
mod error;
mod mutations;
mod queries;
mod repository;

pub use compactor::run_compactor;
pub use error::StoreError;
pub use repository::{AvailabilityRepository, BookingPatch, Precondition, Repository};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};
use ulid::Ulid;

use crate::model::*;
use crate::tenant::TenantId;
use crate::wal::Wal;

pub type SharedBooking = Arc<RwLock<Booking>>;

/// The instructor bucket a booking belongs in. Terminal bookings leave the
/// index so overlap scans only touch rows that can still conflict.
fn indexed_instructor(booking: &Booking) -> Option<Ulid> {
    booking.instructor_id.filter(|_| booking.is_active())
}

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type Pending = (Event, oneshot::Sender<io::Result<()>>);

/// Owns the WAL. Appends that queue up while a flush is in progress are
/// written together and share one fsync.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let WalCommand::Append { event, response } = cmd else {
            handle_control(&mut wal, cmd);
            continue;
        };
        let mut batch: Vec<Pending> = vec![(event, response)];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }

        metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        let result = flush_batch(&mut wal, &batch);
        metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
        for (_, tx) in batch {
            let r = match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            };
            let _ = tx.send(r);
        }

        if let Some(cmd) = deferred {
            handle_control(&mut wal, cmd);
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &[Pending]) -> io::Result<()> {
    let appended = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event));
    // Flush even after a failed append so half-buffered bytes don't leak into
    // the next batch.
    let flushed = wal.flush_sync();
    appended.and(flushed)
}

fn handle_control(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_snapshot(wal.path(), &events).and_then(|()| wal.install_snapshot());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => {
            let result = wal.append_buffered(&event).and_then(|()| wal.flush_sync());
            let _ = response.send(result);
        }
    }
}

/// WAL-backed booking and availability store. All tenants share one log;
/// every read and write is filtered by tenant.
pub struct Store {
    pub(super) bookings: DashMap<Ulid, SharedBooking>,
    /// (tenant, instructor) → ids of active bookings assigned to that instructor.
    pub(super) by_instructor: DashMap<(TenantId, Ulid), Vec<Ulid>>,
    pub(super) windows: DashMap<Ulid, AvailabilityWindow>,
    /// Shared by commits, exclusive for compaction.
    pub(super) commit_gate: RwLock<()>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
}

impl Store {
    /// Replay the WAL at `wal_path` and start the writer task. Must be called
    /// inside a tokio runtime.
    pub fn open(wal_path: PathBuf) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let store = Self {
            bookings: DashMap::new(),
            by_instructor: DashMap::new(),
            windows: DashMap::new(),
            commit_gate: RwLock::new(()),
            wal_tx,
        };
        for event in events {
            store.replay_event(event);
        }
        tracing::info!(
            bookings = store.bookings.len(),
            windows = store.windows.len(),
            "store opened from {}",
            wal_path.display()
        );
        Ok(store)
    }

    /// Startup only: nobody else holds the booking locks yet.
    fn replay_event(&self, event: Event) {
        match event {
            Event::BookingCreated(b) | Event::BookingUpdated(b) => {
                let previous = self
                    .bookings
                    .get(&b.id)
                    .and_then(|e| e.value().try_read().ok().and_then(|g| indexed_instructor(&g)));
                self.reindex(&b.tenant, b.id, previous, indexed_instructor(&b));
                self.bookings.insert(b.id, Arc::new(RwLock::new(b)));
            }
            Event::WindowAdded(w) => {
                self.windows.insert(w.id, w);
            }
            Event::WindowRemoved { id, .. } => {
                self.windows.remove(&id);
            }
        }
    }

    /// Move a booking between instructor index buckets.
    pub(super) fn reindex(
        &self,
        tenant: &TenantId,
        id: Ulid,
        from: Option<Ulid>,
        to: Option<Ulid>,
    ) {
        if from == to {
            return;
        }
        if let Some(old) = from
            && let Some(mut ids) = self.by_instructor.get_mut(&(tenant.clone(), old))
        {
            ids.retain(|b| *b != id);
        }
        if let Some(new) = to {
            self.by_instructor
                .entry((tenant.clone(), new))
                .or_default()
                .push(id);
        }
    }

    pub(super) async fn wal_append(&self, event: Event) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append { event, response: tx })
            .await
            .map_err(|_| StoreError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Wal(e.to_string()))
    }

    pub(super) fn shared(&self, id: &Ulid) -> Option<SharedBooking> {
        self.bookings.get(id).map(|e| e.value().clone())
    }

    pub fn booking_count(&self) -> usize {
        self.bookings.len()
    }
}

#[async_trait]
impl Repository for Store {
    async fn find_by_id(&self, tenant: &TenantId, id: Ulid) -> Result<Option<Booking>, StoreError> {
        Ok(self.get_booking(tenant, id).await)
    }

    async fn find_active_overlapping(
        &self,
        tenant: &TenantId,
        instructor_id: Ulid,
        span: Span,
        exclude: Option<Ulid>,
    ) -> Result<Vec<Booking>, StoreError> {
        Ok(self
            .active_overlapping(tenant, instructor_id, span, exclude)
            .await)
    }

    async fn insert(&self, booking: Booking) -> Result<Booking, StoreError> {
        self.insert_booking(booking).await
    }

    async fn update(
        &self,
        tenant: &TenantId,
        id: Ulid,
        patch: BookingPatch,
        precondition: Precondition,
    ) -> Result<Booking, StoreError> {
        self.update_booking(tenant, id, patch, precondition).await
    }

    async fn find_stale_unescalated(
        &self,
        status: BookingStatus,
        cutoff: Ms,
    ) -> Result<Vec<Booking>, StoreError> {
        Ok(self.stale_unescalated(status, cutoff).await)
    }

    async fn list(&self, tenant: &TenantId, filter: &BookingFilter) -> Result<Vec<Booking>, StoreError> {
        Ok(self.list_bookings(tenant, filter).await)
    }
}

#[async_trait]
impl AvailabilityRepository for Store {
    async fn insert_window(&self, window: AvailabilityWindow) -> Result<AvailabilityWindow, StoreError> {
        self.add_window(window).await
    }

    async fn find_window(
        &self,
        tenant: &TenantId,
        id: Ulid,
    ) -> Result<Option<AvailabilityWindow>, StoreError> {
        Ok(self
            .windows
            .get(&id)
            .filter(|w| &w.tenant == tenant)
            .map(|w| w.value().clone()))
    }

    async fn remove_window(&self, tenant: &TenantId, id: Ulid) -> Result<(), StoreError> {
        self.delete_window(tenant, id).await
    }

    async fn list_windows(
        &self,
        tenant: &TenantId,
        instructor_id: Option<Ulid>,
        ending_after: Ms,
    ) -> Result<Vec<AvailabilityWindow>, StoreError> {
        Ok(self.windows_for(tenant, instructor_id, ending_after))
    }
}
