use std::sync::Arc;

use tokio::sync::{oneshot, RwLock};
use ulid::Ulid;

use crate::model::*;
use crate::tenant::TenantId;

use super::{indexed_instructor, BookingPatch, Precondition, Store, StoreError, WalCommand};

impl Store {
    pub async fn insert_booking(&self, booking: Booking) -> Result<Booking, StoreError> {
        if self.bookings.contains_key(&booking.id) {
            return Err(StoreError::AlreadyExists(booking.id));
        }
        let _gate = self.commit_gate.read().await;
        self.wal_append(Event::BookingCreated(booking.clone())).await?;
        self.reindex(&booking.tenant, booking.id, None, indexed_instructor(&booking));
        self.bookings
            .insert(booking.id, Arc::new(RwLock::new(booking.clone())));
        Ok(booking)
    }

    /// Conditional update under the booking's write lock: check, log, apply.
    pub async fn update_booking(
        &self,
        tenant: &TenantId,
        id: Ulid,
        patch: BookingPatch,
        precondition: Precondition,
    ) -> Result<Booking, StoreError> {
        let shared = self.shared(&id).ok_or(StoreError::NotFound(id))?;
        // Gate before row lock, the order compaction relies on.
        let _gate = self.commit_gate.read().await;
        let mut guard = shared.write().await;
        if &guard.tenant != tenant {
            return Err(StoreError::NotFound(id));
        }
        if !precondition.holds(&guard) {
            return Err(StoreError::PreconditionFailed(id));
        }

        let mut next = guard.clone();
        patch.apply(&mut next);
        self.wal_append(Event::BookingUpdated(next.clone())).await?;
        self.reindex(tenant, id, indexed_instructor(&guard), indexed_instructor(&next));
        *guard = next.clone();
        Ok(next)
    }

    pub async fn add_window(&self, window: AvailabilityWindow) -> Result<AvailabilityWindow, StoreError> {
        if self.windows.contains_key(&window.id) {
            return Err(StoreError::AlreadyExists(window.id));
        }
        let _gate = self.commit_gate.read().await;
        self.wal_append(Event::WindowAdded(window.clone())).await?;
        self.windows.insert(window.id, window.clone());
        Ok(window)
    }

    pub async fn delete_window(&self, tenant: &TenantId, id: Ulid) -> Result<(), StoreError> {
        let owned = self.windows.get(&id).is_some_and(|w| &w.tenant == tenant);
        if !owned {
            return Err(StoreError::NotFound(id));
        }
        let _gate = self.commit_gate.read().await;
        self.wal_append(Event::WindowRemoved {
            id,
            tenant: tenant.clone(),
        })
        .await?;
        self.windows.remove(&id);
        Ok(())
    }

    /// Rewrite the WAL with one event per live booking and window.
    pub async fn compact(&self) -> Result<(), StoreError> {
        // No commits may land between the snapshot and the log swap.
        let _gate = self.commit_gate.write().await;
        let shared: Vec<_> = self.bookings.iter().map(|e| e.value().clone()).collect();
        let mut events = Vec::with_capacity(shared.len() + self.windows.len());
        for booking in shared {
            events.push(Event::BookingCreated(booking.read().await.clone()));
        }
        events.extend(
            self.windows
                .iter()
                .map(|w| Event::WindowAdded(w.value().clone())),
        );

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| StoreError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Wal(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
