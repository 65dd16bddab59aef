//! Append-only audit trail of booking and availability changes.
//!
//! The booking service writes here as a side effect and never reads back. A
//! sink that fails is logged and ignored; it never fails the transition that
//! produced the entry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::Ms;
use crate::tenant::TenantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    BookingCreated,
    BookingApproved,
    BookingCompleted,
    BookingCancelled,
    BookingEscalated,
    AvailabilityCreated,
    AvailabilityDeleted,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BookingCreated => "BOOKING_CREATED",
            Self::BookingApproved => "BOOKING_APPROVED",
            Self::BookingCompleted => "BOOKING_COMPLETED",
            Self::BookingCancelled => "BOOKING_CANCELLED",
            Self::BookingEscalated => "BOOKING_ESCALATED",
            Self::AvailabilityCreated => "AVAILABILITY_CREATED",
            Self::AvailabilityDeleted => "AVAILABILITY_DELETED",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable audit record. `before`/`after` are free-form snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub id: Ulid,
    pub tenant: TenantId,
    /// `None` for system actors such as the escalation scheduler.
    pub actor: Option<Ulid>,
    pub action: AuditAction,
    pub resource_type: &'static str,
    pub resource_id: Option<Ulid>,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub at: Ms,
    pub correlation_id: Option<String>,
}

impl AuditEntry {
    pub fn new(tenant: TenantId, action: AuditAction, resource_type: &'static str, at: Ms) -> Self {
        Self {
            id: Ulid::new(),
            tenant,
            actor: None,
            action,
            resource_type,
            resource_id: None,
            before: None,
            after: None,
            at,
            correlation_id: None,
        }
    }

    pub fn actor(mut self, actor: Ulid) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn resource(mut self, id: Ulid) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub fn before(mut self, snapshot: serde_json::Value) -> Self {
        self.before = Some(snapshot);
        self
    }

    pub fn after(mut self, snapshot: serde_json::Value) -> Self {
        self.after = Some(snapshot);
        self
    }

    pub fn correlation_id(mut self, id: Option<String>) -> Self {
        self.correlation_id = id;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
    #[error("audit entry could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

/// Writes each entry as one structured JSON log line on the `audit` target.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn append(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let line = serde_json::to_string(&entry)?;
        tracing::info!(target: "audit", tenant = %entry.tenant, action = %entry.action, "{line}");
        Ok(())
    }
}

/// Keeps entries in memory, in append order.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }

    pub async fn for_resource(&self, id: Ulid) -> Vec<AuditEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.resource_id == Some(id))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditLog {
    async fn append(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries.write().await.push(entry);
        Ok(())
    }
}
