use ulid::Ulid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(Ulid),
    #[error("already exists: {0}")]
    AlreadyExists(Ulid),
    /// The row changed between read and conditional write.
    #[error("precondition failed for {0}")]
    PreconditionFailed(Ulid),
    #[error("WAL error: {0}")]
    Wal(String),
}
