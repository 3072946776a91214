//! Error types for the store boundary.
//!
//! The important distinction is transient vs. permanent: a version conflict
//! means another loop got there first and the whole operation should be
//! retried from current state, while a missing row or duplicate key is a
//! precondition failure that retrying will not fix.

/// Errors surfaced by [`WorldStore`](crate::WorldStore) operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Optimistic-lock failure: the row changed under us. Retryable.
    #[error("version conflict on {entity} {id}: tried to save version {attempted}, store has {current}")]
    VersionConflict {
        entity: &'static str,
        id: i64,
        attempted: u64,
        current: u64,
    },

    /// The referenced row does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// A unique key constraint would be violated.
    #[error("duplicate {entity} key: {key}")]
    DuplicateKey { entity: &'static str, key: String },
}

impl StoreError {
    /// Whether retrying the enclosing operation from current state can
    /// succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::VersionConflict { .. })
    }
}

/// Classification used by [`retry_transient`](crate::retry_transient) to
/// decide whether an error is worth another attempt.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        StoreError::is_transient(self)
    }
}
