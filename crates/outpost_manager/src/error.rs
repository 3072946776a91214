//! Error type shared by the control loops.

use outpost_hosting::HostingError;
use outpost_store::{StoreError, Transient};

/// Anything a control-loop tick can fail with.
///
/// Store conflicts are transient and retried inside the tick; everything
/// else aborts the tick, gets logged at the job boundary, and is retried
/// from current state on the next scheduled run.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Hosting(#[from] HostingError),

    #[error("dns provider error: {0}")]
    Dns(String),
}

impl Transient for ManagerError {
    fn is_transient(&self) -> bool {
        matches!(self, ManagerError::Store(err) if err.is_transient())
    }
}
