//! # Outpost Store
//!
//! The persistence boundary for the Outpost manager. The control loops talk
//! to world state exclusively through the [`WorldStore`] trait: repository
//! style queries plus optimistic `save_*` operations guarded by a per-row
//! version counter.
//!
//! Concurrency model: there is no in-process locking across rows. Every
//! multi-step mutation is written so that reapplying it from current state
//! is a no-op, and version conflicts from racing loops (or a second manager
//! instance) are retried as a whole via [`retry_transient`].

pub use error::{StoreError, Transient};
pub use memory::MemoryStore;
pub use retry::{retry_transient, RetryPolicy};
pub use store::WorldStore;

pub mod error;
pub mod memory;
pub mod retry;
pub mod store;
