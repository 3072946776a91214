//! # Outpost Manager
//!
//! The control loops that keep game-server processes in line with the areas
//! that need simulation coverage:
//!
//! - [`ServerReconciler`] - per region, partitions areas into groups via the
//!   configured [`AreaGroups`] policy and converges server rows onto them,
//!   emitting change events towards connected clients
//! - [`TaskLauncher`] - starts hosting tasks for enabled servers without one
//!   and stops tasks no enabled server wants
//! - [`TaskReconciler`] - polls the hosting backend and keeps the task table
//!   equal to what it reports
//! - [`DomainBinder`] - assigns DNS names to tasks with public ips
//! - [`ServerPurge`] - eventually deletes long-unused server rows
//! - [`scheduler`] - fixed-interval, never-self-overlapping job loops
//!
//! All loops converge at-least-once: every pass reads current state, writes
//! only actual differences, and relies on the store's optimistic versioning
//! plus bounded retry for races with other loops or a second manager
//! instance.

pub use dns::{Dns, DnsError, MemoryDns};
pub use domains::{DomainBinder, DomainSettings};
pub use error::ManagerError;
pub use grouping::{
    AreaGroups, AreaLoad, DedicatedAreaGroups, FixedAreaLoad, IdleAreaLoad, OccupancyAreaGroups,
};
pub use launcher::{LauncherSettings, TaskLauncher};
pub use orchestrate::{ReconcilerSettings, ServerReconciler};
pub use purge::{PurgeSettings, ServerPurge};
pub use refresh::TaskReconciler;
pub use scheduler::JobHandle;

pub mod dns;
pub mod domains;
pub mod error;
pub mod grouping;
pub mod launcher;
pub mod orchestrate;
pub mod purge;
pub mod refresh;
pub mod scheduler;
