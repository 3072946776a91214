//! # Outpost World Model
//!
//! Shared model types for the Outpost manager: the persistent rows the
//! control loops read and reconcile (regions, areas, servers, hosting
//! tasks), the id wrappers that keep references type-safe, and the change
//! events the loops emit towards connected clients.
//!
//! ## Design Principles
//!
//! - **Plain data** - rows are dumb structs with explicit foreign-key ids;
//!   associations are loaded through the store, never traversed lazily
//! - **Optimistic versioning** - every mutable row carries a version counter
//!   so concurrent loops surface conflicts instead of losing updates
//! - **Tagged task kinds** - the manager/kiosk/server task variants are one
//!   enum, not a type hierarchy

pub use events::{
    BroadcastNotificationSink, NotificationSink, RecordingNotificationSink, ServerUpdatedEvent,
};
pub use ids::{AreaId, RegionId, ServerId, TaskId};
pub use model::{Area, Region, Server, Task, TaskKind};

pub mod events;
pub mod ids;
pub mod model;
