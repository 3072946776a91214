//! # Outpost Hosting
//!
//! Abstraction over the environment that actually runs game-server
//! processes. The manager's control loops only see the [`Hosting`] trait:
//! poll the environment for currently running tasks, start a task for a
//! server, stop a task by identifier.
//!
//! Three backends are provided, selected by configuration at startup:
//!
//! - [`LocalHosting`] - treats whatever already runs on localhost as the
//!   task for every started server; for development against a server
//!   running in the editor
//! - [`DockerHosting`] - containers on a local container engine
//! - [`CloudHosting`] - containers on a remote engine with a public address
//!
//! Semantics are at-least-once, not exactly-once: a task started and then
//! forgotten (crash between start and the next poll) is rediscovered by
//! polling and adopted; a stop for an identifier that is already gone is a
//! no-op.

pub use cloud::CloudHosting;
pub use docker::DockerHosting;
pub use local::LocalHosting;
pub use settings::{HostingBackend, HostingSettings, TlsSettings};

pub mod cloud;
pub mod docker;
pub mod local;
pub mod settings;

use async_trait::async_trait;
use outpost_world::{RegionId, ServerId, TaskKind};

/// Errors surfaced by hosting backends.
///
/// All of these abort the calling tick; the rows in the store stay at their
/// last-known state and the next tick retries against the live environment.
#[derive(Debug, thiserror::Error)]
pub enum HostingError {
    /// The backend could not be reached or rejected the request.
    #[error("hosting backend error: {0}")]
    Backend(String),

    /// A task was reported with metadata we cannot use.
    #[error("invalid task metadata: {0}")]
    InvalidMetadata(String),

    /// Launch material (TLS certificates) could not be read.
    #[error("failed to read {path}: {source}")]
    LaunchMaterial {
        path: String,
        source: std::io::Error,
    },
}

/// A task as reported by the hosting environment during a poll, or as
/// created by a start request. This is the raw observation the task
/// reconciler turns into Task rows.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSnapshot {
    pub kind: TaskKind,
    /// Opaque identifier within the hosting environment.
    pub identifier: String,
    pub name: Option<String>,
    pub private_ip: Option<String>,
    pub public_ip: Option<String>,
}

/// Everything a backend needs to launch a game server for a server row.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerLaunch {
    pub server_id: ServerId,
    pub region_id: RegionId,
    pub map_name: String,
    /// Indexes of the areas the server must initially represent.
    pub area_indexes: Vec<u32>,
}

/// The hosting environment the manager reconciles against.
#[async_trait]
pub trait Hosting: Send + Sync {
    /// Tasks currently known to the environment. Never returns a logically
    /// absent environment: backends that can assume the manager/kiosk run on
    /// the engine host report synthetic entries for them.
    async fn poll(&self) -> Result<Vec<TaskSnapshot>, HostingError>;

    /// Launches a new unit of work for the given server. The caller guards
    /// against duplicate starts; the backend does not deduplicate.
    async fn start_server_task(&self, launch: &ServerLaunch) -> Result<TaskSnapshot, HostingError>;

    /// Tears the unit of work down. Unknown identifiers are a no-op, since
    /// reconciliation races with the environment's own lifecycle.
    async fn stop_server_task(&self, identifier: &str) -> Result<(), HostingError>;
}
