//! # World Model Rows
//!
//! Plain data structs for the persistent world state the manager reconciles:
//! regions, areas, servers and hosting tasks. Associations are expressed as
//! explicit foreign-key ids (`Area::server_id`, `TaskKind::Server`) and are
//! loaded through the store at the point of use - there is no lazy object
//! graph here.
//!
//! Every mutable row carries a `version` counter. Saves through the store
//! compare-and-bump it, so two loops racing on the same row surface as a
//! transient conflict instead of a silent lost update.

use crate::ids::{AreaId, RegionId, ServerId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Region
// ============================================================================

/// A full simulated map. Created at world seeding and immutable afterwards;
/// the control loops only ever read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub version: u64,
    /// Human-facing region name.
    pub name: String,
    /// Map asset the game servers for this region must load.
    pub map_name: String,
    /// Origin of the region in world coordinates.
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

// ============================================================================
// Area
// ============================================================================

/// A spatial subdivision of a region that a server can represent.
///
/// `(region_id, index)` is unique. `server_id` is the back-reference the
/// reconciler owns: it points at the server currently representing this
/// area, or is `None` while the area is uncovered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub id: AreaId,
    pub version: u64,
    pub region_id: RegionId,
    /// Index of this area within its region, unique per region.
    pub index: u32,
    pub name: String,
    /// Center of the area in world coordinates.
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Bounding size of the area.
    pub size_x: f64,
    pub size_y: f64,
    pub size_z: f64,
    /// Server currently representing this area, if any.
    pub server_id: Option<ServerId>,
}

// ============================================================================
// Server
// ============================================================================

/// A logical unit of simulation coverage, distinct from the task that runs it.
///
/// Lifecycle: disabled -> enabled (areas assigned) -> active (the simulation
/// reported startup) -> disabled again once its areas move elsewhere. Servers
/// are reused across grouping changes to avoid task churn and are only
/// deleted by the purge job once long-unused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub id: ServerId,
    pub version: u64,
    pub region_id: RegionId,
    /// Copied from the region so a launch payload is self-contained.
    pub map_name: String,
    /// Componentwise mean of the represented areas' coordinates.
    /// `None` while no areas are assigned.
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    /// Whether this server should have a running task (it has >= 1 area).
    pub enabled: bool,
    /// Whether a running task has confirmed the simulation is up.
    /// Sustained, never newly set, by reconciliation.
    pub active: bool,
    pub public_ip: Option<String>,
    pub public_web_socket_port: Option<u16>,
    pub domain: Option<String>,
    /// Client-facing connection URL; recomputed from the fields above.
    pub web_socket_url: Option<String>,
    /// When a task start was last requested for this server.
    pub initiated: Option<DateTime<Utc>>,
    /// When a task was last observed running for this server.
    pub seen: Option<DateTime<Utc>>,
}

impl Server {
    /// A blank server for a region, ready to be inserted. The store assigns
    /// the real id on insert; until then the id is a placeholder.
    pub fn draft(region_id: RegionId, map_name: &str) -> Self {
        Self {
            id: ServerId(0),
            version: 0,
            region_id,
            map_name: map_name.to_owned(),
            x: None,
            y: None,
            z: None,
            enabled: false,
            active: false,
            public_ip: None,
            public_web_socket_port: None,
            domain: None,
            web_socket_url: None,
            initiated: None,
            seen: None,
        }
    }
}

// ============================================================================
// Task
// ============================================================================

/// Discriminant for the three kinds of hosted process the manager tracks.
///
/// Server tasks additionally carry the id of the server they were launched
/// for and the public port clients connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskKind {
    Manager,
    Kiosk,
    Server {
        server_id: ServerId,
        public_web_socket_port: Option<u16>,
    },
}

impl TaskKind {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::Manager => "manager",
            TaskKind::Kiosk => "kiosk",
            TaskKind::Server { .. } => "server",
        }
    }
}

/// A runtime handle to a concrete hosted process, as last reported by the
/// hosting backend. The task reconciler is the sole writer of these rows:
/// it creates them from poll results and deletes them once the backend
/// stops reporting the identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub version: u64,
    pub kind: TaskKind,
    /// Opaque identifier from the hosting backend (container id, ARN, ...).
    pub identifier: String,
    pub name: Option<String>,
    pub private_ip: Option<String>,
    pub public_ip: Option<String>,
    /// DNS name bound to this task's public ip, once assigned.
    pub domain: Option<String>,
    pub initiated: Option<DateTime<Utc>>,
    pub seen: Option<DateTime<Utc>>,
}

impl Task {
    /// The server this task serves, for server tasks.
    pub fn server_id(&self) -> Option<ServerId> {
        match self.kind {
            TaskKind::Server { server_id, .. } => Some(server_id),
            _ => None,
        }
    }

    /// The public websocket port, for server tasks.
    pub fn public_web_socket_port(&self) -> Option<u16> {
        match self.kind {
            TaskKind::Server {
                public_web_socket_port,
                ..
            } => public_web_socket_port,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_server_starts_disabled() {
        let server = Server::draft(RegionId(3), "Plains");
        assert_eq!(server.region_id, RegionId(3));
        assert_eq!(server.map_name, "Plains");
        assert!(!server.enabled);
        assert!(!server.active);
        assert!(server.x.is_none());
        assert!(server.web_socket_url.is_none());
    }

    #[test]
    fn test_task_kind_accessors() {
        let task = Task {
            id: TaskId(1),
            version: 0,
            kind: TaskKind::Server {
                server_id: ServerId(9),
                public_web_socket_port: Some(8898),
            },
            identifier: "c0ffee".to_owned(),
            name: None,
            private_ip: None,
            public_ip: None,
            domain: None,
            initiated: None,
            seen: None,
        };
        assert_eq!(task.server_id(), Some(ServerId(9)));
        assert_eq!(task.public_web_socket_port(), Some(8898));
        assert_eq!(task.kind.label(), "server");

        let kiosk = Task {
            kind: TaskKind::Kiosk,
            ..task
        };
        assert_eq!(kiosk.server_id(), None);
        assert_eq!(kiosk.public_web_socket_port(), None);
    }
}
