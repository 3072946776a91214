//! The `WorldStore` trait: repository-style access to world state.
//!
//! The control loops never hold references into each other's rows; they load
//! what they need through these queries, mutate copies, and write them back
//! through the optimistic `save_*` operations. A real deployment would back
//! this trait with a relational store; the crate ships
//! [`MemoryStore`](crate::MemoryStore).

use crate::error::StoreError;
use async_trait::async_trait;
use outpost_world::{Area, AreaId, Region, RegionId, Server, ServerId, Task, TaskId};

/// Access to the persistent world state.
///
/// `insert_*` assigns the row id and resets the version; the id carried by
/// the argument is ignored. `save_*` compares the argument's version against
/// the stored row and fails with [`StoreError::VersionConflict`] when they
/// differ; on success the returned row carries the bumped version.
///
/// List queries return rows ordered by id (areas by index) so callers
/// behave deterministically.
#[async_trait]
pub trait WorldStore: Send + Sync {
    // --- regions ---

    async fn regions(&self) -> Result<Vec<Region>, StoreError>;

    async fn region(&self, id: RegionId) -> Result<Option<Region>, StoreError>;

    async fn insert_region(&self, region: Region) -> Result<Region, StoreError>;

    // --- areas ---

    async fn area(&self, id: AreaId) -> Result<Option<Area>, StoreError>;

    /// Areas of a region, ordered by area index.
    async fn areas_in_region(&self, region_id: RegionId) -> Result<Vec<Area>, StoreError>;

    /// Areas currently represented by the given server, ordered by index.
    async fn areas_by_server(&self, server_id: ServerId) -> Result<Vec<Area>, StoreError>;

    /// Inserts an area; `(region_id, index)` must be unique.
    async fn insert_area(&self, area: Area) -> Result<Area, StoreError>;

    async fn save_area(&self, area: Area) -> Result<Area, StoreError>;

    /// Removes an area; used by the area-definition updates the simulation
    /// reports, not by the control loops.
    async fn delete_area(&self, id: AreaId) -> Result<(), StoreError>;

    // --- servers ---

    async fn servers(&self) -> Result<Vec<Server>, StoreError>;

    async fn servers_in_region(&self, region_id: RegionId) -> Result<Vec<Server>, StoreError>;

    async fn server(&self, id: ServerId) -> Result<Option<Server>, StoreError>;

    async fn insert_server(&self, server: Server) -> Result<Server, StoreError>;

    async fn save_server(&self, server: Server) -> Result<Server, StoreError>;

    async fn delete_server(&self, id: ServerId) -> Result<(), StoreError>;

    // --- tasks ---

    async fn tasks(&self) -> Result<Vec<Task>, StoreError>;

    async fn task(&self, id: TaskId) -> Result<Option<Task>, StoreError>;

    async fn task_by_identifier(&self, identifier: &str) -> Result<Option<Task>, StoreError>;

    /// The first task row serving the given server, if any.
    async fn server_task(&self, server_id: ServerId) -> Result<Option<Task>, StoreError>;

    async fn insert_task(&self, task: Task) -> Result<Task, StoreError>;

    async fn save_task(&self, task: Task) -> Result<Task, StoreError>;

    async fn delete_task(&self, id: TaskId) -> Result<(), StoreError>;

    /// Deletes every previously-seen task whose identifier is not in
    /// `reported`; returns how many rows went away. This is the garbage
    /// collection step after a hosting poll.
    async fn delete_tasks_not_reported(&self, reported: &[String]) -> Result<usize, StoreError>;
}
