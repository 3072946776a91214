//! In-memory `WorldStore` backed by concurrent hash maps.
//!
//! Faithful to the semantics the loops rely on from a relational store:
//! per-table id sequences, version compare-and-bump on save, unique
//! `(region, index)` for areas, deterministic ordering on list queries.
//! Each `save_*` holds the row's shard lock for the compare-and-swap, so two
//! concurrent saves of the same row serialize and the loser sees a
//! [`StoreError::VersionConflict`].

use crate::error::StoreError;
use crate::store::WorldStore;
use async_trait::async_trait;
use dashmap::DashMap;
use outpost_world::{Area, AreaId, Region, RegionId, Server, ServerId, Task, TaskId};
use std::sync::atomic::{AtomicI64, Ordering};

/// In-memory world state, safe for concurrent use from every loop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    regions: DashMap<RegionId, Region>,
    areas: DashMap<AreaId, Area>,
    servers: DashMap<ServerId, Server>,
    tasks: DashMap<TaskId, Task>,
    region_seq: AtomicI64,
    area_seq: AtomicI64,
    server_seq: AtomicI64,
    task_seq: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(seq: &AtomicI64) -> i64 {
        seq.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait]
impl WorldStore for MemoryStore {
    async fn regions(&self) -> Result<Vec<Region>, StoreError> {
        let mut rows: Vec<Region> = self.regions.iter().map(|r| r.value().clone()).collect();
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }

    async fn region(&self, id: RegionId) -> Result<Option<Region>, StoreError> {
        Ok(self.regions.get(&id).map(|r| r.value().clone()))
    }

    async fn insert_region(&self, mut region: Region) -> Result<Region, StoreError> {
        region.id = RegionId(Self::next(&self.region_seq));
        region.version = 0;
        self.regions.insert(region.id, region.clone());
        Ok(region)
    }

    async fn area(&self, id: AreaId) -> Result<Option<Area>, StoreError> {
        Ok(self.areas.get(&id).map(|a| a.value().clone()))
    }

    async fn areas_in_region(&self, region_id: RegionId) -> Result<Vec<Area>, StoreError> {
        let mut rows: Vec<Area> = self
            .areas
            .iter()
            .filter(|a| a.value().region_id == region_id)
            .map(|a| a.value().clone())
            .collect();
        rows.sort_by_key(|a| a.index);
        Ok(rows)
    }

    async fn areas_by_server(&self, server_id: ServerId) -> Result<Vec<Area>, StoreError> {
        let mut rows: Vec<Area> = self
            .areas
            .iter()
            .filter(|a| a.value().server_id == Some(server_id))
            .map(|a| a.value().clone())
            .collect();
        rows.sort_by_key(|a| a.index);
        Ok(rows)
    }

    async fn insert_area(&self, mut area: Area) -> Result<Area, StoreError> {
        let duplicate = self
            .areas
            .iter()
            .any(|a| a.value().region_id == area.region_id && a.value().index == area.index);
        if duplicate {
            return Err(StoreError::DuplicateKey {
                entity: "area",
                key: format!("region {} index {}", area.region_id, area.index),
            });
        }
        area.id = AreaId(Self::next(&self.area_seq));
        area.version = 0;
        self.areas.insert(area.id, area.clone());
        Ok(area)
    }

    async fn save_area(&self, mut area: Area) -> Result<Area, StoreError> {
        let mut entry = self.areas.get_mut(&area.id).ok_or(StoreError::NotFound {
            entity: "area",
            id: area.id.0,
        })?;
        if entry.version != area.version {
            return Err(StoreError::VersionConflict {
                entity: "area",
                id: area.id.0,
                attempted: area.version,
                current: entry.version,
            });
        }
        area.version += 1;
        *entry = area.clone();
        Ok(area)
    }

    async fn delete_area(&self, id: AreaId) -> Result<(), StoreError> {
        self.areas.remove(&id);
        Ok(())
    }

    async fn servers(&self) -> Result<Vec<Server>, StoreError> {
        let mut rows: Vec<Server> = self.servers.iter().map(|s| s.value().clone()).collect();
        rows.sort_by_key(|s| s.id);
        Ok(rows)
    }

    async fn servers_in_region(&self, region_id: RegionId) -> Result<Vec<Server>, StoreError> {
        let mut rows: Vec<Server> = self
            .servers
            .iter()
            .filter(|s| s.value().region_id == region_id)
            .map(|s| s.value().clone())
            .collect();
        rows.sort_by_key(|s| s.id);
        Ok(rows)
    }

    async fn server(&self, id: ServerId) -> Result<Option<Server>, StoreError> {
        Ok(self.servers.get(&id).map(|s| s.value().clone()))
    }

    async fn insert_server(&self, mut server: Server) -> Result<Server, StoreError> {
        server.id = ServerId(Self::next(&self.server_seq));
        server.version = 0;
        self.servers.insert(server.id, server.clone());
        Ok(server)
    }

    async fn save_server(&self, mut server: Server) -> Result<Server, StoreError> {
        let mut entry = self
            .servers
            .get_mut(&server.id)
            .ok_or(StoreError::NotFound {
                entity: "server",
                id: server.id.0,
            })?;
        if entry.version != server.version {
            return Err(StoreError::VersionConflict {
                entity: "server",
                id: server.id.0,
                attempted: server.version,
                current: entry.version,
            });
        }
        server.version += 1;
        *entry = server.clone();
        Ok(server)
    }

    async fn delete_server(&self, id: ServerId) -> Result<(), StoreError> {
        self.servers.remove(&id);
        Ok(())
    }

    async fn tasks(&self) -> Result<Vec<Task>, StoreError> {
        let mut rows: Vec<Task> = self.tasks.iter().map(|t| t.value().clone()).collect();
        rows.sort_by_key(|t| t.id);
        Ok(rows)
    }

    async fn task(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        Ok(self.tasks.get(&id).map(|t| t.value().clone()))
    }

    async fn task_by_identifier(&self, identifier: &str) -> Result<Option<Task>, StoreError> {
        Ok(self
            .tasks
            .iter()
            .find(|t| t.value().identifier == identifier)
            .map(|t| t.value().clone()))
    }

    async fn server_task(&self, server_id: ServerId) -> Result<Option<Task>, StoreError> {
        let mut rows: Vec<Task> = self
            .tasks
            .iter()
            .filter(|t| t.value().server_id() == Some(server_id))
            .map(|t| t.value().clone())
            .collect();
        rows.sort_by_key(|t| t.id);
        Ok(rows.into_iter().next())
    }

    async fn insert_task(&self, mut task: Task) -> Result<Task, StoreError> {
        if self.task_by_identifier(&task.identifier).await?.is_some() {
            return Err(StoreError::DuplicateKey {
                entity: "task",
                key: task.identifier,
            });
        }
        task.id = TaskId(Self::next(&self.task_seq));
        task.version = 0;
        self.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn save_task(&self, mut task: Task) -> Result<Task, StoreError> {
        let mut entry = self.tasks.get_mut(&task.id).ok_or(StoreError::NotFound {
            entity: "task",
            id: task.id.0,
        })?;
        if entry.version != task.version {
            return Err(StoreError::VersionConflict {
                entity: "task",
                id: task.id.0,
                attempted: task.version,
                current: entry.version,
            });
        }
        task.version += 1;
        *entry = task.clone();
        Ok(task)
    }

    async fn delete_task(&self, id: TaskId) -> Result<(), StoreError> {
        self.tasks.remove(&id);
        Ok(())
    }

    async fn delete_tasks_not_reported(&self, reported: &[String]) -> Result<usize, StoreError> {
        let before = self.tasks.len();
        self.tasks.retain(|_, task| {
            task.seen.is_none() || reported.iter().any(|id| *id == task.identifier)
        });
        Ok(before - self.tasks.len())
    }
}
