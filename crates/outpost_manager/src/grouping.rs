//! Area grouping: deciding which areas should share one server process.
//!
//! The binding contract is the partition: every area of the region appears
//! in exactly one group, groups are non-empty, and an empty region yields no
//! groups. Which areas end up together is policy, selected by configuration:
//!
//! - [`OccupancyAreaGroups`] (default) packs areas onto as few servers as
//!   their combined occupancy allows, giving a busy area a dedicated server
//! - [`DedicatedAreaGroups`] runs one server per area regardless of load
//!
//! Both are deterministic for a given area set and load reading, so a
//! reconciliation pass that changes nothing computes the same groups as the
//! previous one.

use outpost_world::{Area, AreaId, Region};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Partitions the areas of a region into groups that should each be
/// represented by one server.
pub trait AreaGroups: Send + Sync {
    /// Ordered total partition of `areas`. Implementations may assume
    /// `areas` all belong to `region` and are ordered by area index.
    fn determine_area_groups(&self, region: &Region, areas: &[Area]) -> Vec<Vec<Area>>;
}

/// Source of per-area occupancy readings (pawn counts).
pub trait AreaLoad: Send + Sync {
    fn load(&self, area: &Area) -> u32;
}

/// Reports every area as empty. The default until the simulation feeds
/// occupancy back; it collapses each region onto a single server.
#[derive(Debug, Default)]
pub struct IdleAreaLoad;

impl AreaLoad for IdleAreaLoad {
    fn load(&self, _area: &Area) -> u32 {
        0
    }
}

/// Fixed per-area readings; test and tuning support.
#[derive(Debug, Default)]
pub struct FixedAreaLoad {
    loads: HashMap<AreaId, u32>,
}

impl FixedAreaLoad {
    pub fn new(loads: HashMap<AreaId, u32>) -> Self {
        Self { loads }
    }
}

impl AreaLoad for FixedAreaLoad {
    fn load(&self, area: &Area) -> u32 {
        self.loads.get(&area.id).copied().unwrap_or(0)
    }
}

/// One group per area: every area gets a dedicated server.
#[derive(Debug, Default)]
pub struct DedicatedAreaGroups;

impl AreaGroups for DedicatedAreaGroups {
    fn determine_area_groups(&self, _region: &Region, areas: &[Area]) -> Vec<Vec<Area>> {
        areas.iter().cloned().map(|area| vec![area]).collect()
    }
}

/// Packs areas, in index order, into one group while their summed occupancy
/// stays at or below `merge_threshold`. An area whose own occupancy reaches
/// `dedicated_threshold` always gets a group of its own.
pub struct OccupancyAreaGroups {
    load: Arc<dyn AreaLoad>,
    merge_threshold: u32,
    dedicated_threshold: u32,
}

impl OccupancyAreaGroups {
    /// Default thresholds: merge groups up to 48 pawns, dedicate a server
    /// to any area holding 32 or more on its own.
    pub fn new(load: Arc<dyn AreaLoad>) -> Self {
        Self::with_thresholds(load, 48, 32)
    }

    pub fn with_thresholds(
        load: Arc<dyn AreaLoad>,
        merge_threshold: u32,
        dedicated_threshold: u32,
    ) -> Self {
        Self {
            load,
            merge_threshold,
            dedicated_threshold,
        }
    }
}

impl AreaGroups for OccupancyAreaGroups {
    fn determine_area_groups(&self, region: &Region, areas: &[Area]) -> Vec<Vec<Area>> {
        let mut groups: Vec<Vec<Area>> = Vec::new();
        let mut current: Vec<Area> = Vec::new();
        let mut current_load: u32 = 0;

        for area in areas {
            let load = self.load.load(area);
            trace!("Region {} area {} load {}", region.id, area.index, load);

            if load >= self.dedicated_threshold {
                if !current.is_empty() {
                    groups.push(std::mem::take(&mut current));
                    current_load = 0;
                }
                groups.push(vec![area.clone()]);
                continue;
            }

            if !current.is_empty() && current_load + load > self.merge_threshold {
                groups.push(std::mem::take(&mut current));
                current_load = 0;
            }

            current_load += load;
            current.push(area.clone());
        }

        if !current.is_empty() {
            groups.push(current);
        }

        groups
    }
}
