//! Server reconciliation: every area represented by exactly one enabled
//! server, with as little churn as possible.
//!
//! Each pass walks every region, asks the grouping policy for the desired
//! partition, and converges the server rows onto it field by field. Servers
//! are reused across grouping changes (first by already-representing an
//! area of the group, then by being empty) so that a regrouping does not
//! tear tasks down needlessly. Servers matched by no group are stripped of
//! their areas and disabled, never deleted here.
//!
//! Every field write is guarded by an actual-difference check. That keeps
//! repeated passes from bumping row versions and flooding the notification
//! channel: a pass over a converged world writes nothing and emits nothing.
//! The pass runs under the bounded transient retry, which is safe because
//! reapplying a partially-applied pass converges to the same state.

use crate::error::ManagerError;
use crate::grouping::AreaGroups;
use chrono::Utc;
use outpost_store::{retry_transient, RetryPolicy, WorldStore};
use outpost_world::{
    Area, AreaId, NotificationSink, Region, Server, ServerId, ServerUpdatedEvent,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Knobs for the reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    /// Whether clients must connect over TLS. With TLS the connection URL
    /// needs a bound domain; without it the public ip suffices.
    pub tls: bool,
    pub retry: RetryPolicy,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            tls: false,
            retry: RetryPolicy::default(),
        }
    }
}

/// The orchestration loop over regions, areas and servers.
pub struct ServerReconciler {
    store: Arc<dyn WorldStore>,
    grouping: Arc<dyn AreaGroups>,
    notifications: Arc<dyn NotificationSink>,
    settings: ReconcilerSettings,
}

impl ServerReconciler {
    pub fn new(
        store: Arc<dyn WorldStore>,
        grouping: Arc<dyn AreaGroups>,
        notifications: Arc<dyn NotificationSink>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            store,
            grouping,
            notifications,
            settings,
        }
    }

    /// Job entry point: one full reconciliation pass, retried on transient
    /// store contention. Change events are published only once the pass has
    /// committed, so a retried pass does not double-notify.
    pub async fn reconcile(&self) -> Result<Vec<ServerUpdatedEvent>, ManagerError> {
        let events =
            retry_transient(self.settings.retry, || async { self.reconcile_once().await }).await?;

        for event in &events {
            self.notifications.server_updated(event.clone());
        }
        Ok(events)
    }

    async fn reconcile_once(&self) -> Result<Vec<ServerUpdatedEvent>, ManagerError> {
        trace!("Managing servers...");
        let mut events = Vec::new();

        for region in self.store.regions().await? {
            self.reconcile_region(&region, &mut events).await?;
        }

        Ok(events)
    }

    async fn reconcile_region(
        &self,
        region: &Region,
        events: &mut Vec<ServerUpdatedEvent>,
    ) -> Result<(), ManagerError> {
        trace!("Managing servers for region {}", region.id);

        let areas = self.store.areas_in_region(region.id).await?;
        let area_groups = self.grouping.determine_area_groups(region, &areas);
        trace!("Region {} area groups: {:?}", region.id, area_groups);

        let mut used_server_ids: Vec<ServerId> = Vec::new();

        for group in &area_groups {
            let Some(first_area) = group.first() else {
                continue;
            };

            // reuse the server already representing this group's first area,
            // otherwise an existing empty server, otherwise create one
            let mut created = false;
            let server = match self.server_representing(region, first_area.id).await? {
                Some(server) => server,
                None => match self.empty_server(region, &used_server_ids).await? {
                    Some(server) => server,
                    None => {
                        let server = self
                            .store
                            .insert_server(Server::draft(region.id, &region.map_name))
                            .await?;
                        info!(
                            "New server {} for region {} areas {:?}",
                            server.id,
                            region.id,
                            group.iter().map(|a| a.index).collect::<Vec<_>>()
                        );
                        created = true;
                        server
                    }
                },
            };

            let (server, changed) = self.reconcile_server(server, region, group).await?;
            used_server_ids.push(server.id);

            if changed || created {
                events.push(self.server_updated_event(&server).await?);
            }
        }

        // servers in this region matched by no group must stop representing
        // any areas
        for server in self.store.servers_in_region(region.id).await? {
            if used_server_ids.contains(&server.id) {
                continue;
            }
            trace!("Managing unused server {} for region {}", server.id, region.id);

            let (server, changed) = self.reconcile_server(server, region, &[]).await?;
            if changed {
                events.push(self.server_updated_event(&server).await?);
            }
        }

        Ok(())
    }

    /// The server currently representing `area_id` in this region, going by
    /// the area row's live back-reference.
    async fn server_representing(
        &self,
        region: &Region,
        area_id: AreaId,
    ) -> Result<Option<Server>, ManagerError> {
        let Some(area) = self.store.area(area_id).await? else {
            return Ok(None);
        };
        let Some(server_id) = area.server_id else {
            return Ok(None);
        };
        Ok(self
            .store
            .server(server_id)
            .await?
            .filter(|server| server.region_id == region.id))
    }

    /// An existing server in the region with no areas assigned and not yet
    /// claimed this pass.
    async fn empty_server(
        &self,
        region: &Region,
        used: &[ServerId],
    ) -> Result<Option<Server>, ManagerError> {
        for server in self.store.servers_in_region(region.id).await? {
            if used.contains(&server.id) {
                continue;
            }
            if self.store.areas_by_server(server.id).await?.is_empty() {
                return Ok(Some(server));
            }
        }
        Ok(None)
    }

    /// Converges one server row onto representing `desired`. Returns the
    /// saved row and whether a material change happened. Stamping `seen` is
    /// persisted but deliberately not material: it happens on every pass
    /// while a task is running.
    async fn reconcile_server(
        &self,
        mut server: Server,
        region: &Region,
        desired: &[Area],
    ) -> Result<(Server, bool), ManagerError> {
        trace!(
            "Updating server {} with region {} and area group {:?}",
            server.id,
            region.id,
            desired.iter().map(|a| a.index).collect::<Vec<_>>()
        );

        let task = self.store.server_task(server.id).await?;

        let (x, y, z) = aggregate_position(desired);
        let enabled = !desired.is_empty();
        // active can only be sustained here; it is set when the simulation
        // reports startup, and cleared the moment the task disappears
        let active = server.active && task.is_some();
        let public_ip = task.as_ref().and_then(|t| t.public_ip.clone());
        let public_web_socket_port = task.as_ref().and_then(|t| t.public_web_socket_port());
        let domain = task.as_ref().and_then(|t| t.domain.clone());
        let web_socket_url = web_socket_url(
            self.settings.tls,
            enabled,
            active,
            public_ip.as_deref(),
            public_web_socket_port,
            domain.as_deref(),
        );

        let mut changed = false;

        if server.region_id != region.id {
            server.region_id = region.id;
            changed = true;
        }

        // symmetric-difference update of the area back-references, against
        // fresh rows so one pass does not conflict with itself
        let desired_ids: HashSet<AreaId> = desired.iter().map(|a| a.id).collect();
        for area in self.store.areas_by_server(server.id).await? {
            if !desired_ids.contains(&area.id) {
                debug!("Server {} no longer contains area {}", server.id, area.id);
                let mut area = area;
                area.server_id = None;
                self.store.save_area(area).await?;
                changed = true;
            }
        }
        for area in desired {
            let Some(row) = self.store.area(area.id).await? else {
                continue;
            };
            if row.server_id != Some(server.id) {
                debug!("Server {} now contains area {}", server.id, row.id);
                let mut row = row;
                row.server_id = Some(server.id);
                self.store.save_area(row).await?;
                changed = true;
            }
        }

        if server.map_name != region.map_name {
            server.map_name = region.map_name.clone();
            changed = true;
        }

        if server.x != x || server.y != y || server.z != z {
            server.x = x;
            server.y = y;
            server.z = z;
            changed = true;
        }

        if server.enabled != enabled {
            server.enabled = enabled;
            changed = true;
        }

        if server.active != active {
            server.active = active;
            changed = true;
        }

        if server.public_ip != public_ip {
            server.public_ip = public_ip;
            changed = true;
        }

        if server.public_web_socket_port != public_web_socket_port {
            server.public_web_socket_port = public_web_socket_port;
            changed = true;
        }

        if server.domain != domain {
            server.domain = domain;
            changed = true;
        }

        if server.web_socket_url != web_socket_url {
            server.web_socket_url = web_socket_url;
            changed = true;
        }

        let seen_touched = task.is_some();
        if seen_touched {
            server.seen = Some(Utc::now());
        }

        if changed || seen_touched {
            server = self.store.save_server(server).await?;
        }

        Ok((server, changed))
    }

    async fn server_updated_event(
        &self,
        server: &Server,
    ) -> Result<ServerUpdatedEvent, ManagerError> {
        let areas = self.store.areas_by_server(server.id).await?;
        Ok(ServerUpdatedEvent {
            server_id: server.id,
            version: server.version,
            region_id: server.region_id,
            area_ids: areas.iter().map(|a| a.id).collect(),
            area_indexes: areas.iter().map(|a| a.index).collect(),
            enabled: server.enabled,
            active: server.active,
            public_ip: server.public_ip.clone(),
            public_web_socket_port: server.public_web_socket_port,
            web_socket_url: server.web_socket_url.clone(),
        })
    }
}

/// Componentwise mean of the group's coordinates, at fixed precision so a
/// recomputation over the same areas compares equal.
fn aggregate_position(areas: &[Area]) -> (Option<f64>, Option<f64>, Option<f64>) {
    if areas.is_empty() {
        return (None, None, None);
    }
    let n = areas.len() as f64;
    let mean = |pick: fn(&Area) -> f64| round3(areas.iter().map(pick).sum::<f64>() / n);
    (
        Some(mean(|a| a.x)),
        Some(mean(|a| a.y)),
        Some(mean(|a| a.z)),
    )
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Client connection URL, or `None` while the server is not reachable.
fn web_socket_url(
    tls: bool,
    enabled: bool,
    active: bool,
    public_ip: Option<&str>,
    port: Option<u16>,
    domain: Option<&str>,
) -> Option<String> {
    if !(enabled && active) {
        return None;
    }
    let (ip, port) = match (public_ip, port) {
        (Some(ip), Some(port)) => (ip, port),
        _ => return None,
    };
    if tls {
        domain.map(|domain| format!("wss://{domain}:{port}"))
    } else {
        Some(format!("ws://{ip}:{port}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::{FixedAreaLoad, IdleAreaLoad, OccupancyAreaGroups};
    use outpost_store::{MemoryStore, StoreError};
    use outpost_world::{RecordingNotificationSink, RegionId, Task, TaskId, TaskKind};
    use std::collections::HashMap;

    struct Fixture {
        store: Arc<MemoryStore>,
        sink: Arc<RecordingNotificationSink>,
        region: Region,
    }

    impl Fixture {
        async fn new(area_count: u32) -> Self {
            let store = Arc::new(MemoryStore::new());
            let region = store
                .insert_region(Region {
                    id: RegionId(0),
                    version: 0,
                    name: "Frontier".to_owned(),
                    map_name: "Frontier_Main".to_owned(),
                    x: 0.0,
                    y: 0.0,
                    z: 0.0,
                })
                .await
                .unwrap();
            for index in 0..area_count {
                store
                    .insert_area(Area {
                        id: AreaId(0),
                        version: 0,
                        region_id: region.id,
                        index,
                        name: format!("Area {index}"),
                        x: index as f64 * 1000.0,
                        y: 100.0,
                        z: 0.0,
                        size_x: 1000.0,
                        size_y: 1000.0,
                        size_z: 200.0,
                        server_id: None,
                    })
                    .await
                    .unwrap();
            }
            Self {
                store,
                sink: Arc::new(RecordingNotificationSink::new()),
                region,
            }
        }

        fn idle_reconciler(&self) -> ServerReconciler {
            ServerReconciler::new(
                self.store.clone(),
                Arc::new(OccupancyAreaGroups::new(Arc::new(IdleAreaLoad))),
                self.sink.clone(),
                ReconcilerSettings::default(),
            )
        }

        fn loaded_reconciler(&self, loads: HashMap<AreaId, u32>) -> ServerReconciler {
            ServerReconciler::new(
                self.store.clone(),
                Arc::new(OccupancyAreaGroups::new(Arc::new(FixedAreaLoad::new(loads)))),
                self.sink.clone(),
                ReconcilerSettings::default(),
            )
        }

        async fn add_server_task(&self, server_id: ServerId, identifier: &str) -> Task {
            self.store
                .insert_task(Task {
                    id: TaskId(0),
                    version: 0,
                    kind: TaskKind::Server {
                        server_id,
                        public_web_socket_port: Some(8890),
                    },
                    identifier: identifier.to_owned(),
                    name: None,
                    private_ip: Some("172.17.0.2".to_owned()),
                    public_ip: Some("203.0.113.9".to_owned()),
                    domain: None,
                    initiated: Some(Utc::now()),
                    seen: Some(Utc::now()),
                })
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_grow_creates_one_enabled_server_covering_both_areas() {
        let fx = Fixture::new(2).await;
        let events = fx.idle_reconciler().reconcile().await.unwrap();

        let servers = fx.store.servers().await.unwrap();
        assert_eq!(servers.len(), 1);
        let server = &servers[0];
        assert!(server.enabled);
        assert!(!server.active);
        assert_eq!(server.map_name, "Frontier_Main");
        // midpoint of x = 0 and x = 1000
        assert_eq!(server.x, Some(500.0));
        assert_eq!(server.y, Some(100.0));
        assert_eq!(server.z, Some(0.0));

        let areas = fx.store.areas_by_server(server.id).await.unwrap();
        assert_eq!(areas.len(), 2);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].server_id, server.id);
        assert_eq!(events[0].area_indexes, vec![0, 1]);
        assert_eq!(fx.sink.events().len(), 1);
    }

    #[tokio::test]
    async fn test_every_area_ends_up_on_an_enabled_server() {
        let fx = Fixture::new(5).await;
        fx.loaded_reconciler(HashMap::from([(AreaId(2), 40), (AreaId(4), 40)]))
            .reconcile()
            .await
            .unwrap();

        for area in fx.store.areas_in_region(fx.region.id).await.unwrap() {
            let server_id = area.server_id.expect("area left uncovered");
            let server = fx.store.server(server_id).await.unwrap().unwrap();
            assert!(server.enabled, "area {} on disabled server", area.index);
        }
    }

    #[tokio::test]
    async fn test_second_pass_changes_nothing() {
        let fx = Fixture::new(2).await;
        let reconciler = fx.idle_reconciler();

        reconciler.reconcile().await.unwrap();
        let before = fx.store.servers().await.unwrap();
        fx.sink.clear();

        let events = reconciler.reconcile().await.unwrap();
        assert!(events.is_empty());
        assert!(fx.sink.events().is_empty());
        // no version bump either: nothing was written
        assert_eq!(fx.store.servers().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_split_reuses_the_existing_server_and_creates_exactly_one() {
        let fx = Fixture::new(2).await;
        fx.idle_reconciler().reconcile().await.unwrap();
        let original = fx.store.servers().await.unwrap()[0].clone();

        // both areas now busy enough to need dedicated servers
        let events = fx
            .loaded_reconciler(HashMap::from([(AreaId(1), 40), (AreaId(2), 40)]))
            .reconcile()
            .await
            .unwrap();

        let servers = fx.store.servers().await.unwrap();
        assert_eq!(servers.len(), 2);
        assert!(servers.iter().any(|s| s.id == original.id));

        let kept = fx.store.areas_by_server(original.id).await.unwrap();
        assert_eq!(kept.len(), 1, "old server shrinks to one area");
        assert_eq!(kept[0].index, 0);

        let new_server = servers.iter().find(|s| s.id != original.id).unwrap();
        let moved = fx.store.areas_by_server(new_server.id).await.unwrap();
        assert_eq!(moved.len(), 1);
        assert_eq!(moved[0].index, 1);
        assert!(new_server.enabled);

        // both servers changed materially
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn test_shrink_to_zero_disables_servers_and_notifies_once_each() {
        let fx = Fixture::new(2).await;
        fx.loaded_reconciler(HashMap::from([(AreaId(1), 40), (AreaId(2), 40)]))
            .reconcile()
            .await
            .unwrap();
        assert_eq!(fx.store.servers().await.unwrap().len(), 2);
        fx.sink.clear();

        // all areas removed from the region
        for area in fx.store.areas_in_region(fx.region.id).await.unwrap() {
            fx.store.delete_area(area.id).await.unwrap();
        }

        let events = fx.idle_reconciler().reconcile().await.unwrap();
        assert_eq!(events.len(), 2);

        for server in fx.store.servers().await.unwrap() {
            assert!(!server.enabled);
            assert!(fx.store.areas_by_server(server.id).await.unwrap().is_empty());
            assert!(server.x.is_none());
        }
        assert_eq!(fx.sink.events().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_server_is_reused_before_creating_a_new_one() {
        let fx = Fixture::new(1).await;
        fx.idle_reconciler().reconcile().await.unwrap();
        let server = fx.store.servers().await.unwrap()[0].clone();

        // area disappears; the server goes idle
        let area = fx.store.areas_in_region(fx.region.id).await.unwrap()[0].clone();
        fx.store.delete_area(area.id).await.unwrap();
        fx.idle_reconciler().reconcile().await.unwrap();

        // a replacement area arrives
        fx.store
            .insert_area(Area {
                id: AreaId(0),
                version: 0,
                region_id: fx.region.id,
                index: 7,
                name: "Area 7".to_owned(),
                x: 0.0,
                y: 0.0,
                z: 0.0,
                size_x: 1000.0,
                size_y: 1000.0,
                size_z: 200.0,
                server_id: None,
            })
            .await
            .unwrap();

        fx.idle_reconciler().reconcile().await.unwrap();
        let servers = fx.store.servers().await.unwrap();
        assert_eq!(servers.len(), 1, "idle server reused, none created");
        assert_eq!(servers[0].id, server.id);
        assert!(servers[0].enabled);
    }

    #[tokio::test]
    async fn test_task_fields_flow_onto_the_server() {
        let fx = Fixture::new(1).await;
        fx.idle_reconciler().reconcile().await.unwrap();
        let server = fx.store.servers().await.unwrap()[0].clone();
        fx.add_server_task(server.id, "c0ffee").await;

        // the simulation reported startup out-of-band
        let mut row = fx.store.server(server.id).await.unwrap().unwrap();
        row.active = true;
        fx.store.save_server(row).await.unwrap();

        fx.idle_reconciler().reconcile().await.unwrap();
        let server = fx.store.server(server.id).await.unwrap().unwrap();
        assert!(server.active);
        assert_eq!(server.public_ip.as_deref(), Some("203.0.113.9"));
        assert_eq!(server.public_web_socket_port, Some(8890));
        assert_eq!(
            server.web_socket_url.as_deref(),
            Some("ws://203.0.113.9:8890")
        );
        assert!(server.seen.is_some());
    }

    #[tokio::test]
    async fn test_losing_the_task_clears_active_and_url() {
        let fx = Fixture::new(1).await;
        fx.idle_reconciler().reconcile().await.unwrap();
        let server_id = fx.store.servers().await.unwrap()[0].id;
        let task = fx.add_server_task(server_id, "c0ffee").await;

        let mut row = fx.store.server(server_id).await.unwrap().unwrap();
        row.active = true;
        fx.store.save_server(row).await.unwrap();
        fx.idle_reconciler().reconcile().await.unwrap();
        assert!(fx
            .store
            .server(server_id)
            .await
            .unwrap()
            .unwrap()
            .web_socket_url
            .is_some());

        // hosting stopped reporting the task; the refresh loop retired it
        fx.store.delete_task(task.id).await.unwrap();
        fx.sink.clear();

        let events = fx.idle_reconciler().reconcile().await.unwrap();
        let server = fx.store.server(server_id).await.unwrap().unwrap();
        assert!(!server.active);
        assert!(server.web_socket_url.is_none());
        assert!(server.public_ip.is_none());
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_tls_requires_a_domain_for_the_url() {
        let fx = Fixture::new(1).await;
        let reconciler = ServerReconciler::new(
            fx.store.clone(),
            Arc::new(OccupancyAreaGroups::new(Arc::new(IdleAreaLoad))),
            fx.sink.clone(),
            ReconcilerSettings {
                tls: true,
                retry: RetryPolicy::default(),
            },
        );
        reconciler.reconcile().await.unwrap();
        let server_id = fx.store.servers().await.unwrap()[0].id;
        let task = fx.add_server_task(server_id, "c0ffee").await;

        let mut row = fx.store.server(server_id).await.unwrap().unwrap();
        row.active = true;
        fx.store.save_server(row).await.unwrap();

        reconciler.reconcile().await.unwrap();
        let server = fx.store.server(server_id).await.unwrap().unwrap();
        assert!(server.web_socket_url.is_none(), "no domain bound yet");

        // the domain binder caught up
        let mut task = fx.store.task(task.id).await.unwrap().unwrap();
        task.domain = Some("1-server.outpost.example".to_owned());
        fx.store.save_task(task).await.unwrap();

        reconciler.reconcile().await.unwrap();
        let server = fx.store.server(server_id).await.unwrap().unwrap();
        assert_eq!(
            server.web_socket_url.as_deref(),
            Some("wss://1-server.outpost.example:8890")
        );
    }

    #[tokio::test]
    async fn test_pass_starts_from_current_state_after_concurrent_write() {
        let fx = Fixture::new(2).await;
        fx.idle_reconciler().reconcile().await.unwrap();
        let server = fx.store.servers().await.unwrap()[0].clone();

        // another process bumped the row since our last pass; the next pass
        // reads fresh rows and converges on top of the newer version
        let mut racing = server.clone();
        racing.seen = Some(Utc::now());
        fx.store.save_server(racing).await.unwrap();

        fx.add_server_task(server.id, "c0ffee").await;
        let result = fx.idle_reconciler().reconcile().await;
        assert!(result.is_ok());

        let server = fx.store.server(server.id).await.unwrap().unwrap();
        assert_eq!(server.public_ip.as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn test_aggregate_position_means_and_rounds() {
        let make = |x: f64, y: f64, z: f64| Area {
            id: AreaId(1),
            version: 0,
            region_id: RegionId(1),
            index: 0,
            name: String::new(),
            x,
            y,
            z,
            size_x: 1.0,
            size_y: 1.0,
            size_z: 1.0,
            server_id: None,
        };
        assert_eq!(aggregate_position(&[]), (None, None, None));

        let (x, y, z) = aggregate_position(&[make(0.0, 1.0, 2.0), make(1.0, 2.0, 3.0)]);
        assert_eq!((x, y, z), (Some(0.5), Some(1.5), Some(2.5)));

        let (x, _, _) = aggregate_position(&[make(0.0, 0.0, 0.0), make(0.0001, 0.0, 0.0)]);
        assert_eq!(x, Some(0.0), "positions compare at fixed precision");
    }

    #[test]
    fn test_web_socket_url_conditions() {
        assert_eq!(
            web_socket_url(false, true, true, Some("1.2.3.4"), Some(8890), None),
            Some("ws://1.2.3.4:8890".to_owned())
        );
        assert_eq!(
            web_socket_url(true, true, true, Some("1.2.3.4"), Some(8890), Some("d.example")),
            Some("wss://d.example:8890".to_owned())
        );
        // TLS without a domain: not reachable yet
        assert_eq!(
            web_socket_url(true, true, true, Some("1.2.3.4"), Some(8890), None),
            None
        );
        // not active, not enabled, or missing connectivity
        assert_eq!(
            web_socket_url(false, true, false, Some("1.2.3.4"), Some(8890), None),
            None
        );
        assert_eq!(
            web_socket_url(false, false, true, Some("1.2.3.4"), Some(8890), None),
            None
        );
        assert_eq!(web_socket_url(false, true, true, None, Some(8890), None), None);
        assert_eq!(
            web_socket_url(false, true, true, Some("1.2.3.4"), None, None),
            None
        );
    }

    #[tokio::test]
    async fn test_region_with_no_areas_reconciles_to_nothing() {
        let fx = Fixture::new(0).await;
        let events = fx.idle_reconciler().reconcile().await.unwrap();
        assert!(events.is_empty());
        assert!(fx.store.servers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_region_rows_are_not_invented() {
        // a store with no regions at all: the pass is a clean no-op
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let reconciler = ServerReconciler::new(
            store.clone(),
            Arc::new(OccupancyAreaGroups::new(Arc::new(IdleAreaLoad))),
            Arc::new(RecordingNotificationSink::new()),
            ReconcilerSettings::default(),
        );
        assert!(reconciler.reconcile().await.unwrap().is_empty());
        assert!(matches!(
            store.server(ServerId(1)).await,
            Ok(None) | Err(StoreError::NotFound { .. })
        ));
    }
}
