//! Task lifecycle decisions: start hosting tasks for enabled servers that
//! have none, stop tasks whose server no longer wants one.
//!
//! Task rows themselves are owned by the refresh loop; this loop only talks
//! to the hosting backend and stamps `Server::initiated`. The stamp is the
//! duplicate-start guard: between a start call and the poll that adopts the
//! new task there is no task row yet, and without the grace window every
//! launcher tick in that gap would start another copy.

use crate::error::ManagerError;
use chrono::{Duration, Utc};
use outpost_hosting::{Hosting, ServerLaunch};
use outpost_store::{retry_transient, RetryPolicy, StoreError, WorldStore};
use outpost_world::Server;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Knobs for the launcher.
#[derive(Debug, Clone)]
pub struct LauncherSettings {
    /// How long after a start request a server is left alone before the
    /// absence of a task row triggers another start. Should comfortably
    /// exceed the refresh poll interval.
    pub start_grace: Duration,
    pub retry: RetryPolicy,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            start_grace: Duration::seconds(90),
            retry: RetryPolicy::default(),
        }
    }
}

/// Reconciles the hosting environment against the servers' `enabled` flags.
pub struct TaskLauncher {
    store: Arc<dyn WorldStore>,
    hosting: Arc<dyn Hosting>,
    settings: LauncherSettings,
}

impl TaskLauncher {
    pub fn new(
        store: Arc<dyn WorldStore>,
        hosting: Arc<dyn Hosting>,
        settings: LauncherSettings,
    ) -> Self {
        Self {
            store,
            hosting,
            settings,
        }
    }

    /// Job entry point, retried on transient store contention. A hosting
    /// failure aborts the tick; rows keep their last-known state and the
    /// next tick retries against the live environment.
    pub async fn manage_tasks(&self) -> Result<(), ManagerError> {
        retry_transient(self.settings.retry, || async {
            self.manage_tasks_once().await
        })
        .await
    }

    async fn manage_tasks_once(&self) -> Result<(), ManagerError> {
        trace!("Managing server tasks...");

        for server in self.store.servers().await? {
            if !server.enabled {
                continue;
            }
            if self.store.server_task(server.id).await?.is_some() {
                continue;
            }
            if let Some(initiated) = server.initiated {
                if Utc::now() - initiated < self.settings.start_grace {
                    trace!(
                        "Server {} start still within grace window, not starting again",
                        server.id
                    );
                    continue;
                }
            }
            self.start_server_task(server).await?;
        }

        // server tasks whose server is gone or disabled get torn down; the
        // row disappears once the next poll stops reporting the identifier
        for task in self.store.tasks().await? {
            let Some(server_id) = task.server_id() else {
                continue;
            };
            let wanted = match self.store.server(server_id).await? {
                Some(server) => server.enabled,
                None => false,
            };
            if !wanted {
                debug!(
                    "Need to stop task {} for server {}",
                    task.identifier, server_id
                );
                self.hosting.stop_server_task(&task.identifier).await?;
            }
        }

        Ok(())
    }

    async fn start_server_task(&self, server: Server) -> Result<(), ManagerError> {
        let region = self
            .store
            .region(server.region_id)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "region",
                id: server.region_id.0,
            })?;
        let areas = self.store.areas_by_server(server.id).await?;

        let launch = ServerLaunch {
            server_id: server.id,
            region_id: region.id,
            map_name: server.map_name.clone(),
            area_indexes: areas.iter().map(|a| a.index).collect(),
        };

        info!("Need to start server {}", server.id);
        let snapshot = match self.hosting.start_server_task(&launch).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!("Failed to start server {}! {}", server.id, err);
                return Err(err.into());
            }
        };
        debug!(
            "Started task {} for server {}",
            snapshot.identifier, server.id
        );

        let mut server = server;
        server.initiated = Some(Utc::now());
        self.store.save_server(server).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use outpost_hosting::{HostingError, TaskSnapshot};
    use outpost_store::MemoryStore;
    use outpost_world::{Area, AreaId, Region, RegionId, ServerId, Task, TaskId, TaskKind};
    use std::sync::Mutex;

    /// Records start/stop calls without any real environment behind it.
    #[derive(Default)]
    struct StubHosting {
        started: Mutex<Vec<ServerLaunch>>,
        stopped: Mutex<Vec<String>>,
        fail_starts: bool,
    }

    #[async_trait]
    impl Hosting for StubHosting {
        async fn poll(&self) -> Result<Vec<TaskSnapshot>, HostingError> {
            Ok(Vec::new())
        }

        async fn start_server_task(
            &self,
            launch: &ServerLaunch,
        ) -> Result<TaskSnapshot, HostingError> {
            if self.fail_starts {
                return Err(HostingError::Backend("engine down".to_owned()));
            }
            self.started.lock().unwrap().push(launch.clone());
            Ok(TaskSnapshot {
                kind: TaskKind::Server {
                    server_id: launch.server_id,
                    public_web_socket_port: Some(8890),
                },
                identifier: format!("task-{}", launch.server_id),
                name: None,
                private_ip: None,
                public_ip: None,
            })
        }

        async fn stop_server_task(&self, identifier: &str) -> Result<(), HostingError> {
            self.stopped.lock().unwrap().push(identifier.to_owned());
            Ok(())
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        hosting: Arc<StubHosting>,
        launcher: TaskLauncher,
        region: Region,
    }

    impl Fixture {
        async fn new() -> Self {
            Self::with_hosting(StubHosting::default()).await
        }

        async fn with_hosting(hosting: StubHosting) -> Self {
            let store = Arc::new(MemoryStore::new());
            let hosting = Arc::new(hosting);
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
            let launcher = TaskLauncher::new(
                store.clone(),
                hosting.clone(),
                LauncherSettings::default(),
            );
            Self {
                store,
                hosting,
                launcher,
                region,
            }
        }

        /// An enabled server with one area, as the reconciler would leave it.
        async fn enabled_server(&self) -> Server {
            let server = self
                .store
                .insert_server(Server::draft(self.region.id, &self.region.map_name))
                .await
                .unwrap();
            self.store
                .insert_area(Area {
                    id: AreaId(0),
                    version: 0,
                    region_id: self.region.id,
                    index: 0,
                    name: "Area 0".to_owned(),
                    x: 0.0,
                    y: 0.0,
                    z: 0.0,
                    size_x: 1000.0,
                    size_y: 1000.0,
                    size_z: 200.0,
                    server_id: Some(server.id),
                })
                .await
                .unwrap();
            let mut server = server;
            server.enabled = true;
            self.store.save_server(server).await.unwrap()
        }

        async fn server_task_row(&self, server_id: ServerId, identifier: &str) {
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
                    private_ip: None,
                    public_ip: None,
                    domain: None,
                    initiated: Some(Utc::now()),
                    seen: Some(Utc::now()),
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_enabled_taskless_server_gets_started_once() {
        let fx = Fixture::new().await;
        let server = fx.enabled_server().await;

        fx.launcher.manage_tasks().await.unwrap();

        let started = fx.hosting.started.lock().unwrap().clone();
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].server_id, server.id);
        assert_eq!(started[0].map_name, "Frontier_Main");
        assert_eq!(started[0].area_indexes, vec![0]);

        // initiated stamped, so the next tick stays inside the grace window
        let server = fx.store.server(server.id).await.unwrap().unwrap();
        assert!(server.initiated.is_some());

        fx.launcher.manage_tasks().await.unwrap();
        assert_eq!(fx.hosting.started.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_expired_grace_window_allows_another_start() {
        let fx = Fixture::new().await;
        let server = fx.enabled_server().await;

        let mut row = fx.store.server(server.id).await.unwrap().unwrap();
        row.initiated = Some(Utc::now() - Duration::seconds(600));
        fx.store.save_server(row).await.unwrap();

        fx.launcher.manage_tasks().await.unwrap();
        assert_eq!(fx.hosting.started.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_server_with_a_task_row_is_left_alone() {
        let fx = Fixture::new().await;
        let server = fx.enabled_server().await;
        fx.server_task_row(server.id, "task-1").await;

        fx.launcher.manage_tasks().await.unwrap();
        assert!(fx.hosting.started.lock().unwrap().is_empty());
        assert!(fx.hosting.stopped.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_server_task_is_stopped() {
        let fx = Fixture::new().await;
        let server = fx.enabled_server().await;
        fx.server_task_row(server.id, "task-1").await;

        let mut row = fx.store.server(server.id).await.unwrap().unwrap();
        row.enabled = false;
        fx.store.save_server(row).await.unwrap();

        fx.launcher.manage_tasks().await.unwrap();
        assert_eq!(fx.hosting.stopped.lock().unwrap().clone(), vec!["task-1"]);
    }

    #[tokio::test]
    async fn test_orphan_task_for_unknown_server_is_stopped() {
        let fx = Fixture::new().await;
        fx.server_task_row(ServerId(99), "task-99").await;

        fx.launcher.manage_tasks().await.unwrap();
        assert_eq!(fx.hosting.stopped.lock().unwrap().clone(), vec!["task-99"]);
    }

    #[tokio::test]
    async fn test_start_failure_aborts_the_tick_without_stamping() {
        let fx = Fixture::with_hosting(StubHosting {
            fail_starts: true,
            ..Default::default()
        })
        .await;
        let server = fx.enabled_server().await;

        let result = fx.launcher.manage_tasks().await;
        assert!(result.is_err());

        // no stamp, so the next tick tries again immediately
        let server = fx.store.server(server.id).await.unwrap().unwrap();
        assert!(server.initiated.is_none());
    }
}
