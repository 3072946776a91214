//! Task refresh: keep the task table equal to what the hosting environment
//! actually reports.
//!
//! Runs on its own cadence, independent of server reconciliation. Each tick
//! polls the backend, finds-or-creates rows by identifier, copies over any
//! changed fields, stamps `seen`, and finally retires every previously-seen
//! row whose identifier the backend no longer reports. This loop is the
//! sole writer of task rows; everything else only reads them.

use crate::error::ManagerError;
use chrono::Utc;
use outpost_hosting::{Hosting, TaskSnapshot};
use outpost_store::{retry_transient, RetryPolicy, WorldStore};
use outpost_world::{Task, TaskId};
use std::sync::Arc;
use tracing::{debug, trace};

/// Reconciles task rows against hosting polls.
pub struct TaskReconciler {
    store: Arc<dyn WorldStore>,
    hosting: Arc<dyn Hosting>,
    retry: RetryPolicy,
}

impl TaskReconciler {
    pub fn new(store: Arc<dyn WorldStore>, hosting: Arc<dyn Hosting>, retry: RetryPolicy) -> Self {
        Self {
            store,
            hosting,
            retry,
        }
    }

    /// Job entry point, retried on transient store contention. A failed
    /// poll aborts the tick and leaves all rows as last-known.
    pub async fn refresh_tasks(&self) -> Result<(), ManagerError> {
        retry_transient(self.retry, || async { self.refresh_tasks_once().await }).await
    }

    async fn refresh_tasks_once(&self) -> Result<(), ManagerError> {
        trace!("Refreshing tasks...");

        let snapshots = self.hosting.poll().await?;
        debug!("Hosting reported {} tasks", snapshots.len());

        let seen = Utc::now();
        let mut reported: Vec<String> = Vec::with_capacity(snapshots.len());

        for snapshot in snapshots {
            reported.push(snapshot.identifier.clone());
            self.absorb_snapshot(snapshot, seen).await?;
        }

        let retired = self.store.delete_tasks_not_reported(&reported).await?;
        if retired > 0 {
            debug!("Retired {} tasks no longer reported by hosting", retired);
        }

        Ok(())
    }

    async fn absorb_snapshot(
        &self,
        snapshot: TaskSnapshot,
        seen: chrono::DateTime<Utc>,
    ) -> Result<(), ManagerError> {
        match self.store.task_by_identifier(&snapshot.identifier).await? {
            Some(mut task) => {
                // field-by-field, only on difference; the kind carries the
                // server id and public port for server tasks
                if task.kind != snapshot.kind {
                    task.kind = snapshot.kind;
                }
                if task.name != snapshot.name {
                    task.name = snapshot.name;
                }
                if task.private_ip != snapshot.private_ip {
                    task.private_ip = snapshot.private_ip;
                }
                if task.public_ip != snapshot.public_ip {
                    task.public_ip = snapshot.public_ip;
                }
                task.seen = Some(seen);
                self.store.save_task(task).await?;
            }
            None => {
                debug!(
                    "Adopting new {} task {}",
                    snapshot.kind.label(),
                    snapshot.identifier
                );
                self.store
                    .insert_task(Task {
                        id: TaskId(0),
                        version: 0,
                        kind: snapshot.kind,
                        identifier: snapshot.identifier,
                        name: snapshot.name,
                        private_ip: snapshot.private_ip,
                        public_ip: snapshot.public_ip,
                        domain: None,
                        initiated: Some(seen),
                        seen: Some(seen),
                    })
                    .await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use outpost_hosting::HostingError;
    use outpost_store::MemoryStore;
    use outpost_world::{ServerId, TaskKind};
    use std::sync::Mutex;

    /// Poll results are whatever the test put in; starts are unsupported.
    #[derive(Default)]
    struct ScriptedHosting {
        snapshots: Mutex<Vec<TaskSnapshot>>,
        fail_polls: bool,
    }

    impl ScriptedHosting {
        fn set(&self, snapshots: Vec<TaskSnapshot>) {
            *self.snapshots.lock().unwrap() = snapshots;
        }
    }

    #[async_trait]
    impl Hosting for ScriptedHosting {
        async fn poll(&self) -> Result<Vec<TaskSnapshot>, HostingError> {
            if self.fail_polls {
                return Err(HostingError::Backend("engine down".to_owned()));
            }
            Ok(self.snapshots.lock().unwrap().clone())
        }

        async fn start_server_task(
            &self,
            _launch: &outpost_hosting::ServerLaunch,
        ) -> Result<TaskSnapshot, HostingError> {
            unreachable!("refresh never starts tasks")
        }

        async fn stop_server_task(&self, _identifier: &str) -> Result<(), HostingError> {
            unreachable!("refresh never stops tasks")
        }
    }

    fn manager_snapshot() -> TaskSnapshot {
        TaskSnapshot {
            kind: TaskKind::Manager,
            identifier: "manager".to_owned(),
            name: Some("Host Manager Task".to_owned()),
            private_ip: Some("10.0.0.2".to_owned()),
            public_ip: Some("203.0.113.1".to_owned()),
        }
    }

    fn server_snapshot(server_id: i64, identifier: &str) -> TaskSnapshot {
        TaskSnapshot {
            kind: TaskKind::Server {
                server_id: ServerId(server_id),
                public_web_socket_port: Some(8889 + server_id as u16),
            },
            identifier: identifier.to_owned(),
            name: Some(format!("server-{server_id}")),
            private_ip: Some("172.17.0.3".to_owned()),
            public_ip: Some("203.0.113.1".to_owned()),
        }
    }

    fn fixture() -> (Arc<MemoryStore>, Arc<ScriptedHosting>, TaskReconciler) {
        let store = Arc::new(MemoryStore::new());
        let hosting = Arc::new(ScriptedHosting::default());
        let reconciler =
            TaskReconciler::new(store.clone(), hosting.clone(), RetryPolicy::default());
        (store, hosting, reconciler)
    }

    async fn identifiers(store: &MemoryStore) -> Vec<String> {
        store
            .tasks()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.identifier)
            .collect()
    }

    #[tokio::test]
    async fn test_table_converges_to_exactly_the_poll_set() {
        let (store, hosting, reconciler) = fixture();

        hosting.set(vec![
            manager_snapshot(),
            server_snapshot(1, "c1"),
            server_snapshot(2, "c2"),
        ]);
        reconciler.refresh_tasks().await.unwrap();
        assert_eq!(identifiers(&store).await, vec!["manager", "c1", "c2"]);

        // c1 disappears, c3 appears
        hosting.set(vec![
            manager_snapshot(),
            server_snapshot(2, "c2"),
            server_snapshot(3, "c3"),
        ]);
        reconciler.refresh_tasks().await.unwrap();
        assert_eq!(identifiers(&store).await, vec!["manager", "c2", "c3"]);
    }

    #[tokio::test]
    async fn test_changed_fields_are_copied_over() {
        let (store, hosting, reconciler) = fixture();
        hosting.set(vec![server_snapshot(1, "c1")]);
        reconciler.refresh_tasks().await.unwrap();

        let mut updated = server_snapshot(1, "c1");
        updated.public_ip = Some("203.0.113.77".to_owned());
        hosting.set(vec![updated]);
        reconciler.refresh_tasks().await.unwrap();

        let task = store.task_by_identifier("c1").await.unwrap().unwrap();
        assert_eq!(task.public_ip.as_deref(), Some("203.0.113.77"));
        assert_eq!(task.public_web_socket_port(), Some(8890));
    }

    #[tokio::test]
    async fn test_seen_is_stamped_each_poll_and_domain_survives() {
        let (store, hosting, reconciler) = fixture();
        hosting.set(vec![manager_snapshot()]);
        reconciler.refresh_tasks().await.unwrap();

        // the domain binder set a domain between polls
        let mut task = store.task_by_identifier("manager").await.unwrap().unwrap();
        task.domain = Some("manager.outpost.example".to_owned());
        store.save_task(task).await.unwrap();

        reconciler.refresh_tasks().await.unwrap();
        let task = store.task_by_identifier("manager").await.unwrap().unwrap();
        assert_eq!(task.domain.as_deref(), Some("manager.outpost.example"));
        assert!(task.seen.is_some());
    }

    #[tokio::test]
    async fn test_failed_poll_leaves_rows_untouched() {
        let (store, hosting, reconciler) = fixture();
        hosting.set(vec![manager_snapshot(), server_snapshot(1, "c1")]);
        reconciler.refresh_tasks().await.unwrap();

        let hosting_down = Arc::new(ScriptedHosting {
            snapshots: Mutex::new(Vec::new()),
            fail_polls: true,
        });
        let broken = TaskReconciler::new(store.clone(), hosting_down, RetryPolicy::default());

        assert!(broken.refresh_tasks().await.is_err());
        // nothing deleted, nothing changed
        assert_eq!(identifiers(&store).await, vec!["manager", "c1"]);
    }

    #[tokio::test]
    async fn test_empty_poll_retires_everything_seen() {
        let (store, hosting, reconciler) = fixture();
        hosting.set(vec![manager_snapshot(), server_snapshot(1, "c1")]);
        reconciler.refresh_tasks().await.unwrap();

        hosting.set(Vec::new());
        reconciler.refresh_tasks().await.unwrap();
        assert!(identifiers(&store).await.is_empty());
    }
}
