//! Localhost passthrough backend.
//!
//! Treats whatever game server is already running on 127.0.0.1 as the task
//! for every server that has been "started". Useful when running the server
//! locally in the editor against a live manager.

use crate::settings::HostingSettings;
use crate::{Hosting, HostingError, ServerLaunch, TaskSnapshot};
use async_trait::async_trait;
use dashmap::DashSet;
use outpost_world::{ServerId, TaskKind};
use tracing::{debug, info, warn};

/// Manager/kiosk identifiers reported by this backend.
const MANAGER_IDENTIFIER: &str = "manager";
const KIOSK_IDENTIFIER: &str = "kiosk";

/// [`Hosting`] backend that pretends localhost hosts everything.
#[derive(Debug)]
pub struct LocalHosting {
    settings: HostingSettings,
    /// Servers a start has been requested for; each is reported as a
    /// synthetic localhost task on every poll until the process restarts.
    started: DashSet<ServerId>,
}

impl LocalHosting {
    pub fn new(settings: HostingSettings) -> Self {
        Self {
            settings,
            started: DashSet::new(),
        }
    }

    fn localhost_task(kind: TaskKind, identifier: &str, name: &str) -> TaskSnapshot {
        TaskSnapshot {
            kind,
            identifier: identifier.to_owned(),
            name: Some(name.to_owned()),
            private_ip: Some("127.0.0.1".to_owned()),
            public_ip: Some("127.0.0.1".to_owned()),
        }
    }
}

#[async_trait]
impl Hosting for LocalHosting {
    async fn poll(&self) -> Result<Vec<TaskSnapshot>, HostingError> {
        debug!("Polling local hosting...");

        let mut tasks = vec![
            Self::localhost_task(TaskKind::Manager, MANAGER_IDENTIFIER, "Host Manager Task"),
            Self::localhost_task(TaskKind::Kiosk, KIOSK_IDENTIFIER, "Host Kiosk Task"),
        ];

        let mut started: Vec<ServerId> = self.started.iter().map(|id| *id).collect();
        started.sort();

        for server_id in started {
            tasks.push(TaskSnapshot {
                kind: TaskKind::Server {
                    server_id,
                    public_web_socket_port: Some(self.settings.public_web_socket_port_base),
                },
                identifier: format!("local-task-{server_id}"),
                name: Some(format!("Local Server Task {server_id}")),
                private_ip: Some("127.0.0.1".to_owned()),
                public_ip: Some("127.0.0.1".to_owned()),
            });
        }

        Ok(tasks)
    }

    async fn start_server_task(&self, launch: &ServerLaunch) -> Result<TaskSnapshot, HostingError> {
        info!(
            "Assuming locally running game server is server {}",
            launch.server_id
        );
        self.started.insert(launch.server_id);

        Ok(TaskSnapshot {
            kind: TaskKind::Server {
                server_id: launch.server_id,
                public_web_socket_port: Some(self.settings.public_web_socket_port_base),
            },
            identifier: format!("local-task-{}", launch.server_id),
            name: Some(format!("Local Server Task {}", launch.server_id)),
            private_ip: Some("127.0.0.1".to_owned()),
            public_ip: Some("127.0.0.1".to_owned()),
        })
    }

    async fn stop_server_task(&self, identifier: &str) -> Result<(), HostingError> {
        // the local process is not ours to kill
        warn!("Ignoring request to stop local task {}", identifier);
        Ok(())
    }
}
