//! Server purge: eventually delete server rows nothing refers to anymore.
//!
//! Reconciliation never deletes servers - disabled rows stick around so
//! they can be reused when coverage grows again. This slow job is the
//! eventual cleanup: a server with no areas whose last sign of life is
//! older than the retention window goes away. Servers that never saw a
//! task and were never started are kept; age is only measured from an
//! actual activity stamp.

use crate::error::ManagerError;
use chrono::{Duration, Utc};
use outpost_store::{retry_transient, RetryPolicy, WorldStore};
use std::sync::Arc;
use tracing::{debug, trace};

/// Knobs for the purge job.
#[derive(Debug, Clone)]
pub struct PurgeSettings {
    /// How long an empty server may stay unused before deletion.
    pub retention: Duration,
    pub retry: RetryPolicy,
}

impl Default for PurgeSettings {
    fn default() -> Self {
        Self {
            retention: Duration::minutes(15),
            retry: RetryPolicy::default(),
        }
    }
}

/// Deletes long-unused, empty servers.
pub struct ServerPurge {
    store: Arc<dyn WorldStore>,
    settings: PurgeSettings,
}

impl ServerPurge {
    pub fn new(store: Arc<dyn WorldStore>, settings: PurgeSettings) -> Self {
        Self { store, settings }
    }

    /// Job entry point.
    pub async fn purge_servers(&self) -> Result<(), ManagerError> {
        retry_transient(self.settings.retry, || async {
            self.purge_servers_once().await
        })
        .await
    }

    async fn purge_servers_once(&self) -> Result<(), ManagerError> {
        trace!("Purging old servers...");
        let cutoff = Utc::now() - self.settings.retention;

        for server in self.store.servers().await? {
            if server.enabled {
                continue;
            }
            if !self.store.areas_by_server(server.id).await?.is_empty() {
                continue;
            }
            let Some(last_activity) = server.seen.or(server.initiated) else {
                continue;
            };
            if last_activity >= cutoff {
                continue;
            }

            debug!("Deleting old server {}", server.id);
            self.store.delete_server(server.id).await?;
        }

        Ok(())
    }
}
