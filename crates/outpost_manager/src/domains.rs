//! Domain binding: give every task with a public ip a resolvable name.
//!
//! Manager and kiosk tasks share fixed per-deployment domains; server tasks
//! get `{server id}-{server domain}`. Public ips are grouped per computed
//! domain before the upsert, so two tasks behind one name land in one
//! record. Each task's domain is then persisted in its own small save with
//! its own retry: a conflict on one row must not re-invoke the DNS provider
//! for the others, and a provider failure leaves `domain` unset, which is
//! exactly the trigger condition for the next tick.

use crate::dns::Dns;
use crate::error::ManagerError;
use outpost_store::{retry_transient, RetryPolicy, WorldStore};
use outpost_world::{Task, TaskKind};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Domain names for a deployment.
#[derive(Debug, Clone)]
pub struct DomainSettings {
    pub manager_domain: String,
    pub kiosk_domain: String,
    /// Suffix for server tasks; the bound name is `{server id}-{suffix}`.
    pub server_domain: String,
}

impl Default for DomainSettings {
    fn default() -> Self {
        Self {
            manager_domain: "manager.outpost.example".to_owned(),
            kiosk_domain: "kiosk.outpost.example".to_owned(),
            server_domain: "server.outpost.example".to_owned(),
        }
    }
}

/// Binds DNS names to tasks that have a public ip but no domain yet.
pub struct DomainBinder {
    store: Arc<dyn WorldStore>,
    dns: Arc<dyn Dns>,
    settings: DomainSettings,
    retry: RetryPolicy,
}

impl DomainBinder {
    pub fn new(
        store: Arc<dyn WorldStore>,
        dns: Arc<dyn Dns>,
        settings: DomainSettings,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            dns,
            settings,
            retry,
        }
    }

    /// Job entry point.
    pub async fn bind_domains(&self) -> Result<(), ManagerError> {
        trace!("Managing task domains...");

        // collect what needs binding, grouping public ips per target domain
        let mut pending: Vec<(Task, String)> = Vec::new();
        let mut domain_ips: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for task in self.store.tasks().await? {
            let Some(public_ip) = task.public_ip.clone() else {
                continue;
            };
            if task.domain.is_some() {
                continue;
            }
            let domain = self.determine_domain(&task);
            domain_ips.entry(domain.clone()).or_default().insert(public_ip);
            pending.push((task, domain));
        }

        // one upsert per domain; failures are logged and simply leave the
        // affected tasks unbound for the next tick
        let mut bound: HashSet<String> = HashSet::new();
        for (domain, ips) in &domain_ips {
            match self.dns.create_or_update(domain, ips).await {
                Ok(()) => {
                    bound.insert(domain.clone());
                }
                Err(err) => {
                    warn!("Failed to update DNS for {}: {}", domain, err);
                }
            }
        }

        // persist per task, each in its own optimistic save
        for (task, domain) in pending {
            if !bound.contains(&domain) {
                continue;
            }
            debug!("Binding task {} to domain {}", task.identifier, domain);
            let task_id = task.id;
            let domain = domain.clone();
            retry_transient(self.retry, || {
                let domain = domain.clone();
                async move {
                    match self.store.task(task_id).await? {
                        Some(mut row) => {
                            if row.domain.as_deref() != Some(domain.as_str()) {
                                row.domain = Some(domain);
                                self.store.save_task(row).await?;
                            }
                            Ok::<(), ManagerError>(())
                        }
                        // retired between the poll and now; nothing to bind
                        None => Ok(()),
                    }
                }
            })
            .await?;
        }

        Ok(())
    }

    fn determine_domain(&self, task: &Task) -> String {
        match task.kind {
            TaskKind::Manager => self.settings.manager_domain.clone(),
            TaskKind::Kiosk => self.settings.kiosk_domain.clone(),
            TaskKind::Server { server_id, .. } => {
                format!("{}-{}", server_id, self.settings.server_domain)
            }
        }
    }
}
