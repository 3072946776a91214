//! Main application logic and lifecycle management.
//!
//! This module contains the core `Application` struct that wires the world
//! store, hosting backend, control loops and notification fan-out together,
//! runs the periodic jobs, and handles graceful shutdown.

use crate::{
    cli::CliArgs,
    config::{AppConfig, GroupingPolicy},
    logging::display_banner,
    signals::{wait_for_shutdown, wait_for_shutdown_silent},
};
use outpost_hosting::{CloudHosting, DockerHosting, Hosting, HostingBackend, LocalHosting};
use outpost_manager::{
    scheduler, AreaGroups, DedicatedAreaGroups, DomainBinder, IdleAreaLoad, JobHandle, MemoryDns,
    OccupancyAreaGroups, ServerPurge, ServerReconciler, TaskLauncher, TaskReconciler,
};
use outpost_store::{MemoryStore, RetryPolicy, WorldStore};
use outpost_world::{Area, AreaId, BroadcastNotificationSink, Region, RegionId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Main application struct managing the manager's lifecycle.
///
/// # Architecture
///
/// * **Configuration Management**: Loads and validates configuration from
///   file and CLI overrides
/// * **World Seeding**: Initializes the store with the configured regions
///   and areas
/// * **Job Orchestration**: Spawns the fixed-interval control loops
/// * **Graceful Shutdown**: Handles termination signals and cleanup
pub struct Application {
    /// Loaded application configuration
    config: AppConfig,
    /// World state shared by every loop
    store: Arc<MemoryStore>,
    /// Hosting backend selected by configuration
    hosting: Arc<dyn Hosting>,
    /// Fan-out channel for server change events
    notifications: Arc<BroadcastNotificationSink>,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// Loads configuration, applies CLI overrides, validates settings, and
    /// builds the hosting backend.
    ///
    /// # Process
    ///
    /// 1. Load configuration from file (creating default if missing)
    /// 2. Apply command-line argument overrides
    /// 3. Validate merged configuration
    /// 4. Display startup banner
    /// 5. Build store, hosting backend and notification channel
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;
        info!(
            "✅ Configuration loaded successfully from {}",
            args.config_path.display()
        );

        // Apply CLI overrides
        if let Some(backend) = args.backend {
            config.hosting.backend = parse_backend(&backend)?;
        }

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }

        if args.json_logs {
            config.logging.json_format = true;
        }

        // Validate configuration
        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        } else {
            info!("✅ Configuration loaded and validated successfully");
        }

        display_banner();

        let store = Arc::new(MemoryStore::new());
        let hosting = build_hosting(&config)?;
        let notifications = Arc::new(BroadcastNotificationSink::new(1024));

        info!("🚀 Outpost Manager - world orchestration for game servers");
        info!(
            "📂 Config: {} | Hosting backend: {:?}",
            args.config_path.display(),
            config.hosting.backend
        );

        Ok(Self {
            config,
            store,
            hosting,
            notifications,
        })
    }

    /// Runs the application until a shutdown signal arrives.
    ///
    /// Seeds the world, spawns the control-loop jobs and monitoring tasks,
    /// waits for a termination signal, and shuts everything down in order.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting Outpost Manager Application");
        self.log_configuration_summary();

        self.seed_world().await?;

        // forward server change events into the log; the real client
        // transport subscribes the same way
        let mut updates = self.notifications.subscribe();
        let forwarder = tokio::spawn(async move {
            loop {
                match updates.recv().await {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(json) => info!("📣 Server update: {}", json),
                        Err(e) => error!("Failed to encode server update: {}", e),
                    },
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Event forwarder lagged, skipped {} updates", missed);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let jobs = self.spawn_jobs();
        for job in &jobs {
            info!("⏱️ Job {} scheduled", job.name());
        }

        // periodic world statistics
        let monitoring_store = self.store.clone();
        let monitoring = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                let servers = monitoring_store.servers().await.unwrap_or_default();
                let tasks = monitoring_store.tasks().await.unwrap_or_default();
                let enabled = servers.iter().filter(|s| s.enabled).count();
                let active = servers.iter().filter(|s| s.active).count();
                info!(
                    "📊 World Health - {} servers ({} enabled, {} active) | {} tasks",
                    servers.len(),
                    enabled,
                    active,
                    tasks.len()
                );
            }
        });

        info!("✅ Outpost Manager is now running!");
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        // Wait for shutdown signal
        wait_for_shutdown().await?;

        // merciless shutdown on a second signal
        tokio::spawn(async move {
            if let Err(e) = wait_for_shutdown_silent().await {
                error!("Failed to set up merciless shutdown signal handler: {e}");
                return;
            }
            warn!("Shutdown handler received again! I'll make this quick.");
            std::process::exit(1);
        });

        info!("🛑 Shutdown signal received, beginning graceful shutdown...");

        // Phase 1: stop the control loops; in-flight ticks included, the
        // next boot reconverges from current state anyway
        info!("⏳ Phase 1: Stopping control loops...");
        for job in &jobs {
            job.abort();
        }
        monitoring.abort();

        // Phase 2: let the event channel drain
        info!("📡 Phase 2: Draining notifications...");
        drop(self.notifications);
        let _ = tokio::time::timeout(Duration::from_secs(2), forwarder).await;

        // Final statistics
        log_final_statistics(&self.store).await;

        info!("✅ Outpost Manager shutdown complete");
        info!("👋 Thank you for using Outpost!");

        Ok(())
    }

    /// Seeds the store with the configured regions and areas.
    async fn seed_world(&self) -> Result<(), Box<dyn std::error::Error>> {
        for region_seed in &self.config.world.regions {
            let region = self
                .store
                .insert_region(Region {
                    id: RegionId(0),
                    version: 0,
                    name: region_seed.name.clone(),
                    map_name: region_seed.map_name.clone(),
                    x: region_seed.x,
                    y: region_seed.y,
                    z: region_seed.z,
                })
                .await?;

            for area_seed in &region_seed.areas {
                self.store
                    .insert_area(Area {
                        id: AreaId(0),
                        version: 0,
                        region_id: region.id,
                        index: area_seed.index,
                        name: area_seed.name.clone(),
                        x: area_seed.x,
                        y: area_seed.y,
                        z: area_seed.z,
                        size_x: area_seed.size_x,
                        size_y: area_seed.size_y,
                        size_z: area_seed.size_z,
                        server_id: None,
                    })
                    .await?;
            }

            info!(
                "🗺️ Seeded region {} ({}) with {} areas",
                region.id,
                region.name,
                region_seed.areas.len()
            );
        }
        Ok(())
    }

    /// Builds the control loops and spawns their job schedules.
    fn spawn_jobs(&self) -> Vec<JobHandle> {
        let store: Arc<dyn WorldStore> = self.store.clone();
        let grouping = self.build_grouping();

        let reconciler = Arc::new(ServerReconciler::new(
            store.clone(),
            grouping,
            self.notifications.clone(),
            self.config.to_reconciler_settings(),
        ));
        let launcher = Arc::new(TaskLauncher::new(
            store.clone(),
            self.hosting.clone(),
            self.config.to_launcher_settings(),
        ));
        let refresher = Arc::new(TaskReconciler::new(
            store.clone(),
            self.hosting.clone(),
            RetryPolicy::default(),
        ));
        let binder = Arc::new(DomainBinder::new(
            store.clone(),
            Arc::new(MemoryDns::new()),
            self.config.to_domain_settings(),
            RetryPolicy::default(),
        ));
        let purge = Arc::new(ServerPurge::new(store, self.config.to_purge_settings()));

        let jobs = &self.config.jobs;
        vec![
            scheduler::spawn(
                "reconcile_servers",
                Duration::from_secs(jobs.reconcile_servers_seconds),
                move || {
                    let reconciler = reconciler.clone();
                    async move { reconciler.reconcile().await.map(|_| ()) }
                },
            ),
            scheduler::spawn(
                "manage_server_tasks",
                Duration::from_secs(jobs.manage_server_tasks_seconds),
                move || {
                    let launcher = launcher.clone();
                    async move { launcher.manage_tasks().await }
                },
            ),
            scheduler::spawn(
                "refresh_tasks",
                Duration::from_secs(jobs.refresh_tasks_seconds),
                move || {
                    let refresher = refresher.clone();
                    async move { refresher.refresh_tasks().await }
                },
            ),
            scheduler::spawn(
                "manage_task_domains",
                Duration::from_secs(jobs.manage_task_domains_seconds),
                move || {
                    let binder = binder.clone();
                    async move { binder.bind_domains().await }
                },
            ),
            scheduler::spawn(
                "purge_servers",
                Duration::from_secs(jobs.purge_servers_seconds),
                move || {
                    let purge = purge.clone();
                    async move { purge.purge_servers().await }
                },
            ),
        ]
    }

    fn build_grouping(&self) -> Arc<dyn AreaGroups> {
        match self.config.manager.grouping {
            GroupingPolicy::Occupancy => Arc::new(OccupancyAreaGroups::with_thresholds(
                Arc::new(IdleAreaLoad),
                self.config.manager.merge_threshold,
                self.config.manager.dedicated_threshold,
            )),
            GroupingPolicy::Dedicated => Arc::new(DedicatedAreaGroups),
        }
    }

    /// Logs the configuration summary at startup.
    fn log_configuration_summary(&self) {
        info!("📋 Configuration Summary:");
        info!("  📦 Hosting backend: {:?}", self.config.hosting.backend);
        info!(
            "  🗺️ Seeded regions: {} | Grouping: {:?}",
            self.config.world.regions.len(),
            self.config.manager.grouping
        );
        info!(
            "  ⏱️ Job cadence: reconcile {}s | tasks {}s | refresh {}s | domains {}s | purge {}s",
            self.config.jobs.reconcile_servers_seconds,
            self.config.jobs.manage_server_tasks_seconds,
            self.config.jobs.refresh_tasks_seconds,
            self.config.jobs.manage_task_domains_seconds,
            self.config.jobs.purge_servers_seconds
        );
        info!(
            "  🌐 Server domain suffix: {}",
            self.config.manager.server_domain
        );
    }
}

fn parse_backend(value: &str) -> Result<HostingBackend, Box<dyn std::error::Error>> {
    match value {
        "local" => Ok(HostingBackend::Local),
        "docker" => Ok(HostingBackend::Docker),
        "cloud" => Ok(HostingBackend::Cloud),
        other => Err(format!("Unknown hosting backend: {other}").into()),
    }
}

fn build_hosting(config: &AppConfig) -> Result<Arc<dyn Hosting>, Box<dyn std::error::Error>> {
    let settings = config.hosting.clone();
    Ok(match settings.backend {
        HostingBackend::Local => Arc::new(LocalHosting::new(settings)),
        HostingBackend::Docker => Arc::new(DockerHosting::new(settings)?),
        HostingBackend::Cloud => Arc::new(CloudHosting::new(settings)?),
    })
}

/// Logs final statistics during shutdown.
async fn log_final_statistics(store: &Arc<MemoryStore>) {
    info!("📊 Final Statistics:");
    if let Ok(servers) = store.servers().await {
        info!(
            "  - Servers: {} ({} enabled)",
            servers.len(),
            servers.iter().filter(|s| s.enabled).count()
        );
    }
    if let Ok(tasks) = store.tasks().await {
        info!("  - Tasks still tracked: {}", tasks.len());
    }
}
