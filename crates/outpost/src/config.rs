//! Configuration management for the Outpost manager.
//!
//! This module handles loading, validation, and conversion of manager
//! configuration from TOML files and command-line arguments.

use outpost_hosting::{HostingBackend, HostingSettings};
use outpost_manager::{DomainSettings, LauncherSettings, PurgeSettings, ReconcilerSettings};
use outpost_store::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

fn default_manager_domain() -> String {
    "manager.outpost.example".to_owned()
}

fn default_kiosk_domain() -> String {
    "kiosk.outpost.example".to_owned()
}

fn default_server_domain() -> String {
    "server.outpost.example".to_owned()
}

fn default_merge_threshold() -> u32 {
    48
}

fn default_dedicated_threshold() -> u32 {
    32
}

fn default_start_grace_seconds() -> u64 {
    90
}

fn default_purge_retention_seconds() -> u64 {
    900
}

fn default_reconcile_servers_seconds() -> u64 {
    10
}

fn default_manage_server_tasks_seconds() -> u64 {
    10
}

fn default_refresh_tasks_seconds() -> u64 {
    30
}

fn default_manage_task_domains_seconds() -> u64 {
    10
}

fn default_purge_servers_seconds() -> u64 {
    60
}

fn default_area_size() -> f64 {
    1000.0
}

/// Application configuration loaded from TOML file.
///
/// Encompasses the control-loop knobs, hosting backend selection, job
/// cadence, logging, and the world seed the store is initialized from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Control-loop settings
    #[serde(default)]
    pub manager: ManagerSettings,
    /// Hosting backend settings
    #[serde(default)]
    pub hosting: HostingSettings,
    /// Job cadence settings
    #[serde(default)]
    pub jobs: JobSettings,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
    /// World seed applied to an empty store at startup
    #[serde(default)]
    pub world: WorldSettings,
}

/// Area grouping policy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingPolicy {
    /// Pack areas onto as few servers as occupancy allows.
    #[default]
    Occupancy,
    /// One server per area.
    Dedicated,
}

/// Control-loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerSettings {
    /// Domain bound to manager tasks.
    #[serde(default = "default_manager_domain")]
    pub manager_domain: String,
    /// Domain bound to kiosk tasks.
    #[serde(default = "default_kiosk_domain")]
    pub kiosk_domain: String,
    /// Domain suffix for server tasks (`{server id}-{suffix}`).
    #[serde(default = "default_server_domain")]
    pub server_domain: String,
    /// Which grouping policy partitions areas onto servers.
    #[serde(default)]
    pub grouping: GroupingPolicy,
    /// Occupancy at which a group stops absorbing further areas.
    #[serde(default = "default_merge_threshold")]
    pub merge_threshold: u32,
    /// Occupancy at which an area gets a dedicated server.
    #[serde(default = "default_dedicated_threshold")]
    pub dedicated_threshold: u32,
    /// Seconds to wait after a task start before the missing task row
    /// triggers another start.
    #[serde(default = "default_start_grace_seconds")]
    pub start_grace_seconds: u64,
    /// Seconds an empty, disabled server survives before being purged.
    #[serde(default = "default_purge_retention_seconds")]
    pub purge_retention_seconds: u64,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            manager_domain: default_manager_domain(),
            kiosk_domain: default_kiosk_domain(),
            server_domain: default_server_domain(),
            grouping: GroupingPolicy::default(),
            merge_threshold: default_merge_threshold(),
            dedicated_threshold: default_dedicated_threshold(),
            start_grace_seconds: default_start_grace_seconds(),
            purge_retention_seconds: default_purge_retention_seconds(),
        }
    }
}

/// Fixed intervals for the periodic jobs, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSettings {
    #[serde(default = "default_reconcile_servers_seconds")]
    pub reconcile_servers_seconds: u64,
    #[serde(default = "default_manage_server_tasks_seconds")]
    pub manage_server_tasks_seconds: u64,
    #[serde(default = "default_refresh_tasks_seconds")]
    pub refresh_tasks_seconds: u64,
    #[serde(default = "default_manage_task_domains_seconds")]
    pub manage_task_domains_seconds: u64,
    #[serde(default = "default_purge_servers_seconds")]
    pub purge_servers_seconds: u64,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            reconcile_servers_seconds: default_reconcile_servers_seconds(),
            manage_server_tasks_seconds: default_manage_server_tasks_seconds(),
            refresh_tasks_seconds: default_refresh_tasks_seconds(),
            manage_task_domains_seconds: default_manage_task_domains_seconds(),
            purge_servers_seconds: default_purge_servers_seconds(),
        }
    }
}

/// Logging system configuration.
///
/// Controls log output format, levels, and destination settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
    /// Optional file path for log output (None means stdout only)
    pub file_path: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            json_format: false,
            file_path: None,
        }
    }
}

/// World seed: the regions and areas an empty store starts with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldSettings {
    #[serde(default)]
    pub regions: Vec<RegionSeed>,
}

/// One region to create at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSeed {
    pub name: String,
    /// Map asset the game servers for this region load.
    pub map_name: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default)]
    pub areas: Vec<AreaSeed>,
}

/// One area within a seeded region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaSeed {
    /// Index within the region; unique per region.
    pub index: u32,
    pub name: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default = "default_area_size")]
    pub size_x: f64,
    #[serde(default = "default_area_size")]
    pub size_y: f64,
    #[serde(default = "default_area_size")]
    pub size_z: f64,
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at
    /// the specified path and returns the default configuration.
    pub async fn load_from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Settings for the server reconciler. TLS in the connection URL
    /// follows the hosting TLS material: when tasks are launched with
    /// certificates, clients must connect over wss.
    pub fn to_reconciler_settings(&self) -> ReconcilerSettings {
        ReconcilerSettings {
            tls: self.hosting.tls.enabled,
            retry: RetryPolicy::default(),
        }
    }

    /// Settings for the task launcher.
    pub fn to_launcher_settings(&self) -> LauncherSettings {
        LauncherSettings {
            start_grace: chrono::Duration::seconds(self.manager.start_grace_seconds as i64),
            retry: RetryPolicy::default(),
        }
    }

    /// Settings for the domain binder.
    pub fn to_domain_settings(&self) -> DomainSettings {
        DomainSettings {
            manager_domain: self.manager.manager_domain.clone(),
            kiosk_domain: self.manager.kiosk_domain.clone(),
            server_domain: self.manager.server_domain.clone(),
        }
    }

    /// Settings for the server purge job.
    pub fn to_purge_settings(&self) -> PurgeSettings {
        PurgeSettings {
            retention: chrono::Duration::seconds(self.manager.purge_retention_seconds as i64),
            retry: RetryPolicy::default(),
        }
    }

    /// Validates the configuration for consistency and correctness.
    pub fn validate(&self) -> Result<(), String> {
        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        // Validate domains
        if self.manager.manager_domain.is_empty()
            || self.manager.kiosk_domain.is_empty()
            || self.manager.server_domain.is_empty()
        {
            return Err("Domains cannot be empty".to_owned());
        }

        // Validate grouping thresholds
        if self.manager.merge_threshold == 0 {
            return Err("manager.merge_threshold must be greater than 0".to_owned());
        }
        if self.manager.dedicated_threshold == 0 {
            return Err("manager.dedicated_threshold must be greater than 0".to_owned());
        }

        // Validate job intervals
        let intervals = [
            self.jobs.reconcile_servers_seconds,
            self.jobs.manage_server_tasks_seconds,
            self.jobs.refresh_tasks_seconds,
            self.jobs.manage_task_domains_seconds,
            self.jobs.purge_servers_seconds,
        ];
        if intervals.contains(&0) {
            return Err("Job intervals must be greater than 0 seconds".to_owned());
        }

        // Validate hosting backend
        if self.hosting.backend == HostingBackend::Cloud && self.hosting.engine_endpoint.is_empty()
        {
            return Err("hosting.engine_endpoint is required for the cloud backend".to_owned());
        }
        if self.hosting.tls.enabled
            && (self.hosting.tls.trust_certificate.is_empty()
                || self.hosting.tls.certificate.is_empty()
                || self.hosting.tls.certificate_private_key.is_empty())
        {
            return Err("hosting.tls requires certificate and key paths when enabled".to_owned());
        }

        // Validate world seed
        for region in &self.world.regions {
            if region.name.is_empty() || region.map_name.is_empty() {
                return Err("Seeded regions need a name and a map_name".to_owned());
            }
            let mut indexes: Vec<u32> = region.areas.iter().map(|a| a.index).collect();
            indexes.sort_unstable();
            indexes.dedup();
            if indexes.len() != region.areas.len() {
                return Err(format!(
                    "Region {} seeds duplicate area indexes",
                    region.name
                ));
            }
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            manager: ManagerSettings::default(),
            hosting: HostingSettings::default(),
            jobs: JobSettings::default(),
            logging: LoggingSettings::default(),
            world: WorldSettings {
                regions: vec![RegionSeed {
                    name: "Frontier".to_owned(),
                    map_name: "Frontier_Main".to_owned(),
                    x: 0.0,
                    y: 0.0,
                    z: 0.0,
                    areas: vec![
                        AreaSeed {
                            index: 0,
                            name: "Area 0".to_owned(),
                            x: 0.0,
                            y: 0.0,
                            z: 0.0,
                            size_x: default_area_size(),
                            size_y: default_area_size(),
                            size_z: default_area_size(),
                        },
                        AreaSeed {
                            index: 1,
                            name: "Area 1".to_owned(),
                            x: 1000.0,
                            y: 0.0,
                            z: 0.0,
                            size_x: default_area_size(),
                            size_y: default_area_size(),
                            size_z: default_area_size(),
                        },
                    ],
                }],
            },
        }
    }
}
