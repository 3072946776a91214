//! Container engine backend.
//!
//! Enumerates containers on a Docker-compatible engine and matches them to
//! task kinds by image name marker. Server containers are recognized by the
//! `SERVER_ID=` environment marker set at launch; their public websocket
//! port is deterministic (`base + server id`), so the port is known without
//! asking the engine.

use crate::settings::HostingSettings;
use crate::{Hosting, HostingError, ServerLaunch, TaskSnapshot};
use async_trait::async_trait;
use bollard::container::{
    Config, ListContainersOptions, RemoveContainerOptions, StartContainerOptions,
};
use bollard::models::{HostConfig, PortBinding, PortMap};
use bollard::Docker;
use outpost_world::{ServerId, TaskKind};
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// Port the game server binds inside its container.
const INTERNAL_WEB_SOCKET_PORT: u16 = 8889;

/// Environment marker identifying the server a container was launched for.
const SERVER_ID_ENV: &str = "SERVER_ID=";

/// Engine connect/request timeout.
const ENGINE_TIMEOUT_SECS: u64 = 5;

impl From<bollard::errors::Error> for HostingError {
    fn from(err: bollard::errors::Error) -> Self {
        HostingError::Backend(err.to_string())
    }
}

/// Extracts the server id from a container's environment.
pub(crate) fn server_id_from_env(env: &[String]) -> Option<ServerId> {
    env.iter()
        .find_map(|entry| entry.strip_prefix(SERVER_ID_ENV))
        .and_then(|value| value.parse().ok())
        .map(ServerId)
}

/// Public websocket port for a server: `base + server id`.
pub(crate) fn public_port(
    settings: &HostingSettings,
    server_id: ServerId,
) -> Result<u16, HostingError> {
    u16::try_from(settings.public_web_socket_port_base as i64 + server_id.0).map_err(|_| {
        HostingError::InvalidMetadata(format!(
            "server id {} does not map to a valid public port",
            server_id
        ))
    })
}

/// Reads TLS material for a launch, escaping newlines so it survives as a
/// single environment variable.
async fn launch_material(path: &str) -> Result<String, HostingError> {
    tokio::fs::read_to_string(path)
        .await
        .map(|content| content.replace('\n', "\\n"))
        .map_err(|source| HostingError::LaunchMaterial {
            path: path.to_owned(),
            source,
        })
}

/// Environment payload for a launched server container.
pub(crate) async fn build_env(
    settings: &HostingSettings,
    launch: &ServerLaunch,
) -> Result<Vec<String>, HostingError> {
    let (ca_certificate, server_certificate, private_key) = if settings.tls.enabled {
        (
            launch_material(&settings.tls.trust_certificate).await?,
            launch_material(&settings.tls.certificate).await?,
            launch_material(&settings.tls.certificate_private_key).await?,
        )
    } else {
        (
            "unused".to_owned(),
            "unused".to_owned(),
            "unused".to_owned(),
        )
    };

    let area_indexes = launch
        .area_indexes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");

    Ok(vec![
        format!("MAP_NAME={}", launch.map_name),
        format!("SERVER_ID={}", launch.server_id),
        format!("MANAGER_HOST={}", settings.manager_host),
        format!("REGION_ID={}", launch.region_id),
        format!("INITIAL_AREA_INDEXES={area_indexes}"),
        format!("MAX_PAWNS={}", settings.max_pawns),
        format!("MAX_PLAYERS={}", settings.max_players),
        format!("MAX_BOTS={}", settings.max_bots),
        format!("FEATURE_FLAGS={}", settings.feature_flags),
        format!("CA_CERTIFICATE={ca_certificate}"),
        format!("SERVER_CERTIFICATE={server_certificate}"),
        format!("PRIVATE_KEY={private_key}"),
        format!(
            "SERVER_BASIC_AUTH_PASSWORD={}",
            settings.server_basic_auth_password
        ),
    ])
}

/// Shared engine plumbing for [`DockerHosting`] and
/// [`CloudHosting`](crate::CloudHosting); the two differ only in which
/// public address tasks are reachable on and whether the engine host is
/// assumed to run the manager/kiosk.
#[derive(Debug)]
pub(crate) struct Engine {
    docker: Docker,
    settings: HostingSettings,
}

impl Engine {
    pub(crate) fn connect(settings: HostingSettings) -> Result<Self, HostingError> {
        let docker = if settings.engine_endpoint.is_empty() {
            Docker::connect_with_local_defaults()?
        } else {
            Docker::connect_with_http(
                &settings.engine_endpoint,
                ENGINE_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            )?
        };
        Ok(Self { docker, settings })
    }

    pub(crate) fn settings(&self) -> &HostingSettings {
        &self.settings
    }

    /// Enumerates running containers into task snapshots.
    ///
    /// With `assume_host_defaults`, synthetic manager/kiosk entries are
    /// reported unless real containers for them are found - the engine host
    /// itself is then taken to run those processes.
    pub(crate) async fn scan(
        &self,
        public_ip: &str,
        assume_host_defaults: bool,
    ) -> Result<Vec<TaskSnapshot>, HostingError> {
        debug!("Polling container engine...");

        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions::<String>::default()))
            .await?;
        trace!("containers: {:?}", containers);

        let mut tasks = Vec::new();
        let mut found_manager = false;
        let mut found_kiosk = false;

        for container in containers {
            let Some(container_id) = container.id.clone() else {
                continue;
            };
            let image = container.image.clone().unwrap_or_default();

            let inspected = self.docker.inspect_container(&container_id, None).await?;
            let name = inspected
                .name
                .clone()
                .map(|n| n.trim_start_matches('/').to_owned());

            let Some(private_ip) = inspected
                .network_settings
                .as_ref()
                .and_then(|ns| ns.networks.as_ref())
                .and_then(|networks| networks.get("bridge"))
                .and_then(|bridge| bridge.ip_address.clone())
            else {
                continue;
            };

            if image.contains(&self.settings.manager_image) {
                found_manager = true;
                tasks.push(TaskSnapshot {
                    kind: TaskKind::Manager,
                    identifier: container_id,
                    name,
                    private_ip: Some(private_ip),
                    public_ip: Some(public_ip.to_owned()),
                });
            } else if image.contains(&self.settings.kiosk_image) {
                found_kiosk = true;
                tasks.push(TaskSnapshot {
                    kind: TaskKind::Kiosk,
                    identifier: container_id,
                    name,
                    private_ip: Some(private_ip),
                    public_ip: Some(public_ip.to_owned()),
                });
            } else if image.contains(&self.settings.server_image) {
                let env = inspected
                    .config
                    .as_ref()
                    .and_then(|c| c.env.as_deref())
                    .unwrap_or(&[]);
                match server_id_from_env(env) {
                    Some(server_id) => {
                        let port = public_port(&self.settings, server_id)?;
                        tasks.push(TaskSnapshot {
                            kind: TaskKind::Server {
                                server_id,
                                public_web_socket_port: Some(port),
                            },
                            identifier: container_id,
                            name,
                            private_ip: Some(private_ip),
                            public_ip: Some(public_ip.to_owned()),
                        });
                    }
                    None => {
                        warn!(
                            "Server container {} carries no usable SERVER_ID marker, skipping",
                            container_id
                        );
                    }
                }
            }
        }

        if assume_host_defaults {
            if !found_kiosk {
                tasks.insert(
                    0,
                    TaskSnapshot {
                        kind: TaskKind::Kiosk,
                        identifier: "kiosk".to_owned(),
                        name: Some("Host Kiosk Task".to_owned()),
                        private_ip: Some(self.settings.manager_host.clone()),
                        public_ip: Some(public_ip.to_owned()),
                    },
                );
            }
            if !found_manager {
                tasks.insert(
                    0,
                    TaskSnapshot {
                        kind: TaskKind::Manager,
                        identifier: "manager".to_owned(),
                        name: Some("Host Manager Task".to_owned()),
                        private_ip: Some(self.settings.manager_host.clone()),
                        public_ip: Some(public_ip.to_owned()),
                    },
                );
            }
        }

        Ok(tasks)
    }

    /// Creates and starts a server container for the launch payload.
    pub(crate) async fn launch(&self, launch: &ServerLaunch) -> Result<TaskSnapshot, HostingError> {
        debug!("Starting container for server {}", launch.server_id);

        let port = public_port(&self.settings, launch.server_id)?;
        let env = build_env(&self.settings, launch).await?;

        let container_port = format!("{INTERNAL_WEB_SOCKET_PORT}/tcp");

        let mut port_bindings: PortMap = HashMap::new();
        port_bindings.insert(
            container_port.clone(),
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_owned()),
                host_port: Some(port.to_string()),
            }]),
        );

        let mut exposed_ports = HashMap::new();
        exposed_ports.insert(container_port, HashMap::new());

        let config = Config {
            image: Some(format!("{}:latest", self.settings.server_image)),
            env: Some(env),
            exposed_ports: Some(exposed_ports),
            host_config: Some(HostConfig {
                port_bindings: Some(port_bindings),
                auto_remove: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container::<String, String>(None, config)
            .await?;
        for warning in &created.warnings {
            warn!("Engine warning creating task for server {}: {}", launch.server_id, warning);
        }

        self.docker
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await?;

        let inspected = self.docker.inspect_container(&created.id, None).await?;

        Ok(TaskSnapshot {
            kind: TaskKind::Server {
                server_id: launch.server_id,
                public_web_socket_port: Some(port),
            },
            identifier: created.id,
            name: inspected
                .name
                .map(|n| n.trim_start_matches('/').to_owned()),
            private_ip: None,
            public_ip: None,
        })
    }

    /// Force-removes a container; an identifier the engine no longer knows
    /// is a no-op.
    pub(crate) async fn remove(&self, identifier: &str) -> Result<(), HostingError> {
        let result = self
            .docker
            .remove_container(
                identifier,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                debug!("Task {} already gone from engine", identifier);
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// [`Hosting`] backend for a local container engine. Containers are
/// reachable on 127.0.0.1 and the engine host is assumed to run the
/// manager/kiosk unless containers for them are found.
#[derive(Debug)]
pub struct DockerHosting {
    engine: Engine,
}

impl DockerHosting {
    pub fn new(settings: HostingSettings) -> Result<Self, HostingError> {
        Ok(Self {
            engine: Engine::connect(settings)?,
        })
    }
}

#[async_trait]
impl Hosting for DockerHosting {
    async fn poll(&self) -> Result<Vec<TaskSnapshot>, HostingError> {
        self.engine.scan("127.0.0.1", true).await
    }

    async fn start_server_task(&self, launch: &ServerLaunch) -> Result<TaskSnapshot, HostingError> {
        self.engine.launch(launch).await
    }

    async fn stop_server_task(&self, identifier: &str) -> Result<(), HostingError> {
        self.engine.remove(identifier).await
    }
}
