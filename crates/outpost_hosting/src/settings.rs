//! Hosting configuration.
//!
//! One settings struct shared by every backend; which backend is built from
//! it is decided by [`HostingBackend`] at startup. The image markers and the
//! per-task environment payload mirror what the game-server containers
//! expect.

use serde::{Deserialize, Serialize};

fn default_public_address() -> String {
    "127.0.0.1".to_owned()
}

fn default_manager_host() -> String {
    "host.docker.internal".to_owned()
}

fn default_manager_image() -> String {
    "outpost_manager".to_owned()
}

fn default_kiosk_image() -> String {
    "outpost_kiosk".to_owned()
}

fn default_server_image() -> String {
    "outpost_server".to_owned()
}

fn default_port_base() -> u16 {
    8889
}

fn default_max_pawns() -> u32 {
    64
}

fn default_max_players() -> u32 {
    32
}

fn default_max_bots() -> u32 {
    16
}

/// Which hosting backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostingBackend {
    /// Whatever already runs on localhost stands in for every server.
    #[default]
    Local,
    /// Containers on a local container engine.
    Docker,
    /// Containers on a remote container engine with a public address.
    Cloud,
}

/// TLS material handed to launched server tasks.
///
/// Paths are read at launch time; when TLS is disabled the corresponding
/// environment variables are populated with a placeholder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsSettings {
    /// Whether clients connect over wss and tasks need certificates.
    #[serde(default)]
    pub enabled: bool,
    /// Path to the CA certificate handed to tasks.
    #[serde(default)]
    pub trust_certificate: String,
    /// Path to the server certificate.
    #[serde(default)]
    pub certificate: String,
    /// Path to the server certificate's private key.
    #[serde(default)]
    pub certificate_private_key: String,
}

/// Configuration for the hosting backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostingSettings {
    /// Backend selection.
    #[serde(default)]
    pub backend: HostingBackend,
    /// Container engine endpoint, e.g. `http://10.0.0.5:2375`.
    /// Empty means the platform-default local socket.
    #[serde(default)]
    pub engine_endpoint: String,
    /// Public address tasks are reachable on when the engine is remote.
    #[serde(default = "default_public_address")]
    pub public_address: String,
    /// Hostname launched tasks use to reach this manager.
    #[serde(default = "default_manager_host")]
    pub manager_host: String,
    /// Image name marker identifying manager containers.
    #[serde(default = "default_manager_image")]
    pub manager_image: String,
    /// Image name marker identifying kiosk containers.
    #[serde(default = "default_kiosk_image")]
    pub kiosk_image: String,
    /// Image name marker identifying game-server containers.
    #[serde(default = "default_server_image")]
    pub server_image: String,
    /// Public websocket ports are assigned as `base + server id`.
    #[serde(default = "default_port_base")]
    pub public_web_socket_port_base: u16,
    /// Capacity limits passed through to each launched server.
    #[serde(default = "default_max_pawns")]
    pub max_pawns: u32,
    #[serde(default = "default_max_players")]
    pub max_players: u32,
    #[serde(default = "default_max_bots")]
    pub max_bots: u32,
    /// Comma-separated feature flags passed through to each launched server.
    #[serde(default)]
    pub feature_flags: String,
    /// Password launched servers use to call back into the manager API.
    #[serde(default)]
    pub server_basic_auth_password: String,
    #[serde(default)]
    pub tls: TlsSettings,
}

impl Default for HostingSettings {
    fn default() -> Self {
        Self {
            backend: HostingBackend::Local,
            engine_endpoint: String::new(),
            public_address: default_public_address(),
            manager_host: default_manager_host(),
            manager_image: default_manager_image(),
            kiosk_image: default_kiosk_image(),
            server_image: default_server_image(),
            public_web_socket_port_base: default_port_base(),
            max_pawns: default_max_pawns(),
            max_players: default_max_players(),
            max_bots: default_max_bots(),
            feature_flags: String::new(),
            server_basic_auth_password: String::new(),
            tls: TlsSettings::default(),
        }
    }
}
