//! Remote container engine backend.
//!
//! The same engine protocol as [`DockerHosting`](crate::DockerHosting), but
//! against a remote endpoint whose containers are reachable on a configured
//! public address, and without assuming the engine host runs the
//! manager/kiosk - in a hosted deployment those run as containers
//! themselves and must be discovered like everything else.
//!
//! A managed container service with its own control-plane API would slot in
//! here behind the same [`Hosting`] contract.

use crate::docker::Engine;
use crate::settings::HostingSettings;
use crate::{Hosting, HostingError, ServerLaunch, TaskSnapshot};
use async_trait::async_trait;

/// [`Hosting`] backend for a remote, publicly addressable container engine.
#[derive(Debug)]
pub struct CloudHosting {
    engine: Engine,
}

impl CloudHosting {
    pub fn new(settings: HostingSettings) -> Result<Self, HostingError> {
        Ok(Self {
            engine: Engine::connect(settings)?,
        })
    }
}

#[async_trait]
impl Hosting for CloudHosting {
    async fn poll(&self) -> Result<Vec<TaskSnapshot>, HostingError> {
        let public_address = self.engine.settings().public_address.clone();
        self.engine.scan(&public_address, false).await
    }

    async fn start_server_task(&self, launch: &ServerLaunch) -> Result<TaskSnapshot, HostingError> {
        self.engine.launch(launch).await
    }

    async fn stop_server_task(&self, identifier: &str) -> Result<(), HostingError> {
        self.engine.remove(identifier).await
    }
}
