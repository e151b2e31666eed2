//! Runtime client abstraction.
//!
//! The fixture controller only ever talks to a container daemon through
//! [`RuntimeClient`], which keeps the lifecycle logic testable without a
//! daemon.

use std::sync::Arc;

use async_trait::async_trait;
use dockfix_common::config::FixtureConfig;
use dockfix_common::error::Result;
use dockfix_common::types::{ContainerId, ImageRef, PortMap, generate_container_name};
use futures::stream::BoxStream;

/// Progress events produced while pulling an image.
pub type ProgressStream = BoxStream<'static, Result<PullProgress>>;

/// Combined stdout/stderr output of a container, decoded as text.
pub type LogStream = BoxStream<'static, Result<String>>;

/// Summary of the daemon returned by the liveness probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaemonInfo {
    /// Node name of the daemon host.
    pub name: Option<String>,
    /// Daemon version string.
    pub server_version: Option<String>,
}

/// A single image pull progress event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullProgress {
    /// Layer the event refers to, if any.
    pub id: Option<String>,
    /// Human-readable status text.
    pub status: Option<String>,
    /// Rendered progress bar, present while a layer downloads.
    pub progress: Option<String>,
}

impl PullProgress {
    /// Renders the event as a log line, or `None` when it is not worth
    /// logging.
    ///
    /// Layer events carrying a progress bar are dropped, as are events
    /// with neither layer nor status.
    #[must_use]
    pub fn describe(&self, image: &str) -> Option<String> {
        let status = self.status.as_deref().unwrap_or_default();
        match (&self.id, &self.progress) {
            (Some(id), None) => Some(format!("{image} : {id} : {status}")),
            (Some(_), Some(_)) => None,
            (None, _) if status.is_empty() => None,
            (None, _) => Some(format!("{image} : {status}")),
        }
    }
}

/// What to create: an image, a command, and a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Unique container name.
    pub name: String,
    /// Image to create the container from.
    pub image: ImageRef,
    /// Command arguments; empty means the image default.
    pub command: Vec<String>,
    /// Publish every exposed port on an ephemeral host port.
    pub publish_all_ports: bool,
}

impl ContainerSpec {
    /// Builds the spec for a fixture run, with a freshly generated name.
    #[must_use]
    pub fn from_config(config: &FixtureConfig) -> Self {
        Self {
            name: generate_container_name(),
            image: ImageRef::parse(&config.image),
            command: config.command.clone(),
            publish_all_ports: true,
        }
    }
}

/// Operations the fixture controller needs from a container daemon.
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// Host name under which published ports are reachable.
    fn daemon_host(&self) -> &str;

    /// Performs a lightweight liveness query against the daemon.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::Unreachable`](dockfix_common::error::FixtureError::Unreachable)
    /// if the daemon does not answer.
    async fn probe(&self) -> Result<DaemonInfo>;

    /// Starts pulling an image and returns its progress events.
    ///
    /// A failed pull surfaces as an error item in the stream.
    fn pull_image(&self, image: &ImageRef) -> ProgressStream;

    /// Creates a container without starting it.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon rejects the container.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId>;

    /// Starts a created container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be started.
    async fn start_container(&self, id: &ContainerId) -> Result<()>;

    /// Inspects the container and returns its current published ports.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be inspected.
    async fn inspect_ports(&self, id: &ContainerId) -> Result<PortMap>;

    /// Follows the combined stdout/stderr output of the container.
    fn stream_logs(&self, id: &ContainerId) -> LogStream;

    /// Kills the container. A container that is not running is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon fails to kill a running container.
    async fn kill_container(&self, id: &ContainerId) -> Result<()>;

    /// Removes the container. A container that no longer exists is not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon fails to remove the container.
    async fn remove_container(&self, id: &ContainerId) -> Result<()>;

    /// Releases the client's connection resources.
    ///
    /// # Errors
    ///
    /// Returns an error if releasing the connection fails.
    async fn close(&self) -> Result<()>;
}

/// Builds runtime clients from a fixture configuration.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Builds a client. No request is sent to the daemon yet.
    ///
    /// # Errors
    ///
    /// Returns a configuration or certificate error when the explicit
    /// access settings are unusable, or a connection error when the
    /// client cannot be built.
    async fn connect(&self, config: &FixtureConfig) -> Result<Arc<dyn RuntimeClient>>;
}
