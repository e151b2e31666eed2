//! Handle to the container a test body runs against.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use dockfix_common::error::{FixtureError, Result};
use dockfix_common::types::{ContainerId, HostAndPort};
use dockfix_runtime::client::RuntimeClient;
use dockfix_runtime::ports;

/// The started container, handed to the test body.
///
/// Cheap to clone. Queries go to the daemon each time because host ports
/// are only final once the container runs; the handle stops being useful
/// once the run has torn the container down.
#[derive(Clone)]
pub struct RunningContainer {
    client: Arc<dyn RuntimeClient>,
    id: ContainerId,
}

impl RunningContainer {
    pub(crate) fn new(client: Arc<dyn RuntimeClient>, id: ContainerId) -> Self {
        Self { client, id }
    }

    /// Returns the runtime-assigned container ID.
    #[must_use]
    pub const fn id(&self) -> &ContainerId {
        &self.id
    }

    /// Resolves where the internal TCP `port` is published on the host.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::PortLookup`] if the port is not published,
    /// or an inspection error if the daemon cannot be queried.
    pub async fn resolve(&self, port: u16) -> Result<HostAndPort> {
        ports::resolve(self.client.as_ref(), &self.id, port).await
    }

    /// Resolves the internal TCP `port` as a `"host:port"` string.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve).
    pub async fn address(&self, port: u16) -> Result<String> {
        Ok(self.resolve(port).await?.to_string())
    }

    /// Resolves the internal TCP `port` to a socket address, looking the
    /// daemon host name up with the system resolver.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve), plus [`FixtureError::Resolve`]
    /// if the host name does not resolve.
    pub async fn socket_addr(&self, port: u16) -> Result<SocketAddr> {
        let address = self.address(port).await?;
        let mut addrs = tokio::net::lookup_host(address.as_str())
            .await
            .map_err(|source| FixtureError::Resolve {
                address: address.clone(),
                source,
            })?;
        addrs.next().ok_or_else(|| FixtureError::Resolve {
            address: address.clone(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses"),
        })
    }
}

impl fmt::Debug for RunningContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunningContainer")
            .field("id", &self.id)
            .field("host", &self.client.daemon_host())
            .finish()
    }
}
