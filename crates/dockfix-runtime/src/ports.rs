//! Published port resolution.
//!
//! Host ports are assigned when the container starts, so lookups always
//! work from a fresh inspection rather than anything cached at creation.

use dockfix_common::constants::TCP_PROTOCOL;
use dockfix_common::error::{FixtureError, Result};
use dockfix_common::types::{ContainerId, HostAndPort, PortMap};

use crate::client::RuntimeClient;

/// Returns the port table key for an internal TCP port, e.g. `"80/tcp"`.
#[must_use]
pub fn port_key(port: u16) -> String {
    format!("{port}/{TCP_PROTOCOL}")
}

/// Looks up the host address of an internal TCP port in a port table.
///
/// Only the first binding of the port is consulted.
///
/// # Errors
///
/// Returns [`FixtureError::PortLookup`] if the port has no binding or the
/// bound host port is not a valid non-zero port number.
pub fn resolve_port(
    ports: &PortMap,
    port: u16,
    host: &str,
    id: &ContainerId,
) -> Result<HostAndPort> {
    let host_port = ports
        .get(&port_key(port))
        .and_then(|bindings| bindings.first())
        .and_then(|binding| binding.host_port.as_deref())
        .and_then(|p| p.trim().parse::<u16>().ok())
        .filter(|p| *p != 0)
        .ok_or_else(|| FixtureError::PortLookup {
            port,
            id: id.clone(),
        })?;
    Ok(HostAndPort::new(host, host_port))
}

/// Inspects the container and resolves the host address of `port`.
///
/// # Errors
///
/// Returns an inspection error if the daemon cannot be queried, or
/// [`FixtureError::PortLookup`] if the port is not published.
pub async fn resolve(
    client: &dyn RuntimeClient,
    id: &ContainerId,
    port: u16,
) -> Result<HostAndPort> {
    let ports = client.inspect_ports(id).await?;
    let address = resolve_port(&ports, port, client.daemon_host(), id)?;
    tracing::debug!(%id, port, address = %address, "resolved published port");
    Ok(address)
}
