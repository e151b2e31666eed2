//! Domain primitive types used across the dockfix workspace.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{CONTAINER_NAME_PREFIX, DEFAULT_IMAGE_TAG};

/// Runtime-assigned identifier of a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a new container ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the first twelve characters, the form the Docker CLI prints.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generates a unique name for a fixture container.
#[must_use]
pub fn generate_container_name() -> String {
    format!("{CONTAINER_NAME_PREFIX}-{}", uuid::Uuid::new_v4().simple())
}

/// A parsed image reference, split the way the pull API expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Repository, including any registry host and namespace.
    pub repository: String,
    /// Tag, or a digest such as `sha256:...` when `digest` is set.
    pub tag: String,
    /// Whether `tag` holds a content digest rather than a tag.
    pub digest: bool,
}

impl ImageRef {
    /// Parses an image reference such as `httpd:alpine`,
    /// `localhost:5000/app`, or `redis@sha256:...`.
    ///
    /// References without a tag or digest receive the `latest` tag.
    #[must_use]
    pub fn parse(reference: &str) -> Self {
        if let Some((repository, digest)) = reference.split_once('@') {
            return Self {
                repository: repository.to_string(),
                tag: digest.to_string(),
                digest: true,
            };
        }
        let name_start = reference.rfind('/').map_or(0, |i| i + 1);
        match reference[name_start..].rfind(':') {
            Some(i) => Self {
                repository: reference[..name_start + i].to_string(),
                tag: reference[name_start + i + 1..].to_string(),
                digest: false,
            },
            None => Self {
                repository: reference.to_string(),
                tag: DEFAULT_IMAGE_TAG.to_string(),
                digest: false,
            },
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = if self.digest { '@' } else { ':' };
        write!(f, "{}{sep}{}", self.repository, self.tag)
    }
}

/// A single host-side binding of a published container port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    /// Host interface the port is bound on, if reported.
    pub host_ip: Option<String>,
    /// Host port, as reported by the daemon (a decimal string).
    pub host_port: Option<String>,
}

/// Published ports keyed by `"<port>/<protocol>"`, e.g. `"9200/tcp"`.
///
/// A key may be present with no bindings when the image exposes a port
/// that is not published.
pub type PortMap = HashMap<String, Vec<PortBinding>>;

/// Externally reachable address of a published port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostAndPort {
    /// Host name or address of the daemon.
    pub host: String,
    /// Host port the container port is published on.
    pub port: u16,
}

impl HostAndPort {
    /// Creates a new address from its parts.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for HostAndPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Lifecycle state of a fixture run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FixtureState {
    /// Configuration is being assembled; nothing has run yet.
    Unconfigured,
    /// Building the runtime client and probing the daemon.
    Connecting,
    /// Pulling the image.
    Pulling,
    /// Creating the container.
    Creating,
    /// Starting the container.
    Starting,
    /// Waiting for the configured log snippet.
    AwaitingLog,
    /// The test body is executing.
    Running,
    /// Stopping and removing the container and closing the client.
    TearingDown,
    /// The run finished, successfully or by skipping.
    Done,
    /// The run failed.
    Errored,
}

impl FixtureState {
    /// Returns whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Errored)
    }
}

impl fmt::Display for FixtureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unconfigured => "unconfigured",
            Self::Connecting => "connecting",
            Self::Pulling => "pulling",
            Self::Creating => "creating",
            Self::Starting => "starting",
            Self::AwaitingLog => "awaiting-log",
            Self::Running => "running",
            Self::TearingDown => "tearing-down",
            Self::Done => "done",
            Self::Errored => "errored",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_ref_with_tag() {
        let r = ImageRef::parse("httpd:alpine");
        assert_eq!(r.repository, "httpd");
        assert_eq!(r.tag, "alpine");
        assert!(!r.digest);
    }

    #[test]
    fn image_ref_without_tag_defaults_to_latest() {
        let r = ImageRef::parse("itzg/elasticsearch");
        assert_eq!(r.repository, "itzg/elasticsearch");
        assert_eq!(r.tag, "latest");
        assert_eq!(r.to_string(), "itzg/elasticsearch:latest");
    }

    #[test]
    fn image_ref_registry_port_is_not_a_tag() {
        let r = ImageRef::parse("localhost:5000/team/app");
        assert_eq!(r.repository, "localhost:5000/team/app");
        assert_eq!(r.tag, "latest");

        let tagged = ImageRef::parse("localhost:5000/team/app:1.2");
        assert_eq!(tagged.repository, "localhost:5000/team/app");
        assert_eq!(tagged.tag, "1.2");
    }

    #[test]
    fn image_ref_with_digest() {
        let r = ImageRef::parse("redis@sha256:abcd");
        assert_eq!(r.repository, "redis");
        assert_eq!(r.tag, "sha256:abcd");
        assert!(r.digest);
        assert_eq!(r.to_string(), "redis@sha256:abcd");
    }

    #[test]
    fn container_id_short_form() {
        let id = ContainerId::new("0123456789abcdef0123");
        assert_eq!(id.short(), "0123456789ab");
        assert_eq!(ContainerId::new("abc").short(), "abc");
    }

    #[test]
    fn generated_names_are_unique_and_prefixed() {
        let a = generate_container_name();
        let b = generate_container_name();
        assert!(a.starts_with("dockfix-"));
        assert_ne!(a, b);
    }

    #[test]
    fn host_and_port_display() {
        assert_eq!(HostAndPort::new("localhost", 32768).to_string(), "localhost:32768");
        assert_eq!(HostAndPort::new("::1", 80).to_string(), "[::1]:80");
    }

    #[test]
    fn terminal_states() {
        assert!(FixtureState::Done.is_terminal());
        assert!(FixtureState::Errored.is_terminal());
        assert!(!FixtureState::Running.is_terminal());
        assert_eq!(FixtureState::AwaitingLog.to_string(), "awaiting-log");
    }
}
