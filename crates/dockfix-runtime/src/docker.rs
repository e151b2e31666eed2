//! Docker implementation of [`RuntimeClient`], backed by `bollard`.
//!
//! Endpoint resolution follows two modes. With neither an explicit
//! endpoint nor a certificate directory configured, the client is built
//! from the ambient `DOCKER_*` environment. Otherwise the explicit settings
//! are used, and a certificate directory that cannot be loaded fails the
//! fixture before any request reaches the daemon.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, KillContainerOptions, LogsOptions,
    RemoveContainerOptions, StartContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use bollard::{API_DEFAULT_VERSION, Docker};
use dockfix_common::config::FixtureConfig;
use dockfix_common::constants::{
    CA_CERT_FILE, CLIENT_CERT_FILE, CLIENT_KEY_FILE, DAEMON_REQUEST_TIMEOUT_SECS,
    DEFAULT_DAEMON_HOST, DEFAULT_TLS_ENDPOINT, ENV_DOCKER_HOST,
};
use dockfix_common::error::{FixtureError, Result};
use dockfix_common::types::{ContainerId, ImageRef, PortBinding, PortMap};
use futures::StreamExt;

use crate::client::{
    Connector, ContainerSpec, DaemonInfo, LogStream, ProgressStream, PullProgress, RuntimeClient,
};

/// Client certificate files found in a certificate directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificates {
    /// Certificate authority (`ca.pem`).
    pub ca: PathBuf,
    /// Client certificate (`cert.pem`).
    pub cert: PathBuf,
    /// Client private key (`key.pem`).
    pub key: PathBuf,
}

impl Certificates {
    /// Locates the certificate files inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::Certificates`] if `dir` is not a directory
    /// or any of the three files is missing.
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(FixtureError::Certificates {
                path: dir.to_path_buf(),
                message: "not a directory".to_string(),
            });
        }
        let file = |name: &str| {
            let path = dir.join(name);
            if path.is_file() {
                Ok(path)
            } else {
                Err(FixtureError::Certificates {
                    path: dir.to_path_buf(),
                    message: format!("{name} not found"),
                })
            }
        };
        Ok(Self {
            ca: file(CA_CERT_FILE)?,
            cert: file(CLIENT_CERT_FILE)?,
            key: file(CLIENT_KEY_FILE)?,
        })
    }
}

/// How a client reaches the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonAccess {
    /// Use the `DOCKER_*` environment, as the Docker CLI does.
    Ambient {
        /// Value of `DOCKER_HOST` at resolution time.
        docker_host: Option<String>,
    },
    /// Use an explicitly configured endpoint.
    Explicit {
        /// Endpoint URI, e.g. `tcp://build-host:2376`.
        endpoint: String,
        /// TLS client certificates, if configured.
        certificates: Option<Certificates>,
    },
}

impl DaemonAccess {
    /// Returns the endpoint for log and error messages.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Ambient { docker_host } => docker_host.as_deref().unwrap_or("environment"),
            Self::Explicit { endpoint, .. } => endpoint,
        }
    }

    /// Returns the host under which published ports are reachable.
    #[must_use]
    pub fn daemon_host(&self) -> String {
        match self {
            Self::Ambient { docker_host } => host_of(docker_host.as_deref()),
            Self::Explicit { endpoint, .. } => host_of(Some(endpoint)),
        }
    }
}

/// Decides how to reach the daemon for the given configuration.
///
/// `docker_host` is the current value of `DOCKER_HOST`, passed in so the
/// decision does not depend on process-global state.
///
/// # Errors
///
/// Returns [`FixtureError::Certificates`] if a certificate directory is
/// configured but incomplete, and [`FixtureError::Config`] if the endpoint
/// has no scheme, an unsupported scheme, or is `https` without
/// certificates.
pub fn resolve_access(config: &FixtureConfig, docker_host: Option<&str>) -> Result<DaemonAccess> {
    let docker_host = docker_host.filter(|h| !h.is_empty());
    if !config.uses_explicit_access() {
        tracing::debug!("loading Docker access configuration from environment");
        return Ok(DaemonAccess::Ambient {
            docker_host: docker_host.map(str::to_string),
        });
    }

    tracing::debug!("using specified Docker access configuration");
    let certificates = match config.certificates_path.as_deref() {
        Some(path) => {
            tracing::info!(path = %path.display(), "using Docker certificates");
            Some(Certificates::load(path)?)
        }
        None => None,
    };
    let endpoint = config
        .endpoint
        .clone()
        .or_else(|| docker_host.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_TLS_ENDPOINT.to_string());

    let Some((scheme, _)) = endpoint.split_once("://") else {
        return Err(FixtureError::Config {
            message: format!("endpoint {endpoint} must include a scheme such as tcp://"),
        });
    };
    match scheme {
        "unix" | "tcp" | "http" => {}
        "https" if certificates.is_some() => {}
        "https" => {
            return Err(FixtureError::Config {
                message: format!("endpoint {endpoint} requires a certificate directory"),
            });
        }
        other => {
            return Err(FixtureError::Config {
                message: format!("unsupported endpoint scheme {other}"),
            });
        }
    }

    Ok(DaemonAccess::Explicit {
        endpoint,
        certificates,
    })
}

/// Extracts the host of a network endpoint, falling back to `localhost`
/// for local sockets and missing endpoints.
#[must_use]
pub fn host_of(endpoint: Option<&str>) -> String {
    let host = endpoint
        .and_then(|e| e.split_once("://"))
        .filter(|(scheme, _)| matches!(*scheme, "tcp" | "http" | "https"))
        .map(|(_, rest)| {
            let authority = rest.split('/').next().unwrap_or_default();
            match authority.strip_prefix('[') {
                Some(bracketed) => bracketed.split(']').next().unwrap_or_default(),
                None => authority.rsplit_once(':').map_or(authority, |(h, _)| h),
            }
        })
        .unwrap_or_default();
    if host.is_empty() {
        DEFAULT_DAEMON_HOST.to_string()
    } else {
        host.to_string()
    }
}

fn connection_error(access: &DaemonAccess, e: DockerError) -> FixtureError {
    FixtureError::Connection {
        endpoint: access.endpoint().to_string(),
        source: Box::new(e),
    }
}

#[cfg(unix)]
fn connect_unix(access: &DaemonAccess, endpoint: &str) -> Result<Docker> {
    Docker::connect_with_unix(endpoint, DAEMON_REQUEST_TIMEOUT_SECS, API_DEFAULT_VERSION)
        .map_err(|e| connection_error(access, e))
}

#[cfg(not(unix))]
fn connect_unix(_access: &DaemonAccess, endpoint: &str) -> Result<Docker> {
    Err(FixtureError::Config {
        message: format!("unix socket endpoint {endpoint} is not supported on this platform"),
    })
}

fn build_client(access: &DaemonAccess) -> Result<Docker> {
    let built = match access {
        DaemonAccess::Ambient { .. } => Docker::connect_with_defaults(),
        DaemonAccess::Explicit {
            endpoint,
            certificates: Some(certs),
        } => Docker::connect_with_ssl(
            endpoint,
            &certs.key,
            &certs.cert,
            &certs.ca,
            DAEMON_REQUEST_TIMEOUT_SECS,
            API_DEFAULT_VERSION,
        ),
        DaemonAccess::Explicit { endpoint, .. } if endpoint.starts_with("unix://") => {
            return connect_unix(access, endpoint);
        }
        DaemonAccess::Explicit { endpoint, .. } => {
            Docker::connect_with_http(endpoint, DAEMON_REQUEST_TIMEOUT_SECS, API_DEFAULT_VERSION)
        }
    };
    built.map_err(|e| connection_error(access, e))
}

/// Builds [`DockerClient`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct DockerConnector;

#[async_trait]
impl Connector for DockerConnector {
    async fn connect(&self, config: &FixtureConfig) -> Result<Arc<dyn RuntimeClient>> {
        let docker_host = std::env::var(ENV_DOCKER_HOST).ok();
        let access = resolve_access(config, docker_host.as_deref())?;
        let docker = build_client(&access)?;
        let host = access.daemon_host();
        tracing::debug!(endpoint = access.endpoint(), host = %host, "built Docker client");
        Ok(Arc::new(DockerClient { docker, host }))
    }
}

/// A connected Docker client.
pub struct DockerClient {
    docker: Docker,
    host: String,
}

impl std::fmt::Debug for DockerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerClient")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

/// Returns whether the daemon answered that the container is already
/// stopped or gone.
fn is_stopped_or_gone(e: &DockerError) -> bool {
    matches!(
        e,
        DockerError::DockerResponseServerError {
            status_code: 304 | 404 | 409,
            ..
        }
    )
}

#[async_trait]
impl RuntimeClient for DockerClient {
    fn daemon_host(&self) -> &str {
        &self.host
    }

    async fn probe(&self) -> Result<DaemonInfo> {
        let info = self
            .docker
            .info()
            .await
            .map_err(|e| FixtureError::Unreachable {
                source: Box::new(e),
            })?;
        Ok(DaemonInfo {
            name: info.name,
            server_version: info.server_version,
        })
    }

    fn pull_image(&self, image: &ImageRef) -> ProgressStream {
        let options = CreateImageOptions {
            from_image: image.repository.clone(),
            tag: image.tag.clone(),
            ..Default::default()
        };
        let name = image.to_string();
        self.docker
            .create_image(Some(options), None, None)
            .map(move |item| {
                item.map(|info| PullProgress {
                    id: info.id,
                    status: info.status,
                    progress: info.progress,
                })
                .map_err(|e| FixtureError::Pull {
                    image: name.clone(),
                    source: Box::new(e),
                })
            })
            .boxed()
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId> {
        let options = CreateContainerOptions {
            name: spec.name.clone(),
            ..Default::default()
        };
        let config = Config {
            image: Some(spec.image.to_string()),
            cmd: (!spec.command.is_empty()).then(|| spec.command.clone()),
            host_config: Some(HostConfig {
                publish_all_ports: Some(spec.publish_all_ports),
                ..Default::default()
            }),
            ..Default::default()
        };
        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| FixtureError::Create {
                image: spec.image.to_string(),
                source: Box::new(e),
            })?;
        for warning in &response.warnings {
            tracing::warn!(name = %spec.name, %warning, "daemon warning on create");
        }
        Ok(ContainerId::new(response.id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<()> {
        self.docker
            .start_container(id.as_str(), None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| FixtureError::Start {
                id: id.clone(),
                source: Box::new(e),
            })
    }

    async fn inspect_ports(&self, id: &ContainerId) -> Result<PortMap> {
        let info = self
            .docker
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(|e| FixtureError::Inspect {
                id: id.clone(),
                source: Box::new(e),
            })?;
        let ports = info
            .network_settings
            .and_then(|settings| settings.ports)
            .unwrap_or_default();
        Ok(ports
            .into_iter()
            .map(|(key, bindings)| {
                let bindings = bindings
                    .unwrap_or_default()
                    .into_iter()
                    .map(|b| PortBinding {
                        host_ip: b.host_ip,
                        host_port: b.host_port,
                    })
                    .collect();
                (key, bindings)
            })
            .collect())
    }

    fn stream_logs(&self, id: &ContainerId) -> LogStream {
        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            ..Default::default()
        };
        let owner = id.clone();
        self.docker
            .logs(id.as_str(), Some(options))
            .map(move |item| {
                item.map(|output| String::from_utf8_lossy(&output.into_bytes()).into_owned())
                    .map_err(|e| FixtureError::Logs {
                        id: owner.clone(),
                        source: Box::new(e),
                    })
            })
            .boxed()
    }

    async fn kill_container(&self, id: &ContainerId) -> Result<()> {
        match self
            .docker
            .kill_container(id.as_str(), None::<KillContainerOptions<String>>)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if is_stopped_or_gone(&e) => {
                tracing::debug!(%id, error = %e, "container was not running");
                Ok(())
            }
            Err(e) => Err(FixtureError::Teardown {
                id: id.clone(),
                source: Box::new(e),
            }),
        }
    }

    async fn remove_container(&self, id: &ContainerId) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };
        match self.docker.remove_container(id.as_str(), Some(options)).await {
            Ok(()) => Ok(()),
            Err(e) if is_stopped_or_gone(&e) => {
                tracing::debug!(%id, error = %e, "container already removed");
                Ok(())
            }
            Err(e) => Err(FixtureError::Teardown {
                id: id.clone(),
                source: Box::new(e),
            }),
        }
    }

    async fn close(&self) -> Result<()> {
        // bollard releases its connection pool when the last clone drops.
        tracing::debug!(host = %self.host, "closing Docker client");
        Ok(())
    }
}
