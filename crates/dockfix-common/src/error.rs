//! Unified error types for the dockfix workspace.
//!
//! Errors raised by the container daemon are carried as boxed sources so
//! this crate does not depend on any particular client library.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::ContainerId;

/// Boxed error type used for daemon and test-body failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum FixtureError {
    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// Client certificates were configured but could not be loaded.
    #[error("given certificates were not loaded from {path}: {message}")]
    Certificates {
        /// Certificate directory that was configured.
        path: PathBuf,
        /// Description of what is missing or unreadable.
        message: String,
    },

    /// A client for the daemon could not be built.
    #[error("failed to connect to container runtime at {endpoint}: {source}")]
    Connection {
        /// Endpoint the client was built for.
        endpoint: String,
        /// Underlying client error.
        source: BoxError,
    },

    /// The liveness probe against the daemon failed.
    #[error("container runtime is unreachable: {source}")]
    Unreachable {
        /// Underlying probe error.
        source: BoxError,
    },

    /// Pulling the image failed.
    #[error("failed to pull image {image}: {source}")]
    Pull {
        /// Image reference being pulled.
        image: String,
        /// Underlying daemon error.
        source: BoxError,
    },

    /// Creating the container failed.
    #[error("failed to create container from image {image}: {source}")]
    Create {
        /// Image reference the container was created from.
        image: String,
        /// Underlying daemon error.
        source: BoxError,
    },

    /// Starting the container failed.
    #[error("failed to start container {id}: {source}")]
    Start {
        /// Container that failed to start.
        id: ContainerId,
        /// Underlying daemon error.
        source: BoxError,
    },

    /// Inspecting the container failed.
    #[error("failed to inspect container {id}: {source}")]
    Inspect {
        /// Container being inspected.
        id: ContainerId,
        /// Underlying daemon error.
        source: BoxError,
    },

    /// Reading the container log stream failed.
    #[error("failed to read logs of container {id}: {source}")]
    Logs {
        /// Container whose logs were requested.
        id: ContainerId,
        /// Underlying daemon error.
        source: BoxError,
    },

    /// The log snippet was not observed in time.
    #[error(
        "did not observe desired container log snippet '{snippet}' within {} ms",
        timeout.as_millis()
    )]
    LogWaitTimeout {
        /// Snippet that was awaited.
        snippet: String,
        /// Configured wait timeout.
        timeout: Duration,
    },

    /// No host binding exists for the requested container port.
    #[error("no published host port for {port}/tcp on container {id}")]
    PortLookup {
        /// Internal container port that was queried.
        port: u16,
        /// Container that was inspected.
        id: ContainerId,
    },

    /// A teardown step failed. Only ever logged, never returned by a run.
    #[error("teardown of container {id} failed: {source}")]
    Teardown {
        /// Container being torn down.
        id: ContainerId,
        /// Underlying daemon error.
        source: BoxError,
    },

    /// An HTTP endpoint answered with a status other than the expected one.
    #[error("unexpected HTTP status from {url}: expected {expected}, got {actual}")]
    UnexpectedStatus {
        /// URL that was polled.
        url: String,
        /// Status code the caller expected.
        expected: u16,
        /// Status code the endpoint returned.
        actual: u16,
    },

    /// An HTTP endpoint never accepted a connection.
    #[error("HTTP endpoint {url} unavailable after {attempts} attempts: {source}")]
    EndpointUnavailable {
        /// URL that was polled.
        url: String,
        /// Number of attempts made.
        attempts: u32,
        /// Error of the final attempt.
        source: BoxError,
    },

    /// A resolved address could not be turned into a socket address.
    #[error("failed to resolve {address}: {source}")]
    Resolve {
        /// The `host:port` being resolved.
        address: String,
        /// Underlying resolver error.
        source: std::io::Error,
    },

    /// The async runtime driving a blocking run could not be built.
    #[error("failed to build async runtime: {source}")]
    Runtime {
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The wrapped test body failed.
    #[error("test body failed: {source}")]
    TestBody {
        /// Error returned by the test body.
        source: BoxError,
    },
}

impl FixtureError {
    /// Returns whether this error means the daemon could not be reached,
    /// which is the only failure a fixture may turn into a skip.
    #[must_use]
    pub const fn is_skippable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Unreachable { .. })
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, FixtureError>;
