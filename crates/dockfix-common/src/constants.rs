//! System-wide constants and defaults.

/// Default time, in milliseconds, to wait for a log snippet to appear.
pub const DEFAULT_WAIT_FOR_LOG_TIMEOUT_MS: u64 = 30_000;

/// Default Docker daemon TLS endpoint used when certificates are given
/// without an endpoint and `DOCKER_HOST` is unset.
pub const DEFAULT_TLS_ENDPOINT: &str = "tcp://localhost:2376";

/// Host reported for published ports when the daemon is reached through a
/// local socket.
pub const DEFAULT_DAEMON_HOST: &str = "localhost";

/// Timeout, in seconds, applied to every request sent to the daemon.
pub const DAEMON_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Protocol suffix used when looking up published ports.
pub const TCP_PROTOCOL: &str = "tcp";

/// Tag applied to image references that carry neither tag nor digest.
pub const DEFAULT_IMAGE_TAG: &str = "latest";

/// Prefix of the name given to every container created by a fixture.
pub const CONTAINER_NAME_PREFIX: &str = "dockfix";

/// Certificate authority file expected in a certificate directory.
pub const CA_CERT_FILE: &str = "ca.pem";

/// Client certificate file expected in a certificate directory.
pub const CLIENT_CERT_FILE: &str = "cert.pem";

/// Client key file expected in a certificate directory.
pub const CLIENT_KEY_FILE: &str = "key.pem";

/// Environment variable naming the Docker daemon endpoint.
pub const ENV_DOCKER_HOST: &str = "DOCKER_HOST";

/// Environment variable that, when truthy, leaves fixture containers running.
pub const ENV_LEAVE_RUNNING: &str = "DOCKFIX_LEAVE_RUNNING";
