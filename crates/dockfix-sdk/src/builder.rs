//! Fluent API for configuring a fixture before it runs.

use std::path::PathBuf;
use std::time::Duration;

use dockfix_common::config::FixtureConfig;
use dockfix_common::constants::ENV_LEAVE_RUNNING;
use dockfix_common::error::Result;

use crate::fixture::Fixture;

/// Builder for a [`Fixture`].
///
/// Every setter consumes and returns the builder so calls chain; the
/// configuration is frozen by [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct FixtureBuilder {
    config: FixtureConfig,
}

impl FixtureBuilder {
    /// Creates a builder for the given image reference.
    #[must_use]
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            config: FixtureConfig {
                image: image.into(),
                ..FixtureConfig::default()
            },
        }
    }

    /// Sets the command-line arguments passed to the container.
    #[must_use]
    pub fn command<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.command = args.into_iter().map(Into::into).collect();
        self
    }

    /// Uses the given daemon endpoint instead of the environment.
    #[must_use]
    pub fn endpoint(mut self, uri: impl Into<String>) -> Self {
        self.config.endpoint = Some(uri.into());
        self
    }

    /// Uses client certificates from the given directory, which must
    /// contain `ca.pem`, `cert.pem`, and `key.pem`.
    #[must_use]
    pub fn certificates_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.certificates_path = Some(path.into());
        self
    }

    /// Leaves the container running after the run, for debugging.
    #[must_use]
    pub const fn leave_running(mut self, leave_running: bool) -> Self {
        self.config.leave_running = leave_running;
        self
    }

    /// Skips the run instead of failing when the daemon is unreachable.
    ///
    /// Use with care on shared fixtures: an offline daemon then silently
    /// skips every test depending on it.
    #[must_use]
    pub const fn skip_when_unreachable(mut self, skip: bool) -> Self {
        self.config.skip_when_unreachable = skip;
        self
    }

    /// Delays the test body until `snippet` (case-sensitive) appears in the
    /// container's stdout or stderr.
    #[must_use]
    pub fn wait_for_log(mut self, snippet: impl Into<String>) -> Self {
        self.config.wait_for_log = Some(snippet.into());
        self
    }

    /// Bounds the wait configured by [`wait_for_log`](Self::wait_for_log).
    /// Defaults to 30 seconds.
    #[must_use]
    pub const fn wait_for_log_timeout(mut self, timeout: Duration) -> Self {
        self.config.wait_for_log_timeout = timeout;
        self
    }

    /// Applies overrides from the process environment.
    ///
    /// `DOCKFIX_LEAVE_RUNNING` set to anything but empty, `0`, or `false`
    /// enables [`leave_running`](Self::leave_running).
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        let value = std::env::var(ENV_LEAVE_RUNNING).ok();
        if let Some(leave) = truthy(value.as_deref()) {
            tracing::debug!(leave_running = leave, "leave-running overridden from environment");
            self.config.leave_running = leave;
        }
        self
    }

    /// Returns the configuration assembled so far.
    #[must_use]
    pub const fn config(&self) -> &FixtureConfig {
        &self.config
    }

    /// Validates the configuration and freezes it into a [`Fixture`].
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the image is empty, the log
    /// snippet is empty, or the log-wait timeout is zero.
    pub fn build(self) -> Result<Fixture> {
        Fixture::from_config(self.config)
    }
}

/// Interprets an environment flag. `None` means the variable is unset.
fn truthy(value: Option<&str>) -> Option<bool> {
    let value = value?.trim();
    Some(!(value.is_empty() || value == "0" || value.eq_ignore_ascii_case("false")))
}

#[cfg(test)]
mod tests {
    use dockfix_common::error::FixtureError;

    use super::*;

    #[test]
    fn setters_chain_into_config() {
        let builder = FixtureBuilder::new("httpd:alpine")
            .command(["httpd-foreground", "-X"])
            .endpoint("tcp://build-host:2375")
            .certificates_path("/etc/docker/certs")
            .leave_running(true)
            .skip_when_unreachable(true)
            .wait_for_log("AH00094")
            .wait_for_log_timeout(Duration::from_secs(5));

        let cfg = builder.config();
        assert_eq!(cfg.image, "httpd:alpine");
        assert_eq!(cfg.command, vec!["httpd-foreground", "-X"]);
        assert_eq!(cfg.endpoint.as_deref(), Some("tcp://build-host:2375"));
        assert_eq!(cfg.certificates_path, Some(PathBuf::from("/etc/docker/certs")));
        assert!(cfg.leave_running);
        assert!(cfg.skip_when_unreachable);
        assert_eq!(cfg.wait_for_log.as_deref(), Some("AH00094"));
        assert_eq!(cfg.wait_for_log_timeout, Duration::from_secs(5));
    }

    #[test]
    fn defaults_apply_when_unset() {
        let fixture = FixtureBuilder::new("redis:7").build().expect("valid");
        let cfg = fixture.config();
        assert!(cfg.command.is_empty());
        assert!(cfg.wait_for_log.is_none());
        assert_eq!(cfg.wait_for_log_timeout, Duration::from_millis(30_000));
        assert!(!cfg.leave_running);
    }

    #[test]
    fn build_rejects_missing_image() {
        let err = FixtureBuilder::new("").build().expect_err("image required");
        assert!(matches!(err, FixtureError::Config { .. }));
    }

    #[test]
    fn truthy_flag_values() {
        assert_eq!(truthy(None), None);
        assert_eq!(truthy(Some("")), Some(false));
        assert_eq!(truthy(Some("0")), Some(false));
        assert_eq!(truthy(Some("FALSE")), Some(false));
        assert_eq!(truthy(Some("1")), Some(true));
        assert_eq!(truthy(Some("yes")), Some(true));
    }
}
