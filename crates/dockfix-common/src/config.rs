//! Immutable configuration of a single fixture run.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_WAIT_FOR_LOG_TIMEOUT_MS;
use crate::error::{FixtureError, Result};

/// Everything a fixture needs to know before it starts.
///
/// Built once, validated, and never mutated while the fixture runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureConfig {
    /// Image reference to pull and run.
    pub image: String,
    /// Command-line arguments passed to the container. Empty means the
    /// image's default command.
    pub command: Vec<String>,
    /// Daemon endpoint overriding the ambient environment.
    pub endpoint: Option<String>,
    /// Directory holding `ca.pem`, `cert.pem`, and `key.pem`.
    pub certificates_path: Option<PathBuf>,
    /// Leave the container running after the run completes.
    pub leave_running: bool,
    /// Report a skip instead of failing when the daemon is unreachable.
    pub skip_when_unreachable: bool,
    /// Case-sensitive text that must appear in the container log before
    /// the test body runs.
    pub wait_for_log: Option<String>,
    /// Upper bound on the wait for `wait_for_log`.
    #[serde(rename = "wait_for_log_timeout_ms", with = "duration_ms")]
    pub wait_for_log_timeout: Duration,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            image: String::new(),
            command: Vec::new(),
            endpoint: None,
            certificates_path: None,
            leave_running: false,
            skip_when_unreachable: false,
            wait_for_log: None,
            wait_for_log_timeout: Duration::from_millis(DEFAULT_WAIT_FOR_LOG_TIMEOUT_MS),
        }
    }
}

impl FixtureConfig {
    /// Returns whether the client must be built from explicit settings
    /// rather than the ambient environment.
    #[must_use]
    pub const fn uses_explicit_access(&self) -> bool {
        self.endpoint.is_some() || self.certificates_path.is_some()
    }

    /// Checks that the configuration can drive a run.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::Config`] if the image is empty, the log
    /// snippet is empty, or the log-wait timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.image.trim().is_empty() {
            return Err(FixtureError::Config {
                message: "image reference is required".to_string(),
            });
        }
        if self.wait_for_log.as_deref().is_some_and(str::is_empty) {
            return Err(FixtureError::Config {
                message: "log snippet to wait for must not be empty".to_string(),
            });
        }
        if self.wait_for_log_timeout.is_zero() {
            return Err(FixtureError::Config {
                message: "log wait timeout must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(image: &str) -> FixtureConfig {
        FixtureConfig {
            image: image.into(),
            ..FixtureConfig::default()
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = FixtureConfig::default();
        assert_eq!(cfg.wait_for_log_timeout, Duration::from_secs(30));
        assert!(!cfg.leave_running);
        assert!(!cfg.skip_when_unreachable);
        assert!(!cfg.uses_explicit_access());
    }

    #[test]
    fn empty_image_is_rejected() {
        let err = config("  ").validate().expect_err("empty image must fail");
        assert!(matches!(err, FixtureError::Config { .. }));
    }

    #[test]
    fn empty_snippet_is_rejected() {
        let mut cfg = config("httpd:alpine");
        cfg.wait_for_log = Some(String::new());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut cfg = config("httpd:alpine");
        cfg.wait_for_log_timeout = Duration::ZERO;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn certificates_alone_select_explicit_access() {
        let mut cfg = config("httpd:alpine");
        cfg.certificates_path = Some(PathBuf::from("/certs"));
        assert!(cfg.uses_explicit_access());
    }

    #[test]
    fn deserializes_partial_document_with_defaults() {
        let cfg: FixtureConfig = serde_json::from_str(
            r#"{"image": "httpd:alpine", "wait_for_log": "AH00094", "wait_for_log_timeout_ms": 5000}"#,
        )
        .expect("should parse");
        assert_eq!(cfg.image, "httpd:alpine");
        assert_eq!(cfg.wait_for_log.as_deref(), Some("AH00094"));
        assert_eq!(cfg.wait_for_log_timeout, Duration::from_secs(5));
        assert!(cfg.command.is_empty());
        cfg.validate().expect("valid");
    }
}
