//! The fixture controller.
//!
//! A run moves through `Connecting → Pulling → Creating → Starting →
//! AwaitingLog → Running → TearingDown → Done`, or ends in `Errored`.
//! Once a runtime client has been built, teardown runs exactly once on
//! every exit path: stage failures, test body errors, and test body
//! panics. Teardown failures are logged and never replace the outcome.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use dockfix_common::config::FixtureConfig;
use dockfix_common::error::{BoxError, FixtureError, Result};
use dockfix_common::types::{ContainerId, FixtureState, ImageRef};
use dockfix_runtime::client::{Connector, ContainerSpec, RuntimeClient};
use dockfix_runtime::docker::DockerConnector;
use dockfix_runtime::logs::spawn_log_waiter;
use futures::{FutureExt, StreamExt};

use crate::builder::FixtureBuilder;
use crate::container::RunningContainer;

/// How a run ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome<T> {
    /// The test body ran and returned this value.
    Completed(T),
    /// The daemon was unreachable and the fixture was configured to skip.
    /// The test body did not run.
    Skipped {
        /// Why the run was skipped.
        reason: String,
    },
}

impl<T> RunOutcome<T> {
    /// Returns whether the test body was bypassed.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    /// Returns the test body's value, or `None` if the run was skipped.
    #[must_use]
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Skipped { .. } => None,
        }
    }
}

/// A validated, immutable fixture ready to run once.
#[derive(Debug, Clone)]
pub struct Fixture {
    config: FixtureConfig,
}

impl Fixture {
    /// Starts configuring a fixture for the given image.
    #[must_use]
    pub fn builder(image: impl Into<String>) -> FixtureBuilder {
        FixtureBuilder::new(image)
    }

    /// Creates a fixture from a complete configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` does not validate.
    pub fn from_config(config: FixtureConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the frozen configuration.
    #[must_use]
    pub const fn config(&self) -> &FixtureConfig {
        &self.config
    }

    /// Runs `body` against a fresh container on the Docker daemon.
    ///
    /// # Errors
    ///
    /// Returns the first fatal fixture error, or
    /// [`FixtureError::TestBody`] if the body failed. The container has
    /// been torn down in both cases.
    pub async fn run<F, Fut, T, E>(self, body: F) -> Result<RunOutcome<T>>
    where
        F: FnOnce(RunningContainer) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<BoxError>,
    {
        self.run_with(&DockerConnector, body).await
    }

    /// Like [`run`](Self::run), but drives the run on a private
    /// current-thread runtime so it can be called from a plain `#[test]`.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run), plus [`FixtureError::Config`] if called
    /// from within an async runtime and [`FixtureError::Runtime`] if the
    /// runtime cannot be built.
    pub fn run_blocking<F, Fut, T, E>(self, body: F) -> Result<RunOutcome<T>>
    where
        F: FnOnce(RunningContainer) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<BoxError>,
    {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(FixtureError::Config {
                message: "run_blocking cannot be called from within an async runtime; use run"
                    .to_string(),
            });
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|source| FixtureError::Runtime { source })?;
        runtime.block_on(self.run(body))
    }

    /// Runs `body` against a container obtained through `connector`.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run).
    pub async fn run_with<C, F, Fut, T, E>(self, connector: &C, body: F) -> Result<RunOutcome<T>>
    where
        C: Connector + ?Sized,
        F: FnOnce(RunningContainer) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<BoxError>,
    {
        let mut controller = Controller::new(&self.config);

        controller.transition(FixtureState::Connecting);
        let client = match connector.connect(&self.config).await {
            Ok(client) => client,
            Err(e) => return controller.abort_connect(e),
        };

        let mut resources = Resources::default();
        let result = match controller.bring_up(&client, &mut resources).await {
            Ok(Prepared::Skip(reason)) => Ok(RunOutcome::Skipped { reason }),
            Ok(Prepared::Ready(container)) => {
                controller.transition(FixtureState::Running);
                match AssertUnwindSafe(body(container)).catch_unwind().await {
                    Ok(Ok(value)) => Ok(RunOutcome::Completed(value)),
                    Ok(Err(e)) => Err(FixtureError::TestBody { source: e.into() }),
                    Err(panic) => {
                        controller.teardown(client.as_ref(), &resources).await;
                        controller.transition(FixtureState::Errored);
                        std::panic::resume_unwind(panic);
                    }
                }
            }
            Err(e) => Err(e),
        };

        controller.teardown(client.as_ref(), &resources).await;
        controller.finish(result)
    }
}

/// Daemon-side resources a run has to clean up.
#[derive(Debug, Default)]
struct Resources {
    container: Option<ContainerId>,
    started: bool,
}

enum Prepared {
    Skip(String),
    Ready(RunningContainer),
}

struct Controller<'a> {
    config: &'a FixtureConfig,
    state: FixtureState,
}

impl<'a> Controller<'a> {
    const fn new(config: &'a FixtureConfig) -> Self {
        Self {
            config,
            state: FixtureState::Unconfigured,
        }
    }

    /// Moves to `next`. Terminal states are never left.
    fn transition(&mut self, next: FixtureState) {
        if self.state.is_terminal() {
            tracing::warn!(image = %self.config.image, from = %self.state, to = %next, "ignoring transition out of terminal state");
            return;
        }
        tracing::debug!(image = %self.config.image, from = %self.state, to = %next, "fixture transition");
        self.state = next;
    }

    fn skip_reason(&self, e: &FixtureError) -> Option<String> {
        (self.config.skip_when_unreachable && e.is_skippable()).then(|| e.to_string())
    }

    /// Handles a failure to build the client. Nothing needs tearing down.
    fn abort_connect<T>(&mut self, e: FixtureError) -> Result<RunOutcome<T>> {
        if let Some(reason) = self.skip_reason(&e) {
            tracing::info!(image = %self.config.image, %reason, "skipping: container runtime unreachable");
            self.transition(FixtureState::Done);
            return Ok(RunOutcome::Skipped { reason });
        }
        self.transition(FixtureState::Errored);
        Err(e)
    }

    async fn bring_up(
        &mut self,
        client: &Arc<dyn RuntimeClient>,
        resources: &mut Resources,
    ) -> Result<Prepared> {
        match client.probe().await {
            Ok(info) => tracing::info!(
                node = info.name.as_deref().unwrap_or("unknown"),
                version = info.server_version.as_deref().unwrap_or("unknown"),
                "using Docker node"
            ),
            Err(e) => {
                if let Some(reason) = self.skip_reason(&e) {
                    tracing::info!(image = %self.config.image, %reason, "skipping: container runtime unreachable");
                    return Ok(Prepared::Skip(reason));
                }
                return Err(e);
            }
        }

        let spec = ContainerSpec::from_config(self.config);

        self.transition(FixtureState::Pulling);
        pull(client.as_ref(), &spec.image).await?;

        self.transition(FixtureState::Creating);
        let id = client.create_container(&spec).await?;
        tracing::info!(id = id.short(), name = %spec.name, image = %spec.image, "created container");
        resources.container = Some(id.clone());

        self.transition(FixtureState::Starting);
        tracing::info!(id = id.short(), "starting container");
        client.start_container(&id).await?;
        resources.started = true;

        if let Some(snippet) = &self.config.wait_for_log {
            self.transition(FixtureState::AwaitingLog);
            let timeout = self.config.wait_for_log_timeout;
            tracing::debug!(%id, %snippet, timeout_ms = %timeout.as_millis(), "waiting for log snippet");
            spawn_log_waiter(client.stream_logs(&id), snippet.clone())
                .wait(timeout)
                .await?;
            tracing::info!(%id, %snippet, "observed log snippet");
        }

        Ok(Prepared::Ready(RunningContainer::new(Arc::clone(client), id)))
    }

    /// Kills and removes the container, then closes the client. Failures
    /// are logged only.
    ///
    /// A container that never started is always removed; `leave_running`
    /// only spares containers that started.
    async fn teardown(&mut self, client: &dyn RuntimeClient, resources: &Resources) {
        self.transition(FixtureState::TearingDown);
        if let Some(id) = &resources.container {
            if resources.started && self.config.leave_running {
                tracing::info!(id = id.short(), "leaving container running");
            } else {
                tracing::info!(id = id.short(), "stopping container");
                if let Err(e) = client.kill_container(id).await {
                    tracing::warn!(%id, error = %e, "failed to kill container");
                }
                if let Err(e) = client.remove_container(id).await {
                    tracing::warn!(%id, error = %e, "failed to remove container");
                }
            }
        }
        if let Err(e) = client.close().await {
            tracing::warn!(error = %e, "failed to close runtime client");
        }
    }

    fn finish<T>(&mut self, result: Result<RunOutcome<T>>) -> Result<RunOutcome<T>> {
        match &result {
            Ok(_) => self.transition(FixtureState::Done),
            Err(e) => {
                tracing::debug!(image = %self.config.image, error = %e, "fixture run failed");
                self.transition(FixtureState::Errored);
            }
        }
        result
    }
}

/// Pulls `image`, logging progress. Progress never changes the outcome;
/// only an error item fails the pull.
async fn pull(client: &dyn RuntimeClient, image: &ImageRef) -> Result<()> {
    let name = image.to_string();
    tracing::info!(image = %name, "pulling image");
    let mut progress = client.pull_image(image);
    while let Some(event) = progress.next().await {
        if let Some(line) = event?.describe(&name) {
            tracing::info!("Pulling {line}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_accessors() {
        let done: RunOutcome<u8> = RunOutcome::Completed(7);
        assert!(!done.is_skipped());
        assert_eq!(done.completed(), Some(7));

        let skipped: RunOutcome<u8> = RunOutcome::Skipped {
            reason: "offline".into(),
        };
        assert!(skipped.is_skipped());
        assert_eq!(skipped.completed(), None);
    }

    #[test]
    fn from_config_validates() {
        assert!(Fixture::from_config(FixtureConfig::default()).is_err());
        let fixture = Fixture::builder("httpd:alpine")
            .wait_for_log("AH00094")
            .build()
            .expect("valid");
        assert_eq!(fixture.config().wait_for_log.as_deref(), Some("AH00094"));
    }

    #[test]
    fn terminal_state_is_never_left() {
        let fixture = Fixture::builder("httpd:alpine").build().expect("valid");
        let mut controller = Controller::new(fixture.config());
        controller.transition(FixtureState::Connecting);
        controller.transition(FixtureState::Errored);
        controller.transition(FixtureState::TearingDown);
        assert_eq!(controller.state, FixtureState::Errored);
    }

    #[tokio::test]
    async fn run_blocking_inside_runtime_is_an_error() {
        let fixture = Fixture::builder("httpd:alpine").build().expect("valid");
        let err = fixture
            .run_blocking(|_c| async { Ok::<_, FixtureError>(()) })
            .expect_err("nested runtime");
        assert!(matches!(err, FixtureError::Config { .. }));
        assert!(err.to_string().contains("run_blocking"));
    }
}
