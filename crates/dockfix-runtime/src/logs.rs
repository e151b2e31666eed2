//! Waiting for a snippet in a container's log output.
//!
//! [`spawn_log_waiter`] tails the log stream on a background task and
//! fires a one-shot [`Readiness`] signal the first time the snippet is
//! seen. The task never touches fixture state; the signal is the only
//! thing it shares with the controller.

use std::time::Duration;

use dockfix_common::error::{FixtureError, Result};
use futures::StreamExt;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::client::LogStream;

/// Receiving side of the one-shot readiness signal.
#[derive(Debug)]
pub struct Readiness {
    snippet: String,
    ready: oneshot::Receiver<()>,
}

impl Readiness {
    /// Returns the snippet being waited for.
    #[must_use]
    pub fn snippet(&self) -> &str {
        &self.snippet
    }

    /// Waits for the snippet to be observed.
    ///
    /// A log stream that ends or fails without the snippet never releases
    /// the signal, so the wait then runs until the deadline.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::LogWaitTimeout`] if `timeout` elapses before
    /// the snippet is seen.
    pub async fn wait(self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        match tokio::time::timeout_at(deadline, self.ready).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(_)) => {
                tracing::debug!(snippet = %self.snippet, "log tailer ended, waiting out the deadline");
                tokio::time::sleep_until(deadline).await;
            }
            Err(_) => {}
        }
        Err(FixtureError::LogWaitTimeout {
            snippet: self.snippet,
            timeout,
        })
    }
}

/// Spawns a task that tails `stream` until `snippet` appears.
///
/// The task is not cancelled when the waiter gives up; it ends when the
/// stream ends, which happens once the container is killed.
pub fn spawn_log_waiter(stream: LogStream, snippet: impl Into<String>) -> Readiness {
    let snippet = snippet.into();
    let (tx, rx) = oneshot::channel();
    tracing::debug!(snippet = %snippet, "waiting for log snippet");
    drop(tokio::spawn(tail_for_snippet(stream, snippet.clone(), tx)));
    Readiness { snippet, ready: rx }
}

async fn tail_for_snippet(mut stream: LogStream, snippet: String, ready: oneshot::Sender<()>) {
    let mut matcher = SnippetMatcher::new(&snippet);
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(text) => {
                tracing::debug!(log = %text.trim_end(), "container log");
                if matcher.feed(&text) {
                    // The waiter may already have timed out.
                    let _ = ready.send(());
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "container log stream failed");
                return;
            }
        }
    }
    tracing::debug!(snippet = %snippet, "container log stream ended without snippet");
}

/// Case-sensitive substring matcher over a chunked stream.
///
/// Keeps the tail of the previous chunk so a snippet split across two
/// chunks still matches.
#[derive(Debug)]
struct SnippetMatcher<'a> {
    snippet: &'a str,
    carry: String,
}

impl<'a> SnippetMatcher<'a> {
    const fn new(snippet: &'a str) -> Self {
        Self {
            snippet,
            carry: String::new(),
        }
    }

    fn feed(&mut self, chunk: &str) -> bool {
        self.carry.push_str(chunk);
        if self.carry.contains(self.snippet) {
            return true;
        }
        let keep = self.snippet.len().saturating_sub(1);
        if self.carry.len() > keep {
            let mut cut = self.carry.len() - keep;
            while !self.carry.is_char_boundary(cut) {
                cut -= 1;
            }
            self.carry.replace_range(..cut, "");
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use futures::stream;

    use super::*;

    fn lines(chunks: &[&str]) -> LogStream {
        let items: Vec<Result<String>> = chunks.iter().map(|c| Ok((*c).to_string())).collect();
        stream::iter(items).boxed()
    }

    #[test]
    fn matcher_finds_snippet_within_chunk() {
        let mut m = SnippetMatcher::new("AH00094");
        assert!(!m.feed("AH00558: httpd: Could not reliably determine\n"));
        assert!(m.feed("[mpm_event:notice] AH00489 resuming; AH00094: Command line\n"));
    }

    #[test]
    fn matcher_finds_snippet_split_across_chunks() {
        let mut m = SnippetMatcher::new("started");
        assert!(!m.feed("server sta"));
        assert!(m.feed("rted on port 80"));
    }

    #[test]
    fn matcher_is_case_sensitive() {
        let mut m = SnippetMatcher::new("Started");
        assert!(!m.feed("started\n"));
    }

    #[test]
    fn matcher_carry_respects_char_boundaries() {
        let mut m = SnippetMatcher::new("ready");
        assert!(!m.feed("démarrage…"));
        assert!(!m.feed("éééé"));
        assert!(m.feed(" ready"));
    }

    #[tokio::test]
    async fn readiness_fires_when_snippet_seen() {
        let readiness = spawn_log_waiter(lines(&["booting\n", "node started\n"]), "started");
        readiness
            .wait(Duration::from_secs(5))
            .await
            .expect("snippet is in the stream");
    }

    #[tokio::test(start_paused = true)]
    async fn closed_stream_without_snippet_waits_out_timeout() {
        let readiness = spawn_log_waiter(lines(&["booting\n", "crashed\n"]), "started");
        let started = Instant::now();
        let err = readiness
            .wait(Duration::from_millis(1500))
            .await
            .expect_err("snippet never appears");
        assert!(matches!(err, FixtureError::LogWaitTimeout { .. }));
        assert!(err.to_string().contains("1500 ms"));
        assert!(started.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_stream_times_out_with_configured_duration() {
        let readiness = spawn_log_waiter(stream::pending().boxed(), "started");
        assert_eq!(readiness.snippet(), "started");
        let err = readiness
            .wait(Duration::from_millis(250))
            .await
            .expect_err("nothing is ever logged");
        assert!(matches!(err, FixtureError::LogWaitTimeout { .. }));
        assert!(err.to_string().contains("250 ms"));
    }

    #[tokio::test(start_paused = true)]
    async fn stream_error_ends_in_timeout() {
        let items: Vec<Result<String>> = vec![
            Ok("booting\n".into()),
            Err(FixtureError::Config {
                message: "connection reset".into(),
            }),
            Ok("started\n".into()),
        ];
        let readiness = spawn_log_waiter(stream::iter(items).boxed(), "started");
        let err = readiness
            .wait(Duration::from_secs(5))
            .await
            .expect_err("tail stops at the error");
        assert!(matches!(err, FixtureError::LogWaitTimeout { .. }));
        assert!(err.to_string().contains("5000 ms"));
    }
}
