//! HTTP readiness polling.
//!
//! A log snippet only says the process printed something. When a test
//! needs the port to actually serve, poll it with [`wait_for_endpoint`].

use std::time::Duration;

use dockfix_common::error::{FixtureError, Result};

/// Repeatedly requests `url` until a connection succeeds, then checks the
/// status code.
///
/// Makes at most `retries` attempts (at least one), sleeping `interval`
/// between failed connections. The first response received decides the
/// result; a wrong status is not retried.
///
/// # Errors
///
/// Returns [`FixtureError::UnexpectedStatus`] if the endpoint answers with
/// another status, or [`FixtureError::EndpointUnavailable`] carrying the
/// last connection error once the attempts are exhausted.
pub async fn wait_for_endpoint(
    url: &str,
    interval: Duration,
    retries: u32,
    expected_status: u16,
) -> Result<()> {
    let client = reqwest::Client::new();
    let retries = retries.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match client.get(url).send().await {
            Ok(response) => {
                let actual = response.status().as_u16();
                if actual == expected_status {
                    tracing::debug!(url, attempt, status = actual, "endpoint ready");
                    return Ok(());
                }
                return Err(FixtureError::UnexpectedStatus {
                    url: url.to_string(),
                    expected: expected_status,
                    actual,
                });
            }
            Err(e) if attempt >= retries => {
                return Err(FixtureError::EndpointUnavailable {
                    url: url.to_string(),
                    attempts: attempt,
                    source: Box::new(e),
                });
            }
            Err(e) => {
                tracing::debug!(url, attempt, error = %e, "endpoint not ready yet");
                tokio::time::sleep(interval).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Serves one canned response per connection, forever.
    async fn serve(status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0_u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response =
                    format!("HTTP/1.1 {status_line}\r\ncontent-length: 8\r\nconnection: close\r\n\r\nIt works");
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        }));
        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn succeeds_on_expected_status() {
        let url = serve("200 OK").await;
        wait_for_endpoint(&url, Duration::from_millis(10), 3, 200)
            .await
            .expect("endpoint answers 200");
    }

    #[tokio::test]
    async fn wrong_status_is_reported_without_retrying() {
        let url = serve("503 Service Unavailable").await;
        let err = wait_for_endpoint(&url, Duration::from_millis(10), 5, 200)
            .await
            .expect_err("503 is not 200");
        assert!(matches!(
            err,
            FixtureError::UnexpectedStatus {
                expected: 200,
                actual: 503,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn closed_port_exhausts_retries() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);

        let err = wait_for_endpoint(&format!("http://{addr}/"), Duration::from_millis(5), 3, 200)
            .await
            .expect_err("nothing listens");
        assert!(matches!(
            err,
            FixtureError::EndpointUnavailable { attempts: 3, .. }
        ));
    }
}
