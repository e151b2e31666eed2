//! # dockfix-sdk
//!
//! Runs a test body against a single throwaway Docker container.
//!
//! The fixture pulls the image, creates the container with every exposed
//! port published on an ephemeral host port, starts it, optionally waits
//! for a log line, hands a [`RunningContainer`](container::RunningContainer)
//! to the test body, and tears everything down afterwards, whether the
//! body succeeded, failed, or panicked.
//!
//! # Example
//!
//! ```rust,no_run
//! use dockfix_sdk::fixture::Fixture;
//!
//! # async fn example() -> dockfix_common::error::Result<()> {
//! let outcome = Fixture::builder("httpd:alpine")
//!     .wait_for_log("AH00094")
//!     .skip_when_unreachable(true)
//!     .build()?
//!     .run(|container| async move {
//!         let address = container.resolve(80).await?;
//!         dockfix_sdk::http::wait_for_endpoint(
//!             &format!("http://{address}/"),
//!             std::time::Duration::from_millis(500),
//!             20,
//!             200,
//!         )
//!         .await
//!     })
//!     .await?;
//! if outcome.is_skipped() {
//!     return Ok(());
//! }
//! # Ok(())
//! # }
//! ```

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod builder;
pub mod container;
pub mod fixture;
pub mod http;
