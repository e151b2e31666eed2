//! Container runtime adapter for dockfix.
//!
//! - [`client`]: the contract the fixture controller drives.
//! - [`docker`]: the Docker implementation of that contract.
//! - [`ports`]: resolution of published ports to host addresses.
//! - [`logs`]: the background log tailer and its readiness signal.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod client;
pub mod docker;
pub mod logs;
pub mod ports;
