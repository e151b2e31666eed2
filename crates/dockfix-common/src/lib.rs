//! # dockfix-common
//!
//! Shared types, error definitions, configuration models, and constants
//! used across the entire dockfix workspace.
//!
//! This crate is the leaf of the dependency graph. It knows nothing about
//! the Docker client library; daemon errors reach it as boxed sources.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
