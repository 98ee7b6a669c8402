//! Terrace daemon library.
//!
//! This library exposes internal modules for integration testing.
//! In production, `terrace-daemon` is used as a binary (main.rs).

pub mod cli;
pub mod components;
pub mod health;
pub mod levels;
pub mod logging;
pub mod metrics_server;
pub mod platform;
