#![doc = include_str!("../README.md")]

pub mod cluster;
pub mod config;
pub mod container;
pub mod error;
pub mod level;
pub mod metrics;

// --- re-exports ---
// Core types usable straight from the crate root.

// errors
pub use error::{ClusterError, ConfigError, ContainerError, LevelError, TerraceError};

// configuration
pub use config::TerraceConfig;

// container
pub use container::{Component, Container, Module};

// levels
pub use level::{ConditionalAdd, Level, LevelDef, LevelState};

// cluster state
pub use cluster::{NodeIdentity, StartupLeader};
