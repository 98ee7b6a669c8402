//! Ephemeral "startup" level: leader-only, once-per-bring-up work.
//!
//! Built as a child of the platform level after the main chain is up,
//! walked through configure/start/stop/destroy inside `Platform::run`,
//! and discarded. Follower nodes configure an empty level and do
//! nothing.

use std::path::PathBuf;

use terrace_core::config::TerraceConfig;
use terrace_core::error::TerraceError;
use terrace_core::{Level, LevelDef};

use crate::components::VersionStamp;

/// Definition of the ephemeral startup level.
pub struct StartupDef {
    data_dir: PathBuf,
}

impl StartupDef {
    pub fn new(config: &TerraceConfig) -> Self {
        Self {
            data_dir: PathBuf::from(&config.general.data_dir),
        }
    }
}

impl LevelDef for StartupDef {
    fn name(&self) -> &'static str {
        "startup"
    }

    fn configure_level(&self, level: &Level) -> Result<(), TerraceError> {
        if level.is_startup_leader()? {
            tracing::info!("startup leader, scheduling startup tasks");
        } else {
            tracing::info!("not the startup leader, skipping startup tasks");
        }
        level.add_if_startup_leader(VersionStamp::new(&self.data_dir))?;
        Ok(())
    }
}
