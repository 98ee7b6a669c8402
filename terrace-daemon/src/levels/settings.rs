//! Level 2 "settings": full configuration and cluster leadership facts.
//!
//! The first level where cluster settings exist in scope. Guards work
//! from here down the chain.

use terrace_core::cluster::StartupLeader;
use terrace_core::config::TerraceConfig;
use terrace_core::error::TerraceError;
use terrace_core::{Level, LevelDef};

/// Definition of the settings level.
pub struct SettingsDef {
    config: TerraceConfig,
}

impl SettingsDef {
    pub fn new(config: TerraceConfig) -> Self {
        Self { config }
    }
}

impl LevelDef for SettingsDef {
    fn name(&self) -> &'static str {
        "settings"
    }

    fn configure_level(&self, level: &Level) -> Result<(), TerraceError> {
        let leader = StartupLeader::from_config(&self.config);
        tracing::info!(
            cluster = self.config.cluster.enabled,
            startup_leader = leader.is_startup_leader(),
            "cluster settings loaded"
        );
        level.add(self.config.clone())?.add(leader)?;
        Ok(())
    }
}
