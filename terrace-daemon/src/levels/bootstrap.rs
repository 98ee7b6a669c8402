//! Level 1 "bootstrap": node identity and filesystem paths.
//!
//! Cluster settings are deliberately not visible here; leadership
//! queries against this level fail with the ordering error instead of
//! silently reporting follower.

use terrace_core::cluster::NodeIdentity;
use terrace_core::config::TerraceConfig;
use terrace_core::error::TerraceError;
use terrace_core::{Level, LevelDef};

use crate::components::RuntimePaths;

/// Definition of the root bootstrap level.
pub struct BootstrapDef {
    identity: NodeIdentity,
    paths: RuntimePaths,
}

impl BootstrapDef {
    /// Resolves identity and paths up front; `configure_level` only
    /// publishes them.
    pub fn new(config: &TerraceConfig) -> Self {
        Self {
            identity: NodeIdentity::from_config(config),
            paths: RuntimePaths::from_config(&config.general),
        }
    }
}

impl LevelDef for BootstrapDef {
    fn name(&self) -> &'static str {
        "bootstrap"
    }

    fn configure_level(&self, level: &Level) -> Result<(), TerraceError> {
        tracing::info!(
            node_id = %self.identity.id,
            node = %self.identity.name,
            data_dir = %self.paths.data_dir.display(),
            "bootstrap level configuring"
        );
        level.add(self.identity.clone())?.add(self.paths.clone())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terrace_core::error::{ClusterError, TerraceError};

    #[test]
    fn bootstrap_publishes_identity_and_paths() {
        let mut level =
            Level::root(BootstrapDef::new(&TerraceConfig::default())).expect("should build");
        level.configure().expect("should configure");

        assert!(level.get::<NodeIdentity>().is_ok());
        assert!(level.get::<RuntimePaths>().is_ok());
    }

    #[test]
    fn cluster_settings_are_not_visible_at_bootstrap() {
        let mut level =
            Level::root(BootstrapDef::new(&TerraceConfig::default())).expect("should build");
        level.configure().expect("should configure");

        let err = level.cluster_guard().unwrap_err();
        assert!(matches!(
            err,
            TerraceError::Cluster(ClusterError::SettingsNotLoaded)
        ));
        let err = level.is_startup_leader().unwrap_err();
        assert!(matches!(
            err,
            TerraceError::Cluster(ClusterError::SettingsNotLoaded)
        ));
    }

    #[test]
    fn identity_falls_back_to_standalone_name() {
        let mut level =
            Level::root(BootstrapDef::new(&TerraceConfig::default())).expect("should build");
        level.configure().expect("should configure");

        let identity = level.get::<NodeIdentity>().expect("identity registered");
        assert_eq!(identity.name, "standalone");
    }
}
