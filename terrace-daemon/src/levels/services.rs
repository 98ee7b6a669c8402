//! Level 3 "services": cluster-conditional service wiring.
//!
//! Exactly one of [`ClusterAnnouncer`] / [`StandaloneMarker`] is
//! registered, decided by the cluster guard against the settings level
//! above.

use terrace_core::cluster::NodeIdentity;
use terrace_core::error::TerraceError;
use terrace_core::{Level, LevelDef};

use crate::components::{ClusterAnnouncer, StandaloneMarker};

/// Definition of the services level.
pub struct ServicesDef;

impl LevelDef for ServicesDef {
    fn name(&self) -> &'static str {
        "services"
    }

    fn configure_level(&self, level: &Level) -> Result<(), TerraceError> {
        let identity = level.get::<NodeIdentity>()?;
        level
            .add_if_cluster(ClusterAnnouncer::new(identity.name.clone()))?
            .otherwise_add(StandaloneMarker)?;
        Ok(())
    }
}
