//! Cluster state: startup leadership and node identity.
//!
//! [`StartupLeader`] answers one question, fixed at construction: does
//! this node perform the one-time startup tasks (migrations, cache
//! priming, registrations) for the whole installation?
//!
//! | cluster.enabled | cluster.web.startup_leader | leader |
//! |-----------------|----------------------------|--------|
//! | false / absent  | (ignored)                  | true   |
//! | true            | true                       | true   |
//! | true            | false / absent             | false  |
//!
//! A standalone node is always its own leader. In a cluster exactly one
//! web node should carry the flag; electing it is the operator's job,
//! not this crate's.

use serde::Serialize;
use uuid::Uuid;

use crate::config::TerraceConfig;
use crate::container::Component;

// ─── StartupLeader ───────────────────────────────────────────────────

/// Startup leadership of this node, resolved once from configuration.
///
/// Registered into the settings level; lower levels resolve it to gate
/// leader-only registrations. The value never changes for the lifetime
/// of the process.
#[derive(Debug, Clone, Copy)]
pub struct StartupLeader {
    leader: bool,
}

impl StartupLeader {
    /// Resolves leadership from the cluster settings.
    pub fn from_config(config: &TerraceConfig) -> Self {
        let leader = if config.cluster.enabled {
            config.cluster.web.startup_leader
        } else {
            true
        };
        Self { leader }
    }

    /// Whether this node performs startup-leader-only tasks.
    pub fn is_startup_leader(&self) -> bool {
        self.leader
    }
}

impl Component for StartupLeader {}

// ─── NodeIdentity ────────────────────────────────────────────────────

/// Identity of this process within an installation.
///
/// The id is generated per process start and shows up in cluster logs
/// and health output; the name comes from `cluster.node_name`, falling
/// back to `"standalone"` for single-node installations.
#[derive(Debug, Clone, Serialize)]
pub struct NodeIdentity {
    /// Per-process instance id
    pub id: Uuid,
    /// Operator-assigned node name
    pub name: String,
}

impl NodeIdentity {
    /// Creates an identity with a fresh instance id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }

    /// Derives the identity from configuration.
    pub fn from_config(config: &TerraceConfig) -> Self {
        let name = if config.cluster.node_name.trim().is_empty() {
            "standalone".to_owned()
        } else {
            config.cluster.node_name.clone()
        };
        Self::new(name)
    }
}

impl Component for NodeIdentity {}

// ─── Tests ───────────────────────────────────────────────────────────
