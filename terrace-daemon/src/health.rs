//! Aggregated health reporting for the platform level chain.
//!
//! Maps each level's lifecycle state to a health status and produces
//! a unified [`PlatformHealth`] report. The overall platform status is
//! the worst status among all levels.
//!
//! # Aggregation Rule
//!
//! - All Healthy -> Healthy
//! - Any Degraded, none Unhealthy -> Degraded(reason)
//! - Any Unhealthy -> Unhealthy(reason)

use serde::Serialize;

use terrace_core::cluster::NodeIdentity;
use terrace_core::level::LevelState;

/// Health status of a level or of the whole platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "health", content = "reason", rename_all = "lowercase")]
pub enum HealthStatus {
    /// Operating normally.
    Healthy,
    /// Operating with reduced function; reason attached.
    Degraded(String),
    /// Not operating; reason attached.
    Unhealthy(String),
}

impl HealthStatus {
    /// Returns `true` for [`HealthStatus::Healthy`].
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    /// Returns `true` for [`HealthStatus::Unhealthy`].
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, HealthStatus::Unhealthy(_))
    }
}

/// Aggregated health report for the entire platform.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformHealth {
    /// Overall platform health status (worst of all levels).
    pub status: HealthStatus,
    /// Daemon uptime in seconds since start.
    pub uptime_secs: u64,
    /// Identity of this node, when the bootstrap level is up.
    pub node: Option<NodeIdentity>,
    /// Per-level health reports.
    pub levels: Vec<LevelHealth>,
}

/// Health report for a single platform level.
#[derive(Debug, Clone, Serialize)]
pub struct LevelHealth {
    /// Level name (e.g. "bootstrap", "settings").
    pub name: String,
    /// Current lifecycle state of the level.
    pub state: LevelState,
    /// Number of components registered in the level's own scope.
    pub components: usize,
}

/// Map a level's lifecycle state to a health status.
///
/// A running platform expects every level in `Started`; anything else
/// degrades or fails the report.
pub fn status_of(level: &LevelHealth) -> HealthStatus {
    match level.state {
        LevelState::Started => HealthStatus::Healthy,
        LevelState::Created => HealthStatus::Degraded("not configured".to_owned()),
        LevelState::Configured => HealthStatus::Degraded("not started".to_owned()),
        LevelState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        LevelState::Destroyed => HealthStatus::Unhealthy("destroyed".to_owned()),
    }
}

/// Aggregate per-level statuses into a single platform status.
///
/// Returns the worst status found: Unhealthy > Degraded > Healthy.
pub fn aggregate_status(levels: &[LevelHealth]) -> HealthStatus {
    let mut worst = HealthStatus::Healthy;
    let mut reasons = Vec::new();

    for level in levels {
        match status_of(level) {
            HealthStatus::Healthy => {}
            HealthStatus::Degraded(reason) => {
                if !worst.is_unhealthy() {
                    reasons.push(format!("{}: {}", level.name, reason));
                    worst = HealthStatus::Degraded(String::new());
                }
            }
            HealthStatus::Unhealthy(reason) => {
                reasons.push(format!("{}: {}", level.name, reason));
                worst = HealthStatus::Unhealthy(String::new());
            }
        }
    }

    match worst {
        HealthStatus::Healthy => HealthStatus::Healthy,
        HealthStatus::Degraded(_) => HealthStatus::Degraded(reasons.join("; ")),
        HealthStatus::Unhealthy(_) => HealthStatus::Unhealthy(reasons.join("; ")),
    }
}
