//! Concrete platform components wired into the level chain.
//!
//! Levels only decide *which* of these get registered; the components
//! themselves carry the behavior. Passive components (markers, path
//! bundles) keep the default no-op lifecycle hooks.

use std::path::{Path, PathBuf};

use terrace_core::config::{GeneralConfig, TerraceConfig};
use terrace_core::error::TerraceError;
use terrace_core::metrics as m;
use terrace_core::{Component, Container, Module};

// ─── RuntimePaths ────────────────────────────────────────────────────

/// Filesystem locations resolved once at bootstrap.
///
/// Registered at the bootstrap level so every later level can resolve
/// the data directory without re-reading configuration.
#[derive(Debug, Clone)]
pub struct RuntimePaths {
    /// Directory for runtime state written by platform components.
    pub data_dir: PathBuf,
    /// Pid file location; `None` disables pid file handling.
    pub pid_file: Option<PathBuf>,
}

impl RuntimePaths {
    /// Resolves paths from the `[general]` config section.
    ///
    /// An empty `pid_file` string disables the pid file.
    pub fn from_config(general: &GeneralConfig) -> Self {
        let pid_file = if general.pid_file.trim().is_empty() {
            None
        } else {
            Some(PathBuf::from(&general.pid_file))
        };
        Self {
            data_dir: PathBuf::from(&general.data_dir),
            pid_file,
        }
    }
}

impl Component for RuntimePaths {}

// ─── Cluster presence ────────────────────────────────────────────────

/// Announces this node to the cluster while the services level runs.
///
/// Registered only when `cluster.enabled` is true.
pub struct ClusterAnnouncer {
    node: String,
}

impl ClusterAnnouncer {
    pub fn new(node: impl Into<String>) -> Self {
        Self { node: node.into() }
    }
}

impl Component for ClusterAnnouncer {
    fn start(&self) -> Result<(), TerraceError> {
        tracing::info!(node = %self.node, "announcing node to cluster");
        Ok(())
    }

    fn stop(&self) -> Result<(), TerraceError> {
        tracing::info!(node = %self.node, "node leaving cluster");
        Ok(())
    }
}

/// Marks a node that runs outside any cluster.
///
/// The inverse branch of [`ClusterAnnouncer`]; passive, exists so the
/// rest of the platform can detect standalone mode by type lookup.
#[derive(Debug, Default)]
pub struct StandaloneMarker;

impl Component for StandaloneMarker {}

// ─── Telemetry ───────────────────────────────────────────────────────

/// Extension module that wires telemetry during the platform level's
/// configure pass.
///
/// Demonstrates late-bound registration: the module resolves the config
/// from its scope and registers a [`MetricsBeacon`] only when metrics
/// are enabled.
#[derive(Debug, Default)]
pub struct TelemetryModule;

impl Component for TelemetryModule {
    fn as_module(&self) -> Option<&dyn Module> {
        Some(self)
    }
}

impl Module for TelemetryModule {
    fn configure(&self, container: &Container) -> Result<(), TerraceError> {
        let Some(config) = container.get_optional::<TerraceConfig>() else {
            tracing::debug!("no config in scope, telemetry not wired");
            return Ok(());
        };

        if config.metrics.enabled {
            container.add(MetricsBeacon::default())?;
            tracing::debug!("metrics beacon registered");
        } else {
            tracing::debug!("metrics disabled, beacon not registered");
        }
        Ok(())
    }
}

/// Publishes build information once the platform level starts.
#[derive(Debug)]
pub struct MetricsBeacon {
    version: &'static str,
}

impl Default for MetricsBeacon {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

impl Component for MetricsBeacon {
    fn start(&self) -> Result<(), TerraceError> {
        metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => self.version).set(1.0);
        tracing::info!(version = self.version, "build info published");
        Ok(())
    }

    fn stop(&self) -> Result<(), TerraceError> {
        tracing::debug!("metrics beacon stopped");
        Ok(())
    }
}

// ─── Startup tasks ───────────────────────────────────────────────────

/// Leader-only startup task: records the running version under the
/// data directory.
///
/// Runs inside the ephemeral startup level, so it executes exactly once
/// per bring-up and only on the startup leader.
pub struct VersionStamp {
    path: PathBuf,
}

impl VersionStamp {
    /// Stamp location: `<data_dir>/version-stamp`.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("version-stamp"),
        }
    }

    /// Path the stamp is written to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Component for VersionStamp {
    fn start(&self) -> Result<(), TerraceError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, format!("{}\n", env!("CARGO_PKG_VERSION")))?;
        tracing::info!(path = %self.path.display(), "version stamp written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── RuntimePaths tests ──

    #[test]
    fn runtime_paths_from_default_config() {
        let paths = RuntimePaths::from_config(&GeneralConfig::default());
        assert_eq!(paths.data_dir, PathBuf::from("/var/lib/terrace"));
        assert_eq!(paths.pid_file, Some(PathBuf::from("/var/run/terrace.pid")));
    }

    #[test]
    fn runtime_paths_empty_pid_file_disables() {
        let general = GeneralConfig {
            pid_file: String::new(),
            ..GeneralConfig::default()
        };
        let paths = RuntimePaths::from_config(&general);
        assert!(paths.pid_file.is_none());
    }

    #[test]
    fn runtime_paths_whitespace_pid_file_disables() {
        let general = GeneralConfig {
            pid_file: "   ".to_owned(),
            ..GeneralConfig::default()
        };
        let paths = RuntimePaths::from_config(&general);
        assert!(paths.pid_file.is_none());
    }

    // ── TelemetryModule tests ──

    #[test]
    fn telemetry_registers_beacon_when_metrics_enabled() {
        let container = Container::new();
        let mut config = TerraceConfig::default();
        config.metrics.enabled = true;
        container.add(config).unwrap();

        TelemetryModule.configure(&container).unwrap();

        assert!(container.get_optional::<MetricsBeacon>().is_some());
    }

    #[test]
    fn telemetry_skips_beacon_when_metrics_disabled() {
        let container = Container::new();
        container.add(TerraceConfig::default()).unwrap();

        TelemetryModule.configure(&container).unwrap();

        assert!(container.get_optional::<MetricsBeacon>().is_none());
    }

    #[test]
    fn telemetry_tolerates_missing_config() {
        let container = Container::new();
        TelemetryModule.configure(&container).unwrap();
        assert!(container.get_optional::<MetricsBeacon>().is_none());
    }

    #[test]
    fn telemetry_resolves_config_from_parent_scope() {
        let parent = Container::new();
        let mut config = TerraceConfig::default();
        config.metrics.enabled = true;
        parent.add(config).unwrap();

        let child = parent.new_child();
        TelemetryModule.configure(&child).unwrap();

        // beacon lands in the scope being configured, not the parent
        assert!(child.get_optional::<MetricsBeacon>().is_some());
        assert!(parent.get_optional::<MetricsBeacon>().is_none());
    }

    // ── VersionStamp tests ──

    #[test]
    fn version_stamp_writes_file() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let stamp = VersionStamp::new(dir.path());

        stamp.start().expect("stamp should write");

        let content = std::fs::read_to_string(stamp.path()).expect("should read stamp");
        assert_eq!(content.trim(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn version_stamp_creates_missing_data_dir() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let nested = dir.path().join("state").join("terrace");
        let stamp = VersionStamp::new(&nested);

        stamp.start().expect("stamp should create parent dirs");

        assert!(stamp.path().exists());
    }

    #[test]
    fn version_stamp_overwrite_is_idempotent() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let stamp = VersionStamp::new(dir.path());

        stamp.start().expect("first write");
        stamp.start().expect("second write");

        let content = std::fs::read_to_string(stamp.path()).expect("should read stamp");
        assert_eq!(content.trim(), env!("CARGO_PKG_VERSION"));
    }
}
