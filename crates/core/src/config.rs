//! Configuration handling for terrace.toml parsing and runtime settings.
//!
//! [`TerraceConfig`] is the top-level structure holding every section of
//! the configuration file. The two cluster keys (`cluster.enabled` and
//! `cluster.web.startup_leader`) drive conditional component registration
//! during platform bring-up.
//!
//! # Loading priority
//! 1. CLI arguments (highest)
//! 2. Environment variables (`TERRACE_CLUSTER_ENABLED=true` form)
//! 3. Config file (`terrace.toml`)
//! 4. Defaults (`Default` impls)
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), terrace_core::error::TerraceError> {
//! use terrace_core::config::TerraceConfig;
//!
//! // load from file + env overrides
//! let config = TerraceConfig::load("terrace.toml").await?;
//!
//! // parse a TOML string directly
//! let config = TerraceConfig::parse("[cluster]\nenabled = true")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::container::Component;
use crate::error::{ConfigError, TerraceError};

/// Terrace runtime configuration.
///
/// Mirrors the top-level structure of `terrace.toml`. The loaded value is
/// registered as a component in the settings level so that every lower
/// level can resolve it from its scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TerraceConfig {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,
    /// Cluster settings
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Metrics exporter settings
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl TerraceConfig {
    /// Loads configuration from a TOML file and applies env overrides.
    ///
    /// Loading order:
    /// 1. parse the TOML file
    /// 2. apply environment variable overrides
    /// 3. validate the merged result
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, TerraceError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file (no env overrides).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, TerraceError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TerraceError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                TerraceError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, TerraceError> {
        toml::from_str(toml_str).map_err(|e| {
            TerraceError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// Overrides config values from environment variables.
    ///
    /// Naming convention: `TERRACE_{SECTION}_{FIELD}`,
    /// e.g. `TERRACE_CLUSTER_ENABLED=true`.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "TERRACE_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "TERRACE_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.data_dir, "TERRACE_GENERAL_DATA_DIR");
        override_string(&mut self.general.pid_file, "TERRACE_GENERAL_PID_FILE");

        // Cluster
        override_bool(&mut self.cluster.enabled, "TERRACE_CLUSTER_ENABLED");
        override_string(&mut self.cluster.node_name, "TERRACE_CLUSTER_NODE_NAME");
        override_bool(
            &mut self.cluster.web.startup_leader,
            "TERRACE_CLUSTER_WEB_STARTUP_LEADER",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "TERRACE_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "TERRACE_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "TERRACE_METRICS_PORT");
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), TerraceError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.cluster.enabled && self.cluster.node_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "cluster.node_name".to_owned(),
                reason: "node_name must not be empty when cluster is enabled".to_owned(),
            }
            .into());
        }

        if self.metrics.enabled {
            if self.metrics.listen_addr.parse::<std::net::IpAddr>().is_err() {
                return Err(ConfigError::InvalidValue {
                    field: "metrics.listen_addr".to_owned(),
                    reason: format!("'{}' is not a valid IP address", self.metrics.listen_addr),
                }
                .into());
            }
            if self.metrics.port == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "metrics.port".to_owned(),
                    reason: "port must be non-zero".to_owned(),
                }
                .into());
            }
        }

        Ok(())
    }
}

// Lifecycle hooks stay the defaults; the config is a passive registration.
impl Component for TerraceConfig {}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log format (json, pretty)
    pub log_format: String,
    /// Data directory
    pub data_dir: String,
    /// PID file path (empty string disables the PID file)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            data_dir: "/var/lib/terrace".to_owned(),
            pid_file: "/var/run/terrace.pid".to_owned(),
        }
    }
}

/// Cluster settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Whether this process runs as part of a cluster
    pub enabled: bool,
    /// Node name as announced to the cluster (required when enabled)
    pub node_name: String,
    /// Web node settings
    #[serde(default)]
    pub web: ClusterWebConfig,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            node_name: String::new(),
            web: ClusterWebConfig::default(),
        }
    }
}

/// Cluster web node settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterWebConfig {
    /// Whether this web node performs the one-time startup tasks.
    /// Ignored when the cluster is disabled (a standalone node always
    /// leads its own startup).
    pub startup_leader: bool,
}

impl Default for ClusterWebConfig {
    fn default() -> Self {
        Self {
            startup_leader: false,
        }
    }
}

/// Metrics exporter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to expose a Prometheus endpoint
    pub enabled: bool,
    /// Listen address for the exporter
    pub listen_addr: String,
    /// Listen port for the exporter
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9464,
        }
    }
}

// --- env override helpers ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = TerraceConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert!(!config.cluster.enabled);
        assert!(config.cluster.node_name.is_empty());
        assert!(!config.cluster.web.startup_leader);
        assert!(!config.metrics.enabled);
        assert_eq!(config.metrics.port, 9464);
    }

    #[test]
    fn default_config_passes_validation() {
        let config = TerraceConfig::default();
        config.validate().unwrap();
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let config = TerraceConfig::parse("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert!(!config.cluster.enabled);
    }

    #[test]
    fn parse_partial_toml_merges_with_defaults() {
        let toml = r#"
[cluster]
enabled = true
node_name = "web-1"
"#;
        let config = TerraceConfig::parse(toml).unwrap();
        assert!(config.cluster.enabled);
        assert_eq!(config.cluster.node_name, "web-1");
        // untouched sections keep defaults
        assert_eq!(config.general.log_format, "json");
        assert!(!config.cluster.web.startup_leader);
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[general]
log_level = "warn"
log_format = "pretty"
data_dir = "/opt/terrace/data"
pid_file = "/opt/terrace/terrace.pid"

[cluster]
enabled = true
node_name = "web-2"

[cluster.web]
startup_leader = true

[metrics]
enabled = true
listen_addr = "0.0.0.0"
port = 9500
"#;
        let config = TerraceConfig::parse(toml).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.general.data_dir, "/opt/terrace/data");
        assert!(config.cluster.enabled);
        assert_eq!(config.cluster.node_name, "web-2");
        assert!(config.cluster.web.startup_leader);
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.port, 9500);
    }

    #[test]
    fn parse_invalid_toml_returns_error() {
        let result = TerraceConfig::parse("invalid = [[[toml");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            TerraceError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = TerraceConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = TerraceConfig::default();
        config.general.log_format = "xml".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_format"));
    }

    #[test]
    fn validate_rejects_empty_node_name_when_cluster_enabled() {
        let mut config = TerraceConfig::default();
        config.cluster.enabled = true;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("node_name"));
    }

    #[test]
    fn validate_accepts_empty_node_name_when_cluster_disabled() {
        let mut config = TerraceConfig::default();
        config.cluster.enabled = false;
        config.cluster.node_name = String::new();
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_bad_listen_addr_when_metrics_enabled() {
        let mut config = TerraceConfig::default();
        config.metrics.enabled = true;
        config.metrics.listen_addr = "not-an-address".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("listen_addr"));
    }

    #[test]
    fn validate_rejects_zero_port_when_metrics_enabled() {
        let mut config = TerraceConfig::default();
        config.metrics.enabled = true;
        config.metrics.port = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn env_override_string_applies() {
        let mut val = "original".to_owned();
        // SAFETY: tests run single-threaded over this var, so mutating the
        // process environment is safe.
        unsafe { std::env::set_var("TEST_TERRACE_STR", "overridden") };
        override_string(&mut val, "TEST_TERRACE_STR");
        assert_eq!(val, "overridden");
        unsafe { std::env::remove_var("TEST_TERRACE_STR") };
    }

    #[test]
    fn env_override_bool_valid() {
        let mut val = false;
        // SAFETY: tests run single-threaded over this var, so mutating the
        // process environment is safe.
        unsafe { std::env::set_var("TEST_TERRACE_BOOL", "true") };
        override_bool(&mut val, "TEST_TERRACE_BOOL");
        assert!(val);
        unsafe { std::env::remove_var("TEST_TERRACE_BOOL") };
    }

    #[test]
    fn env_override_bool_invalid_keeps_original() {
        let mut val = false;
        // SAFETY: tests run single-threaded over this var, so mutating the
        // process environment is safe.
        unsafe { std::env::set_var("TEST_TERRACE_BOOL_BAD", "not-a-bool") };
        override_bool(&mut val, "TEST_TERRACE_BOOL_BAD");
        assert!(!val);
        unsafe { std::env::remove_var("TEST_TERRACE_BOOL_BAD") };
    }

    #[test]
    fn env_override_u16_valid() {
        let mut val = 9464u16;
        // SAFETY: tests run single-threaded over this var, so mutating the
        // process environment is safe.
        unsafe { std::env::set_var("TEST_TERRACE_PORT", "9999") };
        override_u16(&mut val, "TEST_TERRACE_PORT");
        assert_eq!(val, 9999);
        unsafe { std::env::remove_var("TEST_TERRACE_PORT") };
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = "original".to_owned();
        override_string(&mut val, "TEST_TERRACE_NONEXISTENT_12345");
        assert_eq!(val, "original");
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = TerraceConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = TerraceConfig::parse(&toml_str).unwrap();
        assert_eq!(config.general.log_level, parsed.general.log_level);
        assert_eq!(config.cluster.enabled, parsed.cluster.enabled);
        assert_eq!(
            config.cluster.web.startup_leader,
            parsed.cluster.web.startup_leader
        );
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let result = TerraceConfig::from_file("/nonexistent/path/terrace.toml").await;
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            TerraceError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
