//! Error types for container, level, cluster, and config failures.

/// Top-level terrace error type.
#[derive(Debug, thiserror::Error)]
pub enum TerraceError {
    /// Configuration error
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Component container error
    #[error("container error: {0}")]
    Container(#[from] ContainerError),

    /// Platform level lifecycle error
    #[error("level error: {0}")]
    Level(#[from] LevelError),

    /// Cluster state error
    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file missing
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// Config parse failure
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// Invalid config value
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Component container error.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// Type already registered in this scope
    #[error("component type already registered: {type_name}")]
    Duplicate { type_name: &'static str },

    /// No registration for the requested type in this scope or any ancestor
    #[error("component not found: {type_name}")]
    NotFound { type_name: &'static str },

    /// A component failed to start; components after it were not started
    #[error("component '{component}' failed to start: {reason}")]
    StartFailed { component: &'static str, reason: String },

    /// One or more components failed to stop; first failure reported
    #[error("component '{component}' failed to stop: {reason}")]
    StopFailed { component: &'static str, reason: String },
}

/// Platform level lifecycle error.
#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    /// Level name empty or whitespace
    #[error("invalid level name: {reason}")]
    InvalidName { reason: String },

    /// Parent level already destroyed
    #[error("parent level '{parent}' is destroyed")]
    ParentDestroyed { parent: String },

    /// Operation not valid in the level's current state
    #[error("level '{level}' cannot {action} while {current}")]
    InvalidTransition {
        level: String,
        action: &'static str,
        current: String,
    },
}

/// Cluster state error.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// Leadership or cluster state queried before cluster settings were
    /// registered in a visible scope
    #[error("cluster settings not loaded yet")]
    SettingsNotLoaded,
}
