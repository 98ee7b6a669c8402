//! Platform assembly and lifecycle management.
//!
//! The [`Platform`] is the central coordinator of `terrace-daemon`.
//! It loads configuration, assembles the level chain, manages ordered
//! startup/shutdown, and runs the main signal loop.
//!
//! # Bring-up Order (outer scopes before inner)
//!
//! 1. bootstrap (node identity, runtime paths)
//! 2. settings (full config, startup leadership)
//! 3. services (cluster-conditional wiring)
//! 4. platform (extension modules)
//! 5. ephemeral startup level (leader-only tasks, discarded after use)
//!
//! # Shutdown Order (reverse)
//!
//! Levels stop 4 -> 1, best-effort, then destroy in the same order.
//! Start failures roll back the already-started prefix here; the level
//! layer itself never rolls back.

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::broadcast;

use terrace_core::Level;
use terrace_core::cluster::NodeIdentity;
use terrace_core::config::TerraceConfig;
use terrace_core::level::LevelState;
use terrace_core::metrics as m;

use crate::health::{LevelHealth, PlatformHealth, aggregate_status};
use crate::levels::{BootstrapDef, PlatformDef, ServicesDef, SettingsDef, StartupDef};
use crate::metrics_server;

/// The terrace platform: a configured level chain plus daemon plumbing.
///
/// Owns the four persistent levels in bring-up order. The ephemeral
/// startup level is created and destroyed inside [`Platform::run`] and
/// never stored.
pub struct Platform {
    /// Loaded and validated configuration.
    config: TerraceConfig,
    /// Persistent levels in bring-up order.
    levels: Vec<Level>,
    /// Shutdown broadcast sender (signals background tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("config", &self.config)
            .field(
                "levels",
                &self.levels.iter().map(Level::name).collect::<Vec<_>>(),
            )
            .field("start_time", &self.start_time)
            .finish_non_exhaustive()
    }
}

impl Platform {
    /// Load configuration and assemble the platform.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be read, parsed, or
    /// validated, or if any level fails to configure.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = TerraceConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config)
    }

    /// Assemble the platform from an already-loaded configuration.
    ///
    /// Useful for testing or when config has already been loaded.
    pub fn build_from_config(config: TerraceConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        // Install metrics recorder before any level configures
        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        let levels = assemble_levels(&config)?;

        if config.metrics.enabled {
            record_platform_metrics();
        }

        tracing::info!(levels = levels.len(), "platform configured");

        let (shutdown_tx, _) = broadcast::channel(16);

        Ok(Self {
            config,
            levels,
            shutdown_tx,
            start_time: Instant::now(),
        })
    }

    /// Start all levels in bring-up order, fail-fast.
    ///
    /// On failure, already-started levels are rolled back by stopping
    /// them in reverse order before the error is returned.
    pub fn start_levels(&mut self) -> Result<()> {
        let bringup_start = Instant::now();

        for idx in 0..self.levels.len() {
            let name = self.levels[idx].name();
            if let Err(e) = self.levels[idx].start() {
                tracing::warn!(level = name, "startup failed, rolling back started levels");
                for level in self.levels[..idx].iter_mut().rev() {
                    if let Err(stop_err) = level.stop() {
                        tracing::error!(
                            level = %level.name(),
                            error = %stop_err,
                            "rollback stop failed"
                        );
                    }
                }
                self.update_started_gauge();
                return Err(anyhow::anyhow!("failed to start level '{}': {}", name, e));
            }
        }

        self.update_started_gauge();
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(m::DAEMON_BRINGUP_DURATION_SECONDS)
            .set(bringup_start.elapsed().as_secs_f64());

        tracing::info!(levels = self.levels.len(), "all levels started");
        Ok(())
    }

    /// Run leader-only startup tasks in an ephemeral level.
    ///
    /// The level is a child of the platform level, walked through its
    /// whole lifecycle here, and discarded. This is the production use
    /// of `destroy()`: the parent keeps no trace of it afterwards.
    pub fn run_startup_tasks(&mut self) -> Result<()> {
        let parent = self
            .levels
            .last()
            .ok_or_else(|| anyhow::anyhow!("platform chain is empty"))?;

        let mut startup = Level::child(StartupDef::new(&self.config), parent)
            .map_err(|e| anyhow::anyhow!("failed to build startup level: {}", e))?;
        startup
            .configure()
            .map_err(|e| anyhow::anyhow!("failed to configure startup level: {}", e))?;
        startup
            .start()
            .map_err(|e| anyhow::anyhow!("startup tasks failed: {}", e))?;
        startup
            .stop()
            .map_err(|e| anyhow::anyhow!("failed to stop startup level: {}", e))?;
        startup
            .destroy()
            .map_err(|e| anyhow::anyhow!("failed to destroy startup level: {}", e))?;

        tracing::info!("startup tasks complete");
        Ok(())
    }

    /// Stop all levels in reverse order, best-effort.
    ///
    /// Every level is attempted; the first failure is the one returned.
    pub fn stop_levels(&mut self) -> Result<()> {
        let mut first_error = None;

        for level in self.levels.iter_mut().rev() {
            if let Err(e) = level.stop() {
                tracing::error!(level = %level.name(), error = %e, "failed to stop level");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        self.update_started_gauge();

        match first_error {
            Some(e) => Err(anyhow::anyhow!("failed to stop platform cleanly: {}", e)),
            None => Ok(()),
        }
    }

    /// Destroy all levels in reverse order, best-effort.
    ///
    /// Children detach from their parents as they go; the first failure
    /// is the one returned.
    pub fn destroy_levels(&mut self) -> Result<()> {
        let mut first_error = None;

        for level in self.levels.iter_mut().rev() {
            if let Err(e) = level.destroy() {
                tracing::error!(level = %level.name(), error = %e, "failed to destroy level");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(anyhow::anyhow!("failed to destroy platform cleanly: {}", e)),
            None => Ok(()),
        }
    }

    /// Bring the platform up and block until a shutdown signal arrives.
    ///
    /// # Shutdown Triggers
    ///
    /// - `SIGTERM` (from systemd, Docker, or `kill`)
    /// - `SIGINT` (Ctrl+C)
    pub async fn run(&mut self) -> Result<()> {
        // Write PID file if configured
        let pid_path = self.pid_path();
        if let Some(path) = &pid_path {
            write_pid_file(path)?;
        }

        if let Err(e) = self.start_levels() {
            if let Some(path) = &pid_path {
                remove_pid_file(path);
            }
            return Err(e);
        }

        if let Err(e) = self.run_startup_tasks() {
            tracing::error!(error = %e, "startup tasks failed, shutting down");
            if let Err(stop_err) = self.stop_levels() {
                tracing::error!(error = %stop_err, "shutdown after failed startup also failed");
            }
            if let Some(path) = &pid_path {
                remove_pid_file(path);
            }
            return Err(e);
        }

        // Spawn uptime updater task
        let mut uptime_updater_task = if self.config.metrics.enabled {
            let shutdown_rx = self.shutdown_tx.subscribe();
            Some(spawn_uptime_updater(self.start_time, shutdown_rx))
        } else {
            None
        };

        let health = self.health();
        match serde_json::to_string(&health) {
            Ok(json) => tracing::info!(health = %json, "platform running"),
            Err(e) => tracing::warn!(error = %e, "failed to serialize health report"),
        }

        // Main signal loop
        let signal = wait_for_shutdown_signal().await?;
        tracing::info!(signal = signal, "shutdown signal received");

        let _ = self.shutdown_tx.send(());
        if let Some(task) = uptime_updater_task.take() {
            let _ = task.await;
        }

        // Reverse teardown; attempt both passes before reporting
        let stop_result = self.stop_levels();
        let destroy_result = self.destroy_levels();

        if let Some(path) = &pid_path {
            remove_pid_file(path);
        }

        stop_result?;
        destroy_result?;

        tracing::info!("platform shut down");
        Ok(())
    }

    /// Get the current aggregated health status.
    pub fn health(&self) -> PlatformHealth {
        let levels: Vec<LevelHealth> = self
            .levels
            .iter()
            .map(|level| LevelHealth {
                name: level.name().to_owned(),
                state: level.state(),
                components: level.container().len(),
            })
            .collect();

        let status = aggregate_status(&levels);
        let uptime_secs = self.start_time.elapsed().as_secs();
        let node = self
            .levels
            .first()
            .and_then(|level| level.get_optional::<NodeIdentity>())
            .map(|identity| (*identity).clone());

        if self.config.metrics.enabled {
            #[allow(clippy::cast_precision_loss)]
            metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
        }

        PlatformHealth {
            status,
            uptime_secs,
            node,
            levels,
        }
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &TerraceConfig {
        &self.config
    }

    /// The persistent levels in bring-up order.
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    fn pid_path(&self) -> Option<std::path::PathBuf> {
        let raw = self.config.general.pid_file.trim();
        if raw.is_empty() {
            None
        } else {
            Some(std::path::PathBuf::from(raw))
        }
    }

    fn update_started_gauge(&self) {
        let started = self
            .levels
            .iter()
            .filter(|level| level.state() == LevelState::Started)
            .count();
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(m::DAEMON_LEVELS_STARTED).set(started as f64);
    }
}

/// Construct and configure the persistent level chain.
fn assemble_levels(config: &TerraceConfig) -> Result<Vec<Level>> {
    let mut bootstrap = Level::root(BootstrapDef::new(config))
        .map_err(|e| anyhow::anyhow!("failed to build bootstrap level: {}", e))?;
    bootstrap
        .configure()
        .map_err(|e| anyhow::anyhow!("failed to configure bootstrap level: {}", e))?;

    let mut settings = Level::child(SettingsDef::new(config.clone()), &bootstrap)
        .map_err(|e| anyhow::anyhow!("failed to build settings level: {}", e))?;
    settings
        .configure()
        .map_err(|e| anyhow::anyhow!("failed to configure settings level: {}", e))?;

    let mut services = Level::child(ServicesDef, &settings)
        .map_err(|e| anyhow::anyhow!("failed to build services level: {}", e))?;
    services
        .configure()
        .map_err(|e| anyhow::anyhow!("failed to configure services level: {}", e))?;

    let mut platform_level = Level::child(PlatformDef, &services)
        .map_err(|e| anyhow::anyhow!("failed to build platform level: {}", e))?;
    platform_level
        .configure()
        .map_err(|e| anyhow::anyhow!("failed to configure platform level: {}", e))?;

    Ok(vec![bootstrap, settings, services, platform_level])
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Write the current process PID to a file.
///
/// Used to prevent duplicate daemon instances.
///
/// # Security
///
/// - Uses `create_new(true)` to atomically create the file (no TOCTOU race)
/// - Verifies the created file is a regular file (no symlink target)
/// - Creates the parent directory with mode 0o700
///
/// # Errors
///
/// Returns an error if the PID file cannot be written, including the
/// stale-instance case where the file already exists.
fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            let mut builder = fs::DirBuilder::new();
            builder.mode(0o700).recursive(true);
            builder.create(parent)?;
        }
        #[cfg(not(unix))]
        {
            fs::create_dir_all(parent)?;
        }
    }

    let pid = std::process::id();

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing_pid = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_string());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing_pid.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    let metadata = file.metadata()?;
    if !metadata.is_file() {
        let _ = fs::remove_file(path);
        return Err(anyhow::anyhow!(
            "PID file {} is not a regular file (possible symlink attack)",
            path.display()
        ));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        file.set_permissions(permissions)?;
    }

    writeln!(file, "{}", pid)?;

    tracing::info!(pid = pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file on daemon shutdown.
///
/// Logs a warning but does not fail if the file cannot be removed.
fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(
            path = %path.display(),
            error = %e,
            "failed to remove PID file"
        );
    } else {
        tracing::info!(path = %path.display(), "PID file removed");
    }
}

/// Record one-shot daemon metrics after assembly.
fn record_platform_metrics() {
    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "platform metrics recorded");
}

/// Spawn a background task that periodically updates the uptime metric.
///
/// Updates every 10 seconds to keep the metric fresh for Prometheus scrapes.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let uptime_secs = start_time.elapsed().as_secs();
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}
