use anyhow::Result;
use clap::Parser;

use terrace_core::config::TerraceConfig;
use terrace_daemon::cli::DaemonCli;
use terrace_daemon::logging;
use terrace_daemon::platform::Platform;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = TerraceConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load {}: {}", cli.config.display(), e))?;

    // CLI flags win over file and environment
    if let Some(level) = cli.log_level {
        config.general.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.general.log_format = format;
    }
    if let Some(pid_file) = cli.pid_file {
        config.general.pid_file = pid_file;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;

    logging::init_tracing(&config.general)?;

    if cli.validate {
        tracing::info!(config = %cli.config.display(), "configuration valid");
        return Ok(());
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "terrace-daemon starting");

    let mut platform = Platform::build_from_config(config)?;
    platform.run().await?;

    tracing::info!("terrace-daemon shut down");
    Ok(())
}
