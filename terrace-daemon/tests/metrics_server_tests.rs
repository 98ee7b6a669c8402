//! Integration tests for metrics server functionality.

use serial_test::serial;
use terrace_core::config::MetricsConfig;
use terrace_daemon::metrics_server;

#[test]
#[serial]
fn test_install_metrics_recorder_succeeds_with_valid_config() {
    // Given: A valid metrics configuration
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "127.0.0.1".to_string(),
        port: 19464, // Use non-standard port to avoid conflicts
    };

    // When: Installing the metrics recorder
    let result = metrics_server::install_metrics_recorder(&config);

    // Then: Should succeed
    assert!(
        result.is_ok(),
        "install_metrics_recorder should succeed with valid config: {:?}",
        result.err()
    );
}

#[test]
#[serial]
fn test_install_metrics_recorder_fails_with_invalid_address() {
    // Given: An invalid metrics configuration (invalid IP)
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "999.999.999.999".to_string(),
        port: 9464,
    };

    // When: Installing the metrics recorder
    let result = metrics_server::install_metrics_recorder(&config);

    // Then: Should fail before touching the global recorder
    assert!(
        result.is_err(),
        "install_metrics_recorder should fail with invalid address"
    );
}

#[test]
#[serial]
fn test_platform_builds_with_metrics_disabled() {
    // Given: A config with metrics disabled (avoids global recorder conflict in tests)
    let temp_dir = tempfile::tempdir().expect("should create temp dir");
    let mut config = terrace_core::config::TerraceConfig::default();
    config.metrics.enabled = false;
    config.general.pid_file = String::new();
    config.general.data_dir = temp_dir.path().display().to_string();

    // When: Building the platform
    let result = terrace_daemon::platform::Platform::build_from_config(config);

    // Then: Should succeed without installing a recorder (no port bind occurs)
    assert!(
        result.is_ok(),
        "platform should build with metrics disabled: {:?}",
        result.err()
    );
}
