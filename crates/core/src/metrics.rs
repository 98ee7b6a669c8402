//! Metric name constants and description registration.
//!
//! Every Prometheus metric name is defined centrally here. Emission
//! sites call `metrics::counter!()`, `metrics::gauge!()`, and
//! `metrics::histogram!()` with these constants.
//!
//! # Naming convention
//!
//! - prefix: `terrace_`
//! - subsystem: `level_`, `container_`, `daemon_`
//! - suffix: `_total` (counter), `_seconds` (histogram/duration), none (gauge)
//!
//! # Example
//!
//! ```ignore
//! use terrace_core::metrics as m;
//!
//! metrics::counter!(m::CONTAINER_REGISTRATIONS_TOTAL).increment(1);
//! ```

// ─── Label keys ──────────────────────────────────────────────────────

/// Level name label key
pub const LABEL_LEVEL: &str = "level";

/// Lifecycle state label key (created, configured, started, stopped, destroyed)
pub const LABEL_STATE: &str = "state";

/// Result label key (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Level metrics ───────────────────────────────────────────────────

/// Level: state transitions (counter, labels: level, state)
pub const LEVEL_TRANSITIONS_TOTAL: &str = "terrace_level_transitions_total";

/// Level: configure pass duration (histogram, seconds, label: level)
pub const LEVEL_CONFIGURE_DURATION_SECONDS: &str = "terrace_level_configure_duration_seconds";

/// Level: start pass duration (histogram, seconds, label: level)
pub const LEVEL_START_DURATION_SECONDS: &str = "terrace_level_start_duration_seconds";

// ─── Container metrics ───────────────────────────────────────────────

/// Container: component registrations (counter)
pub const CONTAINER_REGISTRATIONS_TOTAL: &str = "terrace_container_registrations_total";

/// Container: component start failures (counter)
pub const CONTAINER_START_FAILURES_TOTAL: &str = "terrace_container_start_failures_total";

/// Container: component stop failures (counter)
pub const CONTAINER_STOP_FAILURES_TOTAL: &str = "terrace_container_stop_failures_total";

// ─── Daemon metrics ──────────────────────────────────────────────────

/// Daemon: uptime (gauge, seconds)
pub const DAEMON_UPTIME_SECONDS: &str = "terrace_daemon_uptime_seconds";

/// Daemon: levels currently in the started state (gauge)
pub const DAEMON_LEVELS_STARTED: &str = "terrace_daemon_levels_started";

/// Daemon: wall time of the full bring-up (gauge, seconds)
pub const DAEMON_BRINGUP_DURATION_SECONDS: &str = "terrace_daemon_bringup_duration_seconds";

/// Daemon: build information (gauge, always 1, labels: version)
pub const DAEMON_BUILD_INFO: &str = "terrace_daemon_build_info";

// ─── Histogram buckets ───────────────────────────────────────────────

/// Lifecycle pass duration buckets (seconds).
///
/// 1ms to 30s; settings loading and leader-only startup work dominate
/// the upper buckets.
pub const LIFECYCLE_DURATION_BUCKETS: [f64; 9] =
    [0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0];

// ─── Description registration ────────────────────────────────────────

/// Registers descriptions for every metric.
///
/// Calls `metrics::describe_counter!()`, `describe_gauge!()`, and
/// `describe_histogram!()` to set Prometheus HELP text.
///
/// Call once after the global recorder is installed, normally during
/// `terrace-daemon` startup.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Level
    describe_counter!(
        LEVEL_TRANSITIONS_TOTAL,
        "Total number of level lifecycle transitions, by level and target state"
    );
    describe_histogram!(
        LEVEL_CONFIGURE_DURATION_SECONDS,
        "Time to run a level's configure pass in seconds"
    );
    describe_histogram!(
        LEVEL_START_DURATION_SECONDS,
        "Time to start a level's components in seconds"
    );

    // Container
    describe_counter!(
        CONTAINER_REGISTRATIONS_TOTAL,
        "Total number of components registered across all scopes"
    );
    describe_counter!(
        CONTAINER_START_FAILURES_TOTAL,
        "Total number of component start failures"
    );
    describe_counter!(
        CONTAINER_STOP_FAILURES_TOTAL,
        "Total number of component stop failures"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "Terrace daemon uptime in seconds");
    describe_gauge!(
        DAEMON_LEVELS_STARTED,
        "Number of platform levels currently started"
    );
    describe_gauge!(
        DAEMON_BRINGUP_DURATION_SECONDS,
        "Wall time of the last full platform bring-up in seconds"
    );
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
