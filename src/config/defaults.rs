//! System-wide default constants.
//!
//! Centralises the timing and lookup constants used across the pipeline.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Config Loading
// ============================================================================

/// Environment variable holding the path to a TOML config file.
pub const CONFIG_ENV_VAR: &str = "QUALITY_WATCH_CONFIG";

/// Config file looked up in the working directory when the env var is unset.
pub const LOCAL_CONFIG_FILE: &str = "quality_watch.toml";

// ============================================================================
// Generator
// ============================================================================

/// Default period between generated samples (ms).
pub const DEFAULT_GENERATION_INTERVAL_MS: u64 = 200;

// ============================================================================
// Analyzer
// ============================================================================

/// Floor on analysis latency (ms).
///
/// `effective_latency = max(analysis_delay_ms, MIN_ANALYSIS_LATENCY_MS)`,
/// applied even when `analysis_delay_ms = 0`.
pub const MIN_ANALYSIS_LATENCY_MS: u64 = 500;

// ============================================================================
// Config Watcher
// ============================================================================

/// Interval between config file mtime checks (ms).
pub const CONFIG_POLL_INTERVAL_MS: u64 = 2_000;

/// Debounce after a detected change before reloading (ms).
///
/// Editors often write in stages.
pub const CONFIG_DEBOUNCE_MS: u64 = 500;

/// Capacity of the config event channel.
pub const CONFIG_EVENT_CHANNEL_SIZE: usize = 8;

// ============================================================================
// Orchestrator
// ============================================================================

/// Interval between periodic pipeline stats log lines (seconds).
pub const STATS_LOG_INTERVAL_SECS: u64 = 30;
