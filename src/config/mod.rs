//! Pipeline Configuration Module
//!
//! Provides analyzer thresholds and generator timing loaded from TOML files.
//!
//! ## Loading Order
//!
//! 1. `QUALITY_WATCH_CONFIG` environment variable (path to TOML file)
//! 2. `quality_watch.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! // In main():
//! let (cfg, source) = PipelineConfig::load();
//! config::init(cfg, source);
//!
//! // Anywhere in the codebase:
//! let delay = config::get().analyzer.analysis_delay_ms;
//! ```
//!
//! `reload()` re-reads the active file and swaps the new values in
//! atomically; readers holding an older `Arc` keep a consistent snapshot.

mod pipeline_config;
pub mod defaults;
pub mod validation;
pub mod watcher;

pub use pipeline_config::*;

use arc_swap::ArcSwap;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

/// Global pipeline configuration, initialized once at startup.
static PIPELINE_CONFIG: OnceLock<ArcSwap<PipelineConfig>> = OnceLock::new();

/// Where the global configuration was loaded from.
static CONFIG_SOURCE: OnceLock<ConfigSource> = OnceLock::new();

/// Initialize the global pipeline configuration.
///
/// Only the first call takes effect; later calls are logged and ignored.
pub fn init(config: PipelineConfig, source: ConfigSource) {
    if PIPELINE_CONFIG.set(ArcSwap::from_pointee(config)).is_err()
        || CONFIG_SOURCE.set(source).is_err()
    {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Current pipeline configuration.
///
/// Falls back to built-in defaults when `init()` has not been called,
/// which keeps unit tests free of global setup.
pub fn get() -> Arc<PipelineConfig> {
    PIPELINE_CONFIG
        .get()
        .map_or_else(|| Arc::new(PipelineConfig::default()), |slot| slot.load_full())
}

/// Check whether the config has been initialized.
pub fn is_initialized() -> bool {
    PIPELINE_CONFIG.get().is_some()
}

/// Path of the file backing the global config, if any.
pub fn source_path() -> Option<&'static std::path::Path> {
    CONFIG_SOURCE.get().and_then(ConfigSource::path)
}

// ============================================================================
// Hot Reload
// ============================================================================

/// One leaf value that differs between two configs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChange {
    /// Dotted key path, e.g. `analyzer.noise_threshold`
    pub key: String,
    pub old: String,
    pub new: String,
}

impl std::fmt::Display for ConfigChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} -> {}", self.key, self.old, self.new)
    }
}

/// Re-read the active config file, validate it, and swap it in.
///
/// On any error the previous config stays active.
pub fn reload() -> Result<Vec<ConfigChange>, ConfigError> {
    let path = source_path().ok_or(ConfigError::NoSource)?;
    let slot = PIPELINE_CONFIG.get().ok_or(ConfigError::NoSource)?;

    let fresh = PipelineConfig::load_from_file(path)?;
    let changes = diff(&slot.load(), &fresh)?;
    if !changes.is_empty() {
        for change in &changes {
            tracing::info!(%change, "Config value changed");
        }
        slot.store(Arc::new(fresh));
    }
    Ok(changes)
}

/// Leaf-by-leaf difference between two configs, ordered by key.
pub fn diff(old: &PipelineConfig, new: &PipelineConfig) -> Result<Vec<ConfigChange>, ConfigError> {
    let old = flatten(old)?;
    let mut new = flatten(new)?;

    let mut changes = Vec::new();
    for (key, old_value) in old {
        let new_value = new.remove(&key).unwrap_or_else(|| "<unset>".to_string());
        if new_value != old_value {
            changes.push(ConfigChange {
                key,
                old: old_value,
                new: new_value,
            });
        }
    }
    // Keys only present in the new config (e.g. an optional seed being set)
    changes.extend(new.into_iter().map(|(key, new_value)| ConfigChange {
        key,
        old: "<unset>".to_string(),
        new: new_value,
    }));
    changes.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(changes)
}

fn flatten(config: &PipelineConfig) -> Result<BTreeMap<String, String>, ConfigError> {
    let value = toml::Value::try_from(config).map_err(ConfigError::Serialize)?;
    let mut leaves = BTreeMap::new();
    collect_leaves(&value, "", &mut leaves);
    Ok(leaves)
}

fn collect_leaves(value: &toml::Value, prefix: &str, out: &mut BTreeMap<String, String>) {
    match value.as_table() {
        Some(table) => {
            for (k, v) in table {
                let path = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                collect_leaves(v, &path, out);
            }
        }
        None => {
            out.insert(prefix.to_string(), value.to_string());
        }
    }
}
