//! Polling-based config file watcher.
//!
//! Checks the config file's mtime every 2 seconds. When a change is detected,
//! debounces for 500ms (to handle partial writes from editors), then calls
//! `config::reload()` and sends the result via an mpsc channel.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::defaults::{CONFIG_DEBOUNCE_MS, CONFIG_POLL_INTERVAL_MS};
use super::ConfigChange;

/// Events emitted by the config watcher.
#[derive(Debug)]
pub enum ConfigEvent {
    /// Config was successfully reloaded with these changes.
    Reloaded(Vec<ConfigChange>),
    /// Reload was attempted but failed (old config remains active).
    Error(String),
}

/// Run the config file watcher loop.
///
/// Polls `path` for mtime changes and reloads the global config when detected.
/// Returns when the channel is closed or `cancel` fires.
pub async fn run_config_watcher(
    path: PathBuf,
    tx: mpsc::Sender<ConfigEvent>,
    cancel: CancellationToken,
) {
    run_with_reload(path, tx, cancel, super::reload).await;
}

/// Watcher loop with an injectable reload step.
pub(crate) async fn run_with_reload<F>(
    path: PathBuf,
    tx: mpsc::Sender<ConfigEvent>,
    cancel: CancellationToken,
    mut reload: F,
) where
    F: FnMut() -> Result<Vec<ConfigChange>, super::ConfigError>,
{
    tracing::info!(path = %path.display(), "Config watcher started");

    let poll = Duration::from_millis(CONFIG_POLL_INTERVAL_MS);
    let debounce = Duration::from_millis(CONFIG_DEBOUNCE_MS);
    let mut last_mtime = get_mtime(&path);

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!("Config watcher cancelled");
                return;
            }
            () = tokio::time::sleep(poll) => {}
        }

        // If we can't read mtime (file deleted, permissions), warn and keep polling
        let Some(current) = get_mtime(&path) else {
            // Only warn if we previously had a valid mtime (file was deleted)
            if last_mtime.is_some() {
                tracing::warn!(
                    path = %path.display(),
                    "Config file not accessible, keeping current config, will retry"
                );
                last_mtime = None;
            }
            continue;
        };

        // A file that reappears counts as changed
        if last_mtime == Some(current) {
            continue;
        }

        // Debounce: wait, then re-check mtime to ensure write is complete
        tokio::time::sleep(debounce).await;
        if get_mtime(&path) != Some(current) {
            // Still changing, wait for next poll cycle
            continue;
        }

        last_mtime = Some(current);

        let event = match reload() {
            Ok(changes) => ConfigEvent::Reloaded(changes),
            Err(e) => {
                tracing::error!(error = %e, "Config hot-reload failed, keeping previous config");
                ConfigEvent::Error(e.to_string())
            }
        };

        if tx.send(event).await.is_err() {
            tracing::debug!("Config watcher channel closed, stopping");
            return;
        }
    }
}

/// Read the modification time of a file, returning None on any error.
fn get_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).ok().and_then(|m| m.modified().ok())
}
