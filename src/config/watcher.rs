//! Configuration file watcher for hot reload.
//!
//! The parent directory is watched rather than the file itself, so a file
//! replaced by rename (editors, mounted config maps) is still picked up.
//! A burst of file events becomes a single reload once the file has been
//! quiet for the debounce period, and a reload that yields the configuration
//! already delivered is dropped.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::RelayConfig;

/// Quiet period after the last file event before the file is re-read.
pub const RELOAD_DEBOUNCE: Duration = Duration::from_millis(300);

/// Watches one configuration file and emits validated configurations.
pub struct ConfigWatcher {
    path: PathBuf,
    debounce: Duration,
    update_tx: mpsc::UnboundedSender<RelayConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for validated configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<RelayConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                debounce: RELOAD_DEBOUNCE,
                update_tx,
            },
            update_rx,
        )
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Start watching. Must be called from within a tokio runtime.
    ///
    /// The returned watcher must be kept alive for as long as updates are
    /// wanted; dropping it also ends the reload task.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let file = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if touches_file(&event, &file) => {
                    let _ = event_tx.send(());
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&watch_dir(&self.path), RecursiveMode::NonRecursive)?;

        // The file as it is now is what the server started with.
        let current = load_config(&self.path).ok();
        tokio::spawn(reload_on_change(
            self.path.clone(),
            event_rx,
            self.update_tx,
            current,
            self.debounce,
        ));

        tracing::info!(path = ?self.path, debounce_ms = self.debounce.as_millis() as u64, "Config watcher started");
        Ok(watcher)
    }
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Whether `event` writes to or creates the watched file.
fn touches_file(event: &Event, file: &Path) -> bool {
    (event.kind.is_modify() || event.kind.is_create())
        && event
            .paths
            .iter()
            .any(|p| p.file_name().is_some() && p.file_name() == file.file_name())
}

/// Reload `path` after each settled burst of `events`, forwarding configs
/// that differ from `last`. Ends when either channel closes.
async fn reload_on_change(
    path: PathBuf,
    mut events: mpsc::UnboundedReceiver<()>,
    updates: mpsc::UnboundedSender<RelayConfig>,
    mut last: Option<RelayConfig>,
    debounce: Duration,
) {
    while events.recv().await.is_some() {
        loop {
            tokio::time::sleep(debounce).await;
            let mut more = false;
            while events.try_recv().is_ok() {
                more = true;
            }
            if !more {
                break;
            }
        }

        match load_config(&path) {
            Ok(config) if last.as_ref() == Some(&config) => {
                tracing::debug!(path = ?path, "Config file touched without changes");
            }
            Ok(config) => {
                tracing::info!(path = ?path, "Config file changed, reloading");
                last = Some(config.clone());
                if updates.send(config).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
            }
        }
    }
}
