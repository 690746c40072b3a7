//! Hot reload of server lists from the configuration file.
//!
//! # Data Flow
//! ```text
//! parent dir events ──▶ filter on file name ──▶ load + validate ──▶ mpsc ──▶ Balancer::apply_config
//!                                                    │
//!                                                    └─ invalid: logged, nothing sent
//! ```
//!
//! # Design Decisions
//! - The parent directory is watched, not the file. Editors and deploy tools
//!   replace configs by renaming a temp file over them, which detaches a
//!   watch placed on the old inode.
//! - Only configs that pass validation are sent; receivers never see a
//!   half-written or rejected file.

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::BalancerConfig;

/// Watches one configuration file and publishes validated reloads.
#[derive(Debug)]
pub struct ConfigWatcher {
    reloader: Reloader,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end for validated configs.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<BalancerConfig>) {
        let (updates, rx) = mpsc::unbounded_channel();
        let reloader = Reloader {
            path: path.to_path_buf(),
            file_name: path.file_name().map(OsString::from),
            updates,
        };
        (Self { reloader }, rx)
    }

    /// Start watching. Reloads stop when the returned handle is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = watch_dir(&self.reloader.path);
        let reloader = self.reloader;
        let path = reloader.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => reloader.on_event(&event),
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, dir = ?dir, "Config watcher started");
        Ok(watcher)
    }
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[derive(Debug)]
struct Reloader {
    path: PathBuf,
    file_name: Option<OsString>,
    updates: mpsc::UnboundedSender<BalancerConfig>,
}

impl Reloader {
    fn concerns_config(&self, event: &Event) -> bool {
        let relevant_kind = matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_));
        relevant_kind
            && event
                .paths
                .iter()
                .any(|p| p.file_name() == self.file_name.as_deref())
    }

    fn on_event(&self, event: &Event) {
        if self.concerns_config(event) {
            self.reload();
        }
    }

    /// Load the file and publish it if valid. Returns whether a config was sent.
    fn reload(&self) -> bool {
        match load_config(&self.path) {
            Ok(config) => {
                tracing::info!(
                    path = ?self.path,
                    services = config.services.len(),
                    servers = config.servers.len(),
                    "Config reloaded"
                );
                if self.updates.send(config).is_err() {
                    tracing::debug!("Config receiver dropped, ignoring change");
                    return false;
                }
                true
            }
            Err(e) => {
                tracing::error!(path = ?self.path, error = %e, "Rejected config change, keeping current server lists");
                false
            }
        }
    }
}
