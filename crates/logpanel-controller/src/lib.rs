//! Per-source log controller for logpanel
//!
//! A [`LogSourceController`] owns everything for one log source: the tail
//! reader, the buffer, the quick-search counters and the active search.
//! [`spawn_source`] runs it on a tokio task that serializes file changes,
//! flushes, search refreshes and surface requests.

mod config;
mod controller;
mod error;
mod locator;
mod runner;
mod surface;

pub use config::Config;
pub use controller::{ControllerOptions, LogSourceController, SourceStores};
pub use error::{Error, Result};
pub use locator::FileLocator;
pub use runner::{RunnerOptions, SourceEvent, SourceHandle, spawn_source};
pub use surface::{ChannelSurface, MemorySurface, Surface};

use logpanel_logs::resolve_paths;

/// Build the controller for `kind` from configuration
pub fn open_source(
    config: &Config,
    kind: SourceKind,
    panel: PanelStateStore,
) -> Result<LogSourceController> {
    let paths = resolve_paths(config.log_path(kind))?;
    let stores = SourceStores::in_dir(&config.storage_dir(), kind, config.max_history, panel);
    let locator = FileLocator::new(config.workspace_roots.clone());

    LogSourceController::new(kind, paths, ControllerOptions::from(config), stores, locator)
}

// Re-export types used in our public API
pub use logpanel_state::PanelStateStore;
pub use logpanel_types::{JumpTarget, Push, Request, SourceKind, WatchMode};
