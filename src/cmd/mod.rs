// driftsync: Catalog-Driven Infrastructure Sync Controller
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Command handlers: the three run modes plus config introspection.
//!
//! ```text
//! daemon   tasks created -> ConditionMonitor::run until cancel
//! once     tasks created (no buffer periods) -> one run each,
//!          watch_dep keeps templates rendering in the background
//! inspect  disposable driver per task -> aggregated plans
//! ```

pub mod daemon;
pub mod inspect;
pub mod once;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::Config;
use crate::state::{InMemoryStore, Store};
use crate::task::TasksManager;

pub use daemon::run_daemon_command;
pub use inspect::run_inspect_command;
pub use once::run_once_command;

/// Prints every resolved option as pretty JSON.
pub fn run_options_command(config: &Config) {
    match serde_json::to_string_pretty(config) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => eprintln!("failed to render config: {e}"),
    }
}

/// Builds the in-memory-store-backed manager every run mode starts from.
fn build_manager(config: &Arc<Config>) -> TasksManager {
    let store = Arc::new(InMemoryStore::new(Arc::clone(config)));
    TasksManager::new(Arc::clone(config), store as Arc<dyn Store>)
}

/// Cancels the root token on the first ctrl-c.
fn install_signal_handler(cancel: &CancellationToken) {
    let cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("received ctrl-c, shutting down...");
            cancel.cancel();
        }
    });
}
