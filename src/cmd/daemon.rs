// driftsync: Catalog-Driven Infrastructure Sync Controller
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Daemon mode: watch conditions and apply tasks until stopped.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::error::{Canceled, Result};
use crate::monitor::ConditionMonitor;
use crate::watcher::{NullWatcher, Watcher};

use super::{build_manager, install_signal_handler};

/// Runs the controller until the process is told to stop.
///
/// All configured tasks are created up front; the condition monitor
/// then owns the loop. The monitor exits either through cancellation
/// (clean shutdown) or a fatal watcher error.
///
/// # Errors
///
/// Returns task-creation failures and fatal monitor errors.
pub async fn run_daemon_command(config: &Config) -> Result<()> {
    let config = Arc::new(config.clone());
    let manager = Arc::new(build_manager(&config));

    let cancel = CancellationToken::new();
    install_signal_handler(&cancel);

    for task in &config.tasks {
        manager
            .task_create(&cancel, task.clone())
            .await
            .with_context(|| format!("failed to create task '{}'", task.name))?;
    }

    let watcher: Arc<dyn Watcher> = Arc::new(NullWatcher::new());
    let monitor = ConditionMonitor::new(Arc::clone(&manager), watcher);

    info!(tasks = config.tasks.len(), "daemon started");
    match monitor.run(&cancel).await {
        Err(e) if e.is::<Canceled>() => {
            info!("shutdown complete");
            Ok(())
        }
        other => other,
    }
}
