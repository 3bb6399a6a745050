// driftsync: Catalog-Driven Infrastructure Sync Controller
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Once mode: render and apply every task exactly once, in order.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::monitor::ConditionMonitor;
use crate::watcher::{NullWatcher, Watcher};

use super::{build_manager, install_signal_handler};

/// Applies every configured task a single time, then exits.
///
/// Buffer periods are not set in this mode, so each task runs on its
/// first fully-rendered template. `watch_dep` runs in the background so
/// templates keep resolving while earlier tasks apply.
///
/// # Errors
///
/// Returns the first create or run failure.
pub async fn run_once_command(config: &Config) -> Result<()> {
    let config = Arc::new(config.clone());
    let manager = Arc::new(build_manager(&config).with_once(true));

    let cancel = CancellationToken::new();
    install_signal_handler(&cancel);

    for task in &config.tasks {
        manager
            .task_create(&cancel, task.clone())
            .await
            .with_context(|| format!("failed to create task '{}'", task.name))?;
    }

    let watcher: Arc<dyn Watcher> = Arc::new(NullWatcher::new());
    let monitor = Arc::new(ConditionMonitor::new(Arc::clone(&manager), watcher));

    let dep_cancel = cancel.child_token();
    let dep_handle = {
        let monitor = Arc::clone(&monitor);
        let dep_cancel = dep_cancel.clone();
        tokio::spawn(async move { monitor.watch_dep(&dep_cancel).await })
    };

    for task in &config.tasks {
        manager
            .task_run_now(&cancel, &task.name)
            .await
            .with_context(|| format!("failed to run task '{}'", task.name))?;
        info!(task = %task.name, "task applied");
    }

    dep_cancel.cancel();
    let _ = dep_handle.await;

    info!(tasks = config.tasks.len(), "once-mode run complete");
    Ok(())
}
