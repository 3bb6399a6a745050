// driftsync: Catalog-Driven Infrastructure Sync Controller
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! The condition monitor: the daemon's main dependency-watch loop.
//!
//! ```text
//! ConditionMonitor::run(cancel)
//!   set_buffer_period on every registered driver
//!   spawn a cron loop per scheduled task  (stop token per name)
//!   spawn watcher.watch --> template_ch
//!   select:
//!     watcher result      fatal: dependency updates stopped flowing
//!     template_ch         route ID -> dynamic task -> task_run_now
//!                         (batch per tick, errors aggregated to one log)
//!     created_schedule_ch spawn a new cron loop
//!     deleted_schedule_ch cancel that task's stop token
//!     cancel              return Canceled
//! ```
//!
//! The monitor owns only its local name→stop-token map; everything else
//! is reached through the tasks manager.


use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::error::{Canceled, Result};
use crate::task::TasksManager;
use crate::watcher::Watcher;

/// Emit watcher diagnostics every this many loop iterations.
const DIAGNOSTIC_INTERVAL: u64 = 50;

/// Capacity of the template notification channel between the watcher
/// and the monitor loop.
const TEMPLATE_CHANNEL_CAPACITY: usize = 100;

/// Demultiplexes template notifications to dynamic tasks and manages
/// the scheduled-task loops.
pub struct ConditionMonitor {
    tasks: Arc<TasksManager>,
    watcher: Arc<dyn Watcher>,
}

impl ConditionMonitor {
    #[must_use]
    pub fn new(tasks: Arc<TasksManager>, watcher: Arc<dyn Watcher>) -> Self {
        Self { tasks, watcher }
    }

    /// Runs the monitor until cancellation or a fatal watcher error.
    ///
    /// # Errors
    ///
    /// Returns [`Canceled`] when the root token fires, or the watcher's
    /// error: once dependency updates stop flowing the daemon cannot
    /// make progress.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        // Everything the monitor spawns lives under this scope token,
        // so scheduled loops and the watcher exit when run() returns.
        let scope = cancel.child_token();
        let _scope_guard = scope.clone().drop_guard();

        let mut schedule_stops: HashMap<String, CancellationToken> = HashMap::new();
        for (name, driver) in self.tasks.drivers().map() {
            driver.set_buffer_period();
            if driver.task().is_scheduled() {
                self.spawn_scheduled(&scope, &mut schedule_stops, &name);
            }
        }

        let (template_tx, template_rx) = flume::bounded(TEMPLATE_CHANNEL_CAPACITY);
        let (watch_result_tx, watch_result_rx) = flume::bounded(1);
        {
            let watcher = Arc::clone(&self.watcher);
            let scope = scope.clone();
            tokio::spawn(async move {
                let result = watcher.watch(&scope, template_tx).await;
                let _ = watch_result_tx.send_async(result).await;
            });
        }

        let created_rx = self.tasks.watch_created_schedule_tasks();
        let deleted_rx = self.tasks.watch_deleted_schedule_task();
        let warn_threshold = self.tasks.config().global.dependency_warn_threshold;

        let mut iterations: u64 = 0;
        loop {
            iterations += 1;
            if iterations % DIAGNOSTIC_INTERVAL == 0 {
                let size = self.watcher.size();
                debug!(dependencies = size, "watcher diagnostics");
                if size > warn_threshold {
                    warn!(
                        dependencies = size,
                        threshold = warn_threshold,
                        "watcher dependency count above threshold"
                    );
                }
            }

            tokio::select! {
                result = watch_result_rx.recv_async() => {
                    self.watcher.stop();
                    return match result {
                        Ok(Ok(())) | Err(_) => {
                            Err(anyhow::anyhow!("template watcher stopped unexpectedly"))
                        }
                        Ok(Err(e)) => {
                            if !e.is::<Canceled>() {
                                error!(error = %format!("{e:#}"), "template watcher failed");
                            }
                            Err(e)
                        }
                    };
                }
                id = template_rx.recv_async() => {
                    if let Ok(id) = id {
                        let mut ids = vec![id];
                        while let Ok(more) = template_rx.try_recv() {
                            ids.push(more);
                        }
                        self.run_dynamic_tasks(&scope, ids);
                    }
                }
                name = created_rx.recv_async() => {
                    if let Ok(name) = name {
                        self.spawn_scheduled(&scope, &mut schedule_stops, &name);
                    }
                }
                name = deleted_rx.recv_async() => {
                    if let Ok(name) = name
                        && let Some(stop) = schedule_stops.remove(&name)
                    {
                        stop.cancel();
                    }
                }
                () = cancel.cancelled() => {
                    self.watcher.stop();
                    return Err(Canceled.into());
                }
            }
        }
    }

    /// Forwards watcher completions so templates keep rendering while a
    /// once-mode pass finishes its first full run.
    ///
    /// # Errors
    ///
    /// Returns [`Canceled`] or the watcher's error.
    pub async fn watch_dep(&self, cancel: &CancellationToken) -> Result<()> {
        loop {
            self.watcher.wait(cancel).await?;
            trace!("dependency change processed");
        }
    }

    /// Maps one tick's template IDs to dynamic tasks and runs them in
    /// the background; failures surface as a single aggregated log.
    fn run_dynamic_tasks(&self, cancel: &CancellationToken, ids: Vec<String>) {
        let drivers = self.tasks.drivers();
        let mut names = BTreeSet::new();
        for id in ids {
            match drivers.task_by_template(&id) {
                Some((name, driver)) => {
                    // Scheduled tasks run on their cadence only.
                    if !driver.task().is_scheduled() {
                        names.insert(name);
                    }
                }
                None => trace!(template = %id, "no task bound to template"),
            }
        }
        if names.is_empty() {
            return;
        }

        let tasks = Arc::clone(&self.tasks);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let results = futures_util::future::join_all(
                names
                    .iter()
                    .map(|name| tasks.task_run_now(&cancel, name)),
            )
            .await;

            let failures: Vec<String> = names
                .iter()
                .zip(results)
                .filter_map(|(name, result)| {
                    result.err().map(|e| format!("{name}: {e:#}"))
                })
                .collect();
            if !failures.is_empty() {
                error!(count = failures.len(), failures = ?failures, "dynamic task runs failed");
            }
        });
    }

    fn spawn_scheduled(
        &self,
        scope: &CancellationToken,
        stops: &mut HashMap<String, CancellationToken>,
        name: &str,
    ) {
        if stops.contains_key(name) {
            return;
        }
        let stop = CancellationToken::new();
        stops.insert(name.to_string(), stop.clone());

        let tasks = Arc::clone(&self.tasks);
        let scope = scope.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            if let Err(e) = tasks.run_scheduled_task(&scope, stop, &name).await {
                if e.is::<Canceled>() {
                    debug!(task = %name, "scheduled task loop canceled");
                } else {
                    error!(task = %name, error = %format!("{e:#}"), "scheduled task loop failed");
                }
            }
        });
    }
}
