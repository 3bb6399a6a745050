// driftsync: Catalog-Driven Infrastructure Sync Controller
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Registry of live drivers, keyed by task name.
//!
//! ```text
//! DriverRegistry
//!   drivers:  name -> Arc<dyn Driver>   (BTreeMap, deterministic order)
//!   active:   names with a run in progress
//!   deletion: names whose delete has been requested
//!
//! Per-task run serialization:
//!   scheduled caller: acquire_active() fails  -> Busy
//!   dynamic caller:   wait_inactive() (100 us poll) then retry
//! ```
//!
//! The `active` bit is not a mutex: dynamic callers wait for it to
//! clear while scheduled callers reject. Once a name is marked for
//! deletion every subsequent run on it is a no-op until the background
//! deletion removes the entry.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::Driver;
use crate::error::{Canceled, Result, TaskError};

/// Poll interval for [`DriverRegistry::wait_inactive`]. A busy-wait
/// tradeoff: the expected active window is short (seconds).
const INACTIVE_POLL_INTERVAL: Duration = Duration::from_micros(100);

/// Thread-safe map of task name to driver, with per-name run-state
/// flags. All operations are safe under concurrent callers; iteration
/// works on shallow snapshots.
#[derive(Default)]
pub struct DriverRegistry {
    drivers: Mutex<BTreeMap<String, Arc<dyn Driver>>>,
    active: Mutex<BTreeSet<String>>,
    deletion: Mutex<BTreeSet<String>>,
}

/// RAII guard marking a task active for the duration of a run.
pub struct ActiveGuard<'a> {
    registry: &'a DriverRegistry,
    name: String,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.registry.set_inactive(&self.name);
    }
}

impl DriverRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a driver under `name`.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::Exists` if the name is already registered;
    /// a name cannot be re-added without a prior delete.
    pub fn add(&self, name: &str, driver: Arc<dyn Driver>) -> Result<()> {
        let mut drivers = self.drivers.lock().expect("driver map poisoned");
        if drivers.contains_key(name) {
            return Err(TaskError::Exists(name.to_string()).into());
        }
        drivers.insert(name.to_string(), driver);
        Ok(())
    }

    /// Looks up a driver by task name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Driver>> {
        self.drivers
            .lock()
            .expect("driver map poisoned")
            .get(name)
            .cloned()
    }

    /// Returns whether a driver is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.drivers
            .lock()
            .expect("driver map poisoned")
            .contains_key(name)
    }

    /// Removes a driver and clears its run-state flags, returning the
    /// removed driver so the caller can destroy it.
    pub fn remove(&self, name: &str) -> Option<Arc<dyn Driver>> {
        let removed = self
            .drivers
            .lock()
            .expect("driver map poisoned")
            .remove(name);
        self.active.lock().expect("active set poisoned").remove(name);
        self.deletion
            .lock()
            .expect("deletion set poisoned")
            .remove(name);
        removed
    }

    /// Number of registered drivers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.drivers.lock().expect("driver map poisoned").len()
    }

    /// Returns whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shallow snapshot of the registry, stable for the caller.
    #[must_use]
    pub fn map(&self) -> BTreeMap<String, Arc<dyn Driver>> {
        self.drivers.lock().expect("driver map poisoned").clone()
    }

    /// Finds the driver bound to a template ID.
    #[must_use]
    pub fn task_by_template(&self, template_id: &str) -> Option<(String, Arc<dyn Driver>)> {
        let drivers = self.drivers.lock().expect("driver map poisoned");
        drivers
            .iter()
            .find(|(_, d)| d.template_ids().iter().any(|id| id == template_id))
            .map(|(name, d)| (name.clone(), Arc::clone(d)))
    }

    /// Atomically marks a task active, returning a guard that clears
    /// the flag on drop. Returns `None` when the task is already
    /// active.
    #[must_use]
    pub fn acquire_active(&self, name: &str) -> Option<ActiveGuard<'_>> {
        let mut active = self.active.lock().expect("active set poisoned");
        if active.insert(name.to_string()) {
            Some(ActiveGuard {
                registry: self,
                name: name.to_string(),
            })
        } else {
            None
        }
    }

    /// Whether a run is currently in progress for `name`.
    #[must_use]
    pub fn is_active(&self, name: &str) -> bool {
        self.active
            .lock()
            .expect("active set poisoned")
            .contains(name)
    }

    fn set_inactive(&self, name: &str) {
        self.active.lock().expect("active set poisoned").remove(name);
    }

    /// Marks a task for deletion; every subsequent run on it becomes a
    /// no-op.
    pub fn mark_for_deletion(&self, name: &str) {
        self.deletion
            .lock()
            .expect("deletion set poisoned")
            .insert(name.to_string());
    }

    /// Whether a delete has been requested for `name`.
    #[must_use]
    pub fn is_marked_for_deletion(&self, name: &str) -> bool {
        self.deletion
            .lock()
            .expect("deletion set poisoned")
            .contains(name)
    }

    /// Waits until `name` has no run in progress.
    ///
    /// Polls every 100 µs; the expected active window is short.
    ///
    /// # Errors
    ///
    /// Returns [`Canceled`] if the token fires first.
    pub async fn wait_inactive(&self, cancel: &CancellationToken, name: &str) -> Result<()> {
        while self.is_active(name) {
            tokio::select! {
                () = tokio::time::sleep(INACTIVE_POLL_INTERVAL) => {}
                () = cancel.cancelled() => return Err(Canceled.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
