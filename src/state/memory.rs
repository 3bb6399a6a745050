// driftsync: Catalog-Driven Infrastructure Sync Controller
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! In-memory [`Store`] implementation.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, RwLock};

use super::{Event, Store};
use crate::config::{Config, TaskConfig};

/// In-memory state store. Event logs are bounded rings, newest first.
pub struct InMemoryStore {
    config: Arc<Config>,
    retention: usize,
    tasks: RwLock<BTreeMap<String, TaskConfig>>,
    events: RwLock<BTreeMap<String, VecDeque<Event>>>,
}

impl InMemoryStore {
    /// Creates a store seeded with the controller configuration. The
    /// per-task event retention comes from `global.event_retention`.
    #[must_use]
    pub fn new(config: Arc<Config>) -> Self {
        let retention = config.global.event_retention;
        Self {
            config,
            retention,
            tasks: RwLock::new(BTreeMap::new()),
            events: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Store for InMemoryStore {
    fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    fn task(&self, name: &str) -> Option<TaskConfig> {
        self.tasks.read().expect("task map poisoned").get(name).cloned()
    }

    fn all_tasks(&self) -> Vec<TaskConfig> {
        self.tasks
            .read()
            .expect("task map poisoned")
            .values()
            .cloned()
            .collect()
    }

    fn set_task(&self, config: TaskConfig) {
        self.tasks
            .write()
            .expect("task map poisoned")
            .insert(config.name.clone(), config);
    }

    fn delete_task(&self, name: &str) {
        self.tasks.write().expect("task map poisoned").remove(name);
    }

    fn add_event(&self, event: Event) {
        let mut events = self.events.write().expect("event map poisoned");
        let ring = events.entry(event.task_name.clone()).or_default();
        ring.push_front(event);
        ring.truncate(self.retention);
    }

    fn events(&self, name: &str) -> Vec<Event> {
        self.events
            .read()
            .expect("event map poisoned")
            .get(name)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn all_events(&self) -> BTreeMap<String, Vec<Event>> {
        self.events
            .read()
            .expect("event map poisoned")
            .iter()
            .map(|(name, ring)| (name.clone(), ring.iter().cloned().collect()))
            .collect()
    }

    fn delete_events(&self, name: &str) {
        self.events.write().expect("event map poisoned").remove(name);
    }
}
