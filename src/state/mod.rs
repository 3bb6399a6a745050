// driftsync: Catalog-Driven Infrastructure Sync Controller
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Controller state: task configs and per-task event logs.
//!
//! ```text
//! Store (capability set)
//!   task / all_tasks / set_task / delete_task
//!   add_event / events / all_events / delete_events
//!        |
//!        v
//! InMemoryStore
//!   RwLock<BTreeMap<name, TaskConfig>>
//!   RwLock<BTreeMap<name, ring of Event>>   (newest first, bounded)
//! ```
//!
//! State is in-memory by design: the controller reconstructs it from
//! configuration on restart. All operations are safe under concurrent
//! callers; readers observe per-task snapshots.

pub mod event;
pub mod memory;


use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{Config, TaskConfig};

pub use event::Event;
pub use memory::InMemoryStore;

/// Capability set of the controller state store.
pub trait Store: Send + Sync {
    /// The configuration the controller was started with.
    fn config(&self) -> Arc<Config>;

    /// Looks up a stored task config by name.
    fn task(&self, name: &str) -> Option<TaskConfig>;

    /// All stored task configs, ordered by name.
    fn all_tasks(&self) -> Vec<TaskConfig>;

    /// Creates or replaces a task config.
    fn set_task(&self, config: TaskConfig);

    /// Removes a task config. Missing names are a no-op.
    fn delete_task(&self, name: &str);

    /// Appends a run event to the task's bounded log.
    fn add_event(&self, event: Event);

    /// Events for one task, newest first.
    fn events(&self, name: &str) -> Vec<Event>;

    /// The full per-task event map, for administrative introspection.
    fn all_events(&self) -> BTreeMap<String, Vec<Event>>;

    /// Drops all events for a task.
    fn delete_events(&self, name: &str);
}
