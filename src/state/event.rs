// driftsync: Catalog-Driven Infrastructure Sync Controller
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Structured record of one task run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::driver::Task;

/// One entry in a task's bounded event log.
///
/// Invariants: `start_time <= end_time` and `success` holds exactly
/// when `error` is absent; both are maintained by [`Event::end`] being
/// the only mutation site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Name of the task that ran.
    pub task_name: String,
    /// When the run started.
    pub start_time: DateTime<Utc>,
    /// When the run finished.
    pub end_time: DateTime<Utc>,
    /// Whether the run succeeded.
    pub success: bool,
    /// Error message of a failed run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Module the task executes.
    pub module: String,
    /// Provider bindings at the time of the run.
    pub providers: Vec<String>,
    /// Service dependencies at the time of the run.
    pub services: Vec<String>,
}

impl Event {
    /// Starts a new event record for a run of `task`.
    #[must_use]
    pub fn new(task: &Task) -> Self {
        let now = Utc::now();
        Self {
            task_name: task.name().to_string(),
            start_time: now,
            end_time: now,
            success: false,
            error: None,
            module: task.module().to_string(),
            providers: task.providers().to_vec(),
            services: task.services().to_vec(),
        }
    }

    /// Finishes the record. `None` marks the run successful.
    pub fn end(&mut self, error: Option<&anyhow::Error>) {
        self.end_time = Utc::now();
        self.success = error.is_none();
        self.error = error.map(|e| format!("{e:#}"));
    }
}
