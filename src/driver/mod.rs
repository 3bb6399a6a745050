// driftsync: Catalog-Driven Infrastructure Sync Controller
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Per-task execution engines.
//!
//! # Architecture
//!
//! ```text
//! DriverFactory::make(task config)
//!      |
//!      v
//!   Driver (1:1 with Task)
//!      |  render_template --> fixed point
//!      |  apply_task      --> execute the module
//!      |  inspect_task    --> dry-run plan
//!      v
//!   DriverRegistry: name -> Arc<dyn Driver>
//!      + active flag       (a run is in progress)
//!      + marked-for-deletion (no further runs accepted)
//! ```
//!
//! # Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Driver`] | Capability set the controller core depends on |
//! | [`Task`] | Finalized domain value behind each driver |
//! | [`DriverRegistry`] | Thread-safe name→driver map with run-state flags |
//! | [`DriverFactory`] | Builds a driver and renders it to a fixed point |
//! | [`CommandDriver`] | Built-in backend: materialize inputs, run a command |
//! | [`InspectPlan`] | Result of a dry-run: changes present + plan text |
//!
//! # The Driver Pattern
//!
//! All async capabilities return [`BoxFuture`] so the registry can hold
//! `Arc<dyn Driver>` trait objects. Methods take `&self`; drivers use
//! interior mutability for the small amount of state that changes after
//! construction (the `enabled` toggle, render bookkeeping).

pub mod command;
pub mod factory;
pub mod registry;
pub mod task;
pub mod testing;


use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::Result;

pub use command::CommandDriver;
pub use factory::DriverFactory;
pub use registry::DriverRegistry;
pub use task::{BufferPeriod, Condition, Task};

/// Result of inspecting a task without applying it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectPlan {
    /// Whether applying would change anything.
    pub changes_present: bool,
    /// Human-readable plan text.
    pub plan: String,
    /// Optional link to a remotely stored plan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// How an update should be carried out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOption {
    /// Apply the patch without triggering a run.
    #[default]
    #[serde(rename = "")]
    Unspecified,
    /// Produce a plan only; nothing is persisted.
    Inspect,
    /// Apply the patch and run the task immediately.
    Now,
}

/// A partial task update.
///
/// Only `enabled` is honored today; the struct exists so future fields
/// arrive without an API break.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PatchTask {
    /// New enabled state, when present.
    pub enabled: Option<bool>,
    /// How to carry out the update.
    #[serde(default)]
    pub run: RunOption,
}

/// Capability set of a per-task execution engine.
///
/// One driver exists per task. A driver owns its backend working
/// directory, provider bindings, bound template IDs, and its template
/// notifier.
///
/// `render_template` is idempotent; returning `Ok(true)` means every
/// template dependency has resolved at least once.
pub trait Driver: Send + Sync {
    /// Snapshot of the task behind this driver.
    fn task(&self) -> Task;

    /// Template IDs bound to this driver, used by the monitor to route
    /// watcher notifications back to the task.
    fn template_ids(&self) -> Vec<String>;

    /// One-time backend initialization (working directory, provider
    /// bindings).
    fn init_task<'a>(&'a self, cancel: &'a CancellationToken) -> BoxFuture<'a, Result<()>>;

    /// Attempts to render the task template. Returns `Ok(false)` while
    /// dependencies are still unresolved.
    fn render_template<'a>(&'a self, cancel: &'a CancellationToken) -> BoxFuture<'a, Result<bool>>;

    /// Applies the rendered change.
    fn apply_task<'a>(&'a self, cancel: &'a CancellationToken) -> BoxFuture<'a, Result<()>>;

    /// Produces a plan without applying.
    fn inspect_task<'a>(
        &'a self,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<InspectPlan>>;

    /// Applies a partial update to the task and returns the resulting
    /// plan. With [`RunOption::Inspect`] nothing is persisted.
    fn update_task<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        patch: PatchTask,
    ) -> BoxFuture<'a, Result<InspectPlan>>;

    /// Tears the driver down. Infallible; cleanup problems are logged.
    fn destroy_task<'a>(&'a self) -> BoxFuture<'a, ()>;

    /// Activates template-watcher coalescing using the task's buffer
    /// period. Never called in once-mode.
    fn set_buffer_period(&self);

    /// Kicks the template notifier so rendering can complete even when
    /// a condition never fires its first notification.
    fn override_notifier(&self);
}

impl std::fmt::Debug for dyn Driver + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver").field("task", &self.task()).finish()
    }
}
