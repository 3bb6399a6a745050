// driftsync: Catalog-Driven Infrastructure Sync Controller
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Finalized task domain value.
//!
//! [`Task`] is what a driver executes: the declarative `TaskConfig`
//! after defaults are applied and validation has passed. Unlike the
//! config type it is not serde-facing and its invariants always hold.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{BufferPeriodConfig, ConditionConfig, TaskConfig};
use crate::error::{Result, TaskError};

/// Debounce window for coalescing rapid upstream changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPeriod {
    /// Quiet time that must elapse after the last change.
    pub min: Duration,
    /// Upper bound on how long a run can be deferred.
    pub max: Duration,
}

impl BufferPeriod {
    /// Converts the config representation; `None` when buffering is
    /// disabled.
    #[must_use]
    pub fn from_config(config: &BufferPeriodConfig) -> Option<Self> {
        config.enabled.then(|| Self {
            min: Duration::from_secs(config.min),
            max: Duration::from_secs(config.max),
        })
    }
}

/// Trigger condition of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Re-run whenever the catalog entries of these services change.
    Services { names: Vec<String> },
    /// Re-run on a cron cadence.
    Schedule { cron: String },
}

impl Condition {
    /// Returns true for schedule conditions.
    #[must_use]
    pub const fn is_schedule(&self) -> bool {
        matches!(self, Self::Schedule { .. })
    }
}

impl From<&ConditionConfig> for Condition {
    fn from(config: &ConditionConfig) -> Self {
        match config {
            ConditionConfig::Services { names } => Self::Services {
                names: names.clone(),
            },
            ConditionConfig::Schedule { cron } => Self::Schedule { cron: cron.clone() },
        }
    }
}

/// A finalized, validated task.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    name: String,
    enabled: bool,
    module: String,
    version: Option<String>,
    providers: Vec<String>,
    services: Vec<String>,
    variables: BTreeMap<String, serde_json::Value>,
    working_dir: PathBuf,
    buffer_period: Option<BufferPeriod>,
    condition: Condition,
    module_inputs: BTreeMap<String, serde_json::Value>,
}

impl Task {
    /// Builds a task from a finalized config, validating it first.
    ///
    /// # Errors
    ///
    /// Returns the config's validation error, or a validation error if
    /// finalization has not run (no condition / no working directory).
    pub fn from_config(config: &TaskConfig) -> Result<Self> {
        config.validate()?;

        let condition = config
            .condition
            .as_ref()
            .map(Condition::from)
            .ok_or_else(|| TaskError::Validation {
                name: config.name.clone(),
                message: "task has no condition; declare services or a schedule".to_string(),
            })?;

        let working_dir = config.working_dir.clone().ok_or_else(|| TaskError::Validation {
            name: config.name.clone(),
            message: "task has no working directory; finalize the config first".to_string(),
        })?;

        Ok(Self {
            name: config.name.clone(),
            enabled: config.enabled,
            module: config.module.clone(),
            version: config.version.clone(),
            providers: config.providers.clone(),
            services: config.services.clone(),
            variables: config.variables.clone(),
            working_dir,
            buffer_period: config
                .buffer_period
                .as_ref()
                .and_then(BufferPeriod::from_config),
            condition,
            module_inputs: config.module_inputs.clone(),
        })
    }

    /// The unique task name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the task may run.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// Toggles the enabled state.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// The module reference executed on apply.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Optional module version pin.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Provider bindings.
    #[must_use]
    pub fn providers(&self) -> &[String] {
        &self.providers
    }

    /// Services feeding the task template.
    #[must_use]
    pub fn services(&self) -> &[String] {
        &self.services
    }

    /// Typed variables rendered into the module inputs.
    #[must_use]
    pub const fn variables(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.variables
    }

    /// Per-task working directory.
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Buffer period, when buffering applies to this task.
    #[must_use]
    pub const fn buffer_period(&self) -> Option<BufferPeriod> {
        self.buffer_period
    }

    /// The trigger condition.
    #[must_use]
    pub const fn condition(&self) -> &Condition {
        &self.condition
    }

    /// Extra module inputs passed through untouched.
    #[must_use]
    pub const fn module_inputs(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.module_inputs
    }

    /// Returns true for schedule-condition tasks.
    #[must_use]
    pub const fn is_scheduled(&self) -> bool {
        self.condition.is_schedule()
    }

    /// Parses the task's cron schedule.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::NotScheduled` for dynamic tasks and
    /// `TaskError::Validation` if the expression does not parse (which
    /// creation should have rejected).
    pub fn schedule(&self) -> Result<cron::Schedule> {
        match &self.condition {
            Condition::Schedule { cron } => {
                cron.parse::<cron::Schedule>().map_err(|e| {
                    TaskError::Validation {
                        name: self.name.clone(),
                        message: format!("invalid cron expression '{cron}': {e}"),
                    }
                    .into()
                })
            }
            Condition::Services { .. } => Err(TaskError::NotScheduled(self.name.clone()).into()),
        }
    }

    /// Template IDs bound to this task, one per service dependency.
    #[must_use]
    pub fn template_ids(&self) -> Vec<String> {
        self.services
            .iter()
            .map(|s| format!("services.{s}"))
            .collect()
    }
}
