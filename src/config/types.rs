// driftsync: Catalog-Driven Infrastructure Sync Controller
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Configuration types for driftsync.
//!
//! # Config Structure
//!
//! ```text
//! Config: GlobalConfig, DriverSettings, [TaskConfig]
//! TaskConfig.condition: services (dynamic) | schedule (cron)
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::ConfigError;

/// Global controller options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Base directory under which each task gets its working directory.
    pub working_dir: PathBuf,
    /// How many events are retained per task (newest first).
    pub event_retention: usize,
    /// Warn when the watcher tracks more dependencies than this.
    pub dependency_warn_threshold: usize,
    /// Default buffer period applied to dynamic tasks that do not
    /// configure their own.
    pub buffer_period: BufferPeriodConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("sync-tasks"),
            event_retention: 5,
            dependency_warn_threshold: 1000,
            buffer_period: BufferPeriodConfig::default(),
        }
    }
}

/// Template-watcher coalescing window for dynamic tasks.
///
/// A flurry of upstream catalog changes collapses into one run:
/// `min` is the debounce, `max` the ceiling. Values are seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BufferPeriodConfig {
    /// Whether buffering is enabled at all.
    pub enabled: bool,
    /// Quiet time that must elapse after the last change (seconds).
    pub min: u64,
    /// Upper bound on how long a run can be deferred (seconds).
    pub max: u64,
}

impl Default for BufferPeriodConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min: 5,
            max: 20,
        }
    }
}

impl BufferPeriodConfig {
    /// Checks the `min <= max` invariant.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError::InvalidValue` when the window is inverted.
    pub fn validate(&self, section: &str) -> std::result::Result<(), ConfigError> {
        if self.enabled && self.min > self.max {
            return Err(ConfigError::InvalidValue {
                section: section.to_string(),
                key: "buffer_period".to_string(),
                message: format!("min ({}) must not exceed max ({})", self.min, self.max),
            });
        }
        Ok(())
    }
}

/// Settings for the built-in command driver backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverSettings {
    /// Shell command executed in the task working directory when a
    /// rendered change is applied. When unset, apply only materializes
    /// the rendered inputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply_command: Option<String>,
}

/// Trigger condition for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConditionConfig {
    /// Dynamic: re-run whenever the catalog entries of the listed
    /// services change.
    Services { names: Vec<String> },
    /// Scheduled: re-run on a cron cadence (7-field, second granularity).
    Schedule { cron: String },
}

impl ConditionConfig {
    /// Returns true for schedule conditions.
    #[must_use]
    pub const fn is_schedule(&self) -> bool {
        matches!(self, Self::Schedule { .. })
    }
}

/// One declarative task definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaskConfig {
    /// Unique task name.
    pub name: String,
    /// Optional human description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the task may run. Disabled tasks keep their driver and
    /// state but skip every trigger.
    pub enabled: bool,
    /// Module reference executed by the driver.
    pub module: String,
    /// Optional module version pin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Provider bindings handed to the driver.
    pub providers: Vec<String>,
    /// Services whose catalog entries feed the task template.
    pub services: Vec<String>,
    /// Free-form typed variables rendered into the module inputs.
    pub variables: BTreeMap<String, serde_json::Value>,
    /// Per-task working directory. Defaults to
    /// `<global.working_dir>/<name>` during finalization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    /// Buffer period override; dynamic tasks inherit the global default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_period: Option<BufferPeriodConfig>,
    /// Trigger condition. Defaults to a services condition over
    /// `services` during finalization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionConfig>,
    /// Extra inputs passed through to the module untouched.
    pub module_inputs: BTreeMap<String, serde_json::Value>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            enabled: true,
            module: String::new(),
            version: None,
            providers: Vec::new(),
            services: Vec::new(),
            variables: BTreeMap::new(),
            working_dir: None,
            buffer_period: None,
            condition: None,
            module_inputs: BTreeMap::new(),
        }
    }
}

impl TaskConfig {
    /// Fills in defaults from the global configuration.
    ///
    /// Idempotent: already-set fields are left alone. Scheduled tasks
    /// never inherit a buffer period; coalescing is meaningless for a
    /// cron cadence.
    pub fn finalize(&mut self, global: &GlobalConfig) {
        if self.condition.is_none() {
            self.condition = Some(ConditionConfig::Services {
                names: self.services.clone(),
            });
        }

        if self.working_dir.is_none() && !self.name.is_empty() {
            self.working_dir = Some(global.working_dir.join(&self.name));
        }

        let scheduled = self.condition.as_ref().is_some_and(ConditionConfig::is_schedule);
        if self.buffer_period.is_none() && !scheduled && global.buffer_period.enabled {
            self.buffer_period = Some(global.buffer_period);
        }
    }

    /// Validates the task definition.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant: empty name or module, an
    /// unparsable cron expression, a services condition without
    /// services, or an inverted buffer period.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::TaskError;

        if self.name.is_empty() {
            return Err(TaskError::Validation {
                name: "<unnamed>".to_string(),
                message: "task name must not be empty".to_string(),
            }
            .into());
        }
        if self.module.is_empty() {
            return Err(TaskError::Validation {
                name: self.name.clone(),
                message: "module must not be empty".to_string(),
            }
            .into());
        }

        match &self.condition {
            Some(ConditionConfig::Schedule { cron }) => {
                if let Err(e) = cron.parse::<cron::Schedule>() {
                    return Err(TaskError::Validation {
                        name: self.name.clone(),
                        message: format!("invalid cron expression '{cron}': {e}"),
                    }
                    .into());
                }
            }
            Some(ConditionConfig::Services { names }) => {
                if names.is_empty() {
                    return Err(TaskError::Validation {
                        name: self.name.clone(),
                        message: "services condition requires at least one service".to_string(),
                    }
                    .into());
                }
            }
            None => {
                return Err(TaskError::Validation {
                    name: self.name.clone(),
                    message: "task has no condition; declare services or a schedule".to_string(),
                }
                .into());
            }
        }

        if let Some(buffer) = &self.buffer_period {
            buffer.validate(&format!("tasks.{}", self.name))?;
        }

        Ok(())
    }

    /// Returns true once `finalize` has run and the task has a schedule
    /// condition.
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.condition.as_ref().is_some_and(ConditionConfig::is_schedule)
    }
}
