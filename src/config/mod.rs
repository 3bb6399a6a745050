// driftsync: Catalog-Driven Infrastructure Sync Controller
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Configuration management for driftsync.
//!
//! # Configuration Hierarchy
//!
//! ```text
//! Priority (low → high)
//! 1. defaults
//! 2. --config FILE (repeatable)
//! 3. DSYNC_* env vars
//! 4. CLI --set overrides
//! ```
//!
//! # Task Definitions
//!
//! ```toml
//! [global]
//! working_dir = "sync-tasks"
//!
//! [[tasks]]
//! name = "web"
//! module = "modules/lb-pool"
//! services = ["web"]
//!
//! [[tasks]]
//! name = "nightly"
//! module = "modules/report"
//! [tasks.condition]
//! type = "schedule"
//! cron = "0 0 2 * * * *"
//! ```

pub mod loader;
pub mod types;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::error::{ConfigError, Result};

use loader::ConfigLoader;
pub use types::{BufferPeriodConfig, ConditionConfig, DriverSettings, GlobalConfig, TaskConfig};

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Global controller options.
    pub global: GlobalConfig,
    /// Built-in driver backend settings.
    pub driver: DriverSettings,
    /// Declarative task definitions.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<TaskConfig>,
}

impl Config {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use driftsync::config::Config;
    ///
    /// let config = Config::builder()
    ///     .add_toml_file("driftsync.toml")
    ///     .with_env_prefix("DSYNC")
    ///     .build()?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    #[must_use]
    pub fn builder() -> ConfigLoader {
        ConfigLoader::new()
    }

    /// Load configuration from a single TOML file (simple API).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, contains invalid
    /// TOML, or does not match the `Config` structure.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::builder().add_toml_file(path).build()
    }

    /// Load configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not valid TOML or does not
    /// match the `Config` structure.
    pub fn from_str(content: &str) -> Result<Self> {
        Self::builder().add_toml_str(content).build()
    }

    /// Finalizes task defaults and validates the whole configuration.
    ///
    /// Called by the loader after deserialization; safe to call again.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate task names, an invalid global
    /// buffer period, or any per-task validation failure.
    pub fn resolve_and_validate(&mut self) -> Result<()> {
        self.global.buffer_period.validate("global")?;

        let mut seen = BTreeSet::new();
        for task in &mut self.tasks {
            task.finalize(&self.global);
            task.validate()?;
            if !seen.insert(task.name.clone()) {
                return Err(ConfigError::InvalidValue {
                    section: "tasks".to_string(),
                    key: task.name.clone(),
                    message: "duplicate task name".to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Looks up a task definition by name.
    #[must_use]
    pub fn task(&self, name: &str) -> Option<&TaskConfig> {
        self.tasks.iter().find(|t| t.name == name)
    }
}
