// driftsync: Catalog-Driven Infrastructure Sync Controller
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Driver construction and first render.
//!
//! ```text
//! DriverFactory::make(cancel, task config)
//!   finalize + validate --> Task
//!   build backend driver (CommandDriver by default)
//!   init_task
//!   render to fixed point:
//!     every 50 ms: render_template
//!     at 30 s:     override_notifier   (unstick conditions that
//!                                       never fire a first notification)
//!     at 60 s:     give up, DestroyTask, InitTimeout
//!   on success:    override_notifier   (no spurious re-trigger once
//!                                       the monitor starts)
//! ```
//!
//! Any error path destroys the partially-built driver before
//! propagating.

use std::sync::Arc;

use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{CommandDriver, Driver, Task};
use crate::config::{Config, TaskConfig};
use crate::error::{Canceled, DriverError, Result};

/// How often the first render is retried.
const RENDER_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Soft deadline after which the notifier is kicked once.
const NOTIFIER_NUDGE_AFTER: Duration = Duration::from_secs(30);

/// Hard deadline for the first full render.
const INIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Builds a backend driver for a finalized task.
pub type BuildDriver = dyn Fn(&Config, Task) -> Result<Arc<dyn Driver>> + Send + Sync;

/// Creates drivers for tasks and renders them to a fixed point.
#[derive(Clone)]
pub struct DriverFactory {
    config: Arc<Config>,
    build: Arc<BuildDriver>,
}

impl DriverFactory {
    /// Factory producing the built-in [`CommandDriver`] backend.
    #[must_use]
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            build: Arc::new(|config, task| {
                Ok(Arc::new(CommandDriver::new(&config.driver, task)) as Arc<dyn Driver>)
            }),
        }
    }

    /// Factory with a custom backend builder (used by tests).
    #[must_use]
    pub fn with_builder(config: Arc<Config>, build: Arc<BuildDriver>) -> Self {
        Self { config, build }
    }

    /// Builds a driver for `config` and renders its template until all
    /// dependencies have resolved once.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad task config,
    /// `DriverError::InitTimeout` if the first render does not complete
    /// within 60 s, [`Canceled`] on token cancellation, or the
    /// propagated render/init error. The driver is destroyed on every
    /// error path.
    pub async fn make(
        &self,
        cancel: &CancellationToken,
        config: &TaskConfig,
    ) -> Result<Arc<dyn Driver>> {
        let mut config = config.clone();
        config.finalize(&self.config.global);
        let task = Task::from_config(&config)?;
        let name = task.name().to_string();

        let driver = (self.build)(&self.config, task)?;

        if let Err(e) = driver.init_task(cancel).await {
            driver.destroy_task().await;
            return Err(e.context(format!("failed to initialize driver for task '{name}'")));
        }

        self.render_fixed_point(cancel, &name, driver.as_ref())
            .await?;
        Ok(driver)
    }

    async fn render_fixed_point(
        &self,
        cancel: &CancellationToken,
        name: &str,
        driver: &dyn Driver,
    ) -> Result<()> {
        let started = Instant::now();
        let mut nudged = false;

        loop {
            if cancel.is_cancelled() {
                driver.destroy_task().await;
                return Err(Canceled.into());
            }

            match driver.render_template(cancel).await {
                Ok(true) => {
                    // One more kick so the first monitor tick does not
                    // re-run the task off the notification that just
                    // completed the render.
                    driver.override_notifier();
                    debug!(task = name, elapsed_ms = %started.elapsed().as_millis(), "first render complete");
                    return Ok(());
                }
                Ok(false) => {}
                Err(e) => {
                    driver.destroy_task().await;
                    return Err(e.context(format!("failed to render template for task '{name}'")));
                }
            }

            if started.elapsed() >= INIT_TIMEOUT {
                driver.destroy_task().await;
                return Err(DriverError::InitTimeout {
                    name: name.to_string(),
                }
                .into());
            }

            if !nudged && started.elapsed() >= NOTIFIER_NUDGE_AFTER {
                warn!(task = name, "template still unrendered; kicking the notifier");
                driver.override_notifier();
                nudged = true;
            }

            tokio::select! {
                () = tokio::time::sleep(RENDER_POLL_INTERVAL) => {}
                () = cancel.cancelled() => {
                    driver.destroy_task().await;
                    return Err(Canceled.into());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests;
