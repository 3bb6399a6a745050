// driftsync: Catalog-Driven Infrastructure Sync Controller
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! The tasks manager: CRUD and run semantics.
//!
//! ```text
//! task_create         finalize -> validate -> factory.make
//!                     -> set_buffer_period -> register -> publish
//! task_create_and_run as above, with one un-retried apply in between
//! task_run_now        the single run path used by the monitor and
//!                     every scheduled loop
//! task_delete         mark-for-deletion, then quiesce + destroy in a
//!                     detached worker on a fresh cancellation token
//! ```

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::config::{Config, TaskConfig};
use crate::driver::registry::ActiveGuard;
use crate::driver::{Driver, DriverFactory, DriverRegistry, InspectPlan, PatchTask, RunOption};
use crate::error::{Canceled, DriverError, Result, TaskError};
use crate::retry::Retry;
use crate::state::{Event, Store};

/// Capacity of the schedule notification channels. Producers panic on
/// overflow; operators size this for the peak add/remove rate.
const SCHEDULE_CHANNEL_CAPACITY: usize = 10;

/// Owns drivers, state writes, and the schedule-notify channels.
///
/// The condition monitor holds a reference to the manager; the manager
/// only ever publishes to channels the monitor reads, so there is no
/// reference cycle.
pub struct TasksManager {
    config: Arc<Config>,
    state: Arc<dyn Store>,
    drivers: Arc<DriverRegistry>,
    factory: DriverFactory,
    retry: Retry,
    once: bool,
    created_schedule_tx: flume::Sender<String>,
    created_schedule_rx: flume::Receiver<String>,
    deleted_schedule_tx: flume::Sender<String>,
    deleted_schedule_rx: flume::Receiver<String>,
    run_notify: Mutex<Option<flume::Sender<String>>>,
    delete_notify: Mutex<Option<flume::Sender<String>>>,
}

impl TasksManager {
    /// Creates a manager wired to the built-in driver backend.
    #[must_use]
    pub fn new(config: Arc<Config>, state: Arc<dyn Store>) -> Self {
        let factory = DriverFactory::new(Arc::clone(&config));
        let (created_schedule_tx, created_schedule_rx) =
            flume::bounded(SCHEDULE_CHANNEL_CAPACITY);
        let (deleted_schedule_tx, deleted_schedule_rx) =
            flume::bounded(SCHEDULE_CHANNEL_CAPACITY);
        Self {
            config,
            state,
            drivers: Arc::new(DriverRegistry::new()),
            factory,
            retry: Retry::new(),
            once: false,
            created_schedule_tx,
            created_schedule_rx,
            deleted_schedule_tx,
            deleted_schedule_rx,
            run_notify: Mutex::new(None),
            delete_notify: Mutex::new(None),
        }
    }

    /// Replaces the driver factory (tests inject fakes here).
    #[must_use]
    pub fn with_factory(mut self, factory: DriverFactory) -> Self {
        self.factory = factory;
        self
    }

    /// Replaces the retry helper.
    #[must_use]
    pub fn with_retry(mut self, retry: Retry) -> Self {
        self.retry = retry;
        self
    }

    /// Once-mode: buffer periods are never set, so tasks run on the
    /// first fully-rendered template.
    #[must_use]
    pub const fn with_once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }

    /// The driver registry; shared with the condition monitor.
    #[must_use]
    pub const fn drivers(&self) -> &Arc<DriverRegistry> {
        &self.drivers
    }

    /// The controller configuration.
    #[must_use]
    pub const fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// The state store backing this manager.
    #[must_use]
    pub const fn state(&self) -> &Arc<dyn Store> {
        &self.state
    }

    /// Channel announcing newly created scheduled tasks.
    #[must_use]
    pub fn watch_created_schedule_tasks(&self) -> flume::Receiver<String> {
        self.created_schedule_rx.clone()
    }

    /// Channel announcing deleted scheduled tasks.
    #[must_use]
    pub fn watch_deleted_schedule_task(&self) -> flume::Receiver<String> {
        self.deleted_schedule_rx.clone()
    }

    /// Installs a channel that receives the task name after every run
    /// decision (ran, or skipped because disabled). Test mode only.
    #[must_use]
    pub fn enable_run_notify(&self) -> flume::Receiver<String> {
        let (tx, rx) = flume::unbounded();
        *self.run_notify.lock().expect("run notify poisoned") = Some(tx);
        rx
    }

    /// Installs a channel that receives the task name once a deletion
    /// has fully completed. Test mode only.
    #[must_use]
    pub fn enable_delete_notify(&self) -> flume::Receiver<String> {
        let (tx, rx) = flume::unbounded();
        *self.delete_notify.lock().expect("delete notify poisoned") = Some(tx);
        rx
    }

    fn notify_run(&self, name: &str) {
        if let Some(tx) = self.run_notify.lock().expect("run notify poisoned").as_ref() {
            let _ = tx.try_send(name.to_string());
        }
    }

    /// Returns the stored config for `name`.
    ///
    /// # Errors
    ///
    /// `TaskError::NotFound` when no such task exists.
    pub fn task(&self, name: &str) -> Result<TaskConfig> {
        self.state
            .task(name)
            .ok_or_else(|| TaskError::NotFound(name.to_string()).into())
    }

    /// All stored task configs, ordered by name.
    #[must_use]
    pub fn tasks(&self) -> Vec<TaskConfig> {
        self.state.all_tasks()
    }

    /// Creates a task: finalize, validate, build its driver, register.
    /// No run happens and no event is stored.
    ///
    /// # Errors
    ///
    /// `TaskError::Exists` for duplicate names, validation errors for a
    /// bad config, and any driver construction failure.
    pub async fn task_create(
        &self,
        cancel: &CancellationToken,
        config: TaskConfig,
    ) -> Result<TaskConfig> {
        let (config, driver) = self.build_task(cancel, config).await?;
        match self.register_task(config, &driver) {
            Ok(config) => {
                info!(task = %config.name, "task created");
                Ok(config)
            }
            Err(e) => {
                driver.destroy_task().await;
                Err(e)
            }
        }
    }

    /// Creates a task and applies it once before registering. The
    /// driver is discarded when that first apply fails; the run event
    /// is stored only after successful registration.
    ///
    /// # Errors
    ///
    /// As [`TasksManager::task_create`], plus the un-retried apply
    /// error.
    pub async fn task_create_and_run(
        &self,
        cancel: &CancellationToken,
        config: TaskConfig,
    ) -> Result<TaskConfig> {
        let (config, driver) = self.build_task(cancel, config).await?;

        let event = match self.run_new_task(cancel, driver.as_ref()).await {
            Ok(event) => event,
            Err(e) => {
                driver.destroy_task().await;
                return Err(e);
            }
        };

        match self.register_task(config, &driver) {
            Ok(config) => {
                if let Some(event) = event {
                    self.state.add_event(event);
                }
                info!(task = %config.name, "task created and applied");
                Ok(config)
            }
            Err(e) => {
                driver.destroy_task().await;
                Err(e)
            }
        }
    }

    /// Finalizes and validates a config, rejects duplicates, and builds
    /// the driver (rendered to its fixed point).
    async fn build_task(
        &self,
        cancel: &CancellationToken,
        mut config: TaskConfig,
    ) -> Result<(TaskConfig, Arc<dyn Driver>)> {
        config.finalize(&self.config.global);
        config.validate()?;

        if self.state.task(&config.name).is_some() || self.drivers.contains(&config.name) {
            return Err(TaskError::Exists(config.name).into());
        }

        let driver = self.factory.make(cancel, &config).await?;
        Ok((config, driver))
    }

    /// Registers a built driver: buffer period, registry, state,
    /// schedule announcement. Ordering is part of the contract: the
    /// registry write happens before any run can observe the task.
    fn register_task(&self, config: TaskConfig, driver: &Arc<dyn Driver>) -> Result<TaskConfig> {
        if !self.once {
            driver.set_buffer_period();
        }
        self.drivers.add(&config.name, Arc::clone(driver))?;
        self.state.set_task(config.clone());

        if config.is_scheduled()
            && let Err(e) = self.created_schedule_tx.try_send(config.name.clone())
        {
            // Contract: the channel is sized for the peak create rate.
            panic!("created-schedule channel overflow: {e}");
        }
        Ok(config)
    }

    /// First apply of a freshly built driver, before registration.
    /// Fail-fast: no retry, and the event is handed back to the caller
    /// instead of being stored.
    async fn run_new_task(
        &self,
        cancel: &CancellationToken,
        driver: &dyn Driver,
    ) -> Result<Option<Event>> {
        let task = driver.task();
        if !task.enabled() {
            debug!(task = %task.name(), "skipping apply of disabled new task");
            return Ok(None);
        }

        let mut event = Event::new(&task);
        match driver.apply_task(cancel).await {
            Ok(()) => {
                event.end(None);
                Ok(Some(event))
            }
            Err(e) if e.is::<Canceled>() => Err(e),
            Err(e) => Err(DriverError::Apply {
                name: task.name().to_string(),
                message: format!("{e:#}"),
            }
            .into()),
        }
    }

    /// Applies a partial update to a task.
    ///
    /// With [`RunOption::Inspect`] nothing is persisted and the plan is
    /// returned; otherwise the patched config reaches the state store
    /// before the driver sees the patch. With [`RunOption::Now`] the
    /// update is wrapped in an event.
    ///
    /// # Errors
    ///
    /// `TaskError::NotFound`, or `TaskError::Active` when a run is in
    /// progress (updates reject instead of queueing).
    pub async fn task_update(
        &self,
        cancel: &CancellationToken,
        name: &str,
        patch: PatchTask,
    ) -> Result<InspectPlan> {
        let driver = self
            .drivers
            .get(name)
            .ok_or_else(|| TaskError::NotFound(name.to_string()))?;

        let Some(_guard) = self.drivers.acquire_active(name) else {
            return Err(TaskError::Active(name.to_string()).into());
        };

        if patch.run != RunOption::Inspect {
            let mut stored = self
                .state
                .task(name)
                .ok_or_else(|| TaskError::NotFound(name.to_string()))?;
            if let Some(enabled) = patch.enabled {
                stored.enabled = enabled;
            }
            self.state.set_task(stored);
        }

        if patch.run == RunOption::Now {
            let mut event = Event::new(&driver.task());
            match driver.update_task(cancel, patch).await {
                Ok(plan) => {
                    event.end(None);
                    self.state.add_event(event);
                    Ok(plan)
                }
                Err(e) => {
                    event.end(Some(&e));
                    self.state.add_event(event);
                    Err(e)
                }
            }
        } else {
            driver.update_task(cancel, patch).await
        }
    }

    /// Requests deletion of a task. Idempotent and non-blocking: the
    /// name is marked immediately and a detached worker completes the
    /// deletion once the task is inactive.
    ///
    /// The worker runs on a fresh cancellation token so that the
    /// requester going away cannot abandon a half-deleted task.
    pub fn task_delete(&self, name: &str) -> Result<()> {
        if self.drivers.is_marked_for_deletion(name) {
            trace!(task = name, "delete already in progress");
            return Ok(());
        }
        self.drivers.mark_for_deletion(name);

        let drivers = Arc::clone(&self.drivers);
        let state = Arc::clone(&self.state);
        let deleted_schedule_tx = self.deleted_schedule_tx.clone();
        let delete_notify = self
            .delete_notify
            .lock()
            .expect("delete notify poisoned")
            .clone();
        let name = name.to_string();

        tokio::spawn(async move {
            delete_task(&drivers, &state, &deleted_schedule_tx, delete_notify, &name).await;
        });
        Ok(())
    }

    /// Builds a disposable driver for `config` and returns its plan.
    /// Nothing is registered and no state changes.
    ///
    /// # Errors
    ///
    /// Validation and driver construction errors, or the inspect error.
    pub async fn task_inspect(
        &self,
        cancel: &CancellationToken,
        mut config: TaskConfig,
    ) -> Result<InspectPlan> {
        config.finalize(&self.config.global);
        config.validate()?;

        let driver = self.factory.make(cancel, &config).await?;
        let plan = driver.inspect_task(cancel).await;
        driver.destroy_task().await;
        plan
    }

    /// The unified run entry point, used by the condition monitor on
    /// template changes and by every scheduled-task loop.
    ///
    /// # Errors
    ///
    /// `TaskError::NotFound`, `TaskError::Active` (scheduled tasks must
    /// not queue), render/apply driver errors, or [`Canceled`].
    pub async fn task_run_now(&self, cancel: &CancellationToken, name: &str) -> Result<()> {
        if self.drivers.is_marked_for_deletion(name) {
            trace!(task = name, "skipping run of task marked for deletion");
            return Ok(());
        }

        let driver = self
            .drivers
            .get(name)
            .ok_or_else(|| TaskError::NotFound(name.to_string()))?;
        let scheduled = driver.task().is_scheduled();

        let _guard = self.acquire_run_slot(cancel, name, scheduled).await?;

        // A delete may have arrived while we waited for the slot.
        if self.drivers.is_marked_for_deletion(name) {
            return Ok(());
        }

        let task = driver.task();
        if !task.enabled() {
            if scheduled {
                info!(task = name, "skipping disabled scheduled task");
            } else {
                trace!(task = name, "skipping disabled task");
            }
            self.notify_run(name);
            return Ok(());
        }

        let mut event = Event::new(&task);

        let rendered = match driver.render_template(cancel).await {
            Ok(rendered) => rendered,
            Err(e) => {
                let err: anyhow::Error = if e.is::<Canceled>() {
                    e
                } else {
                    DriverError::Render {
                        name: name.to_string(),
                        message: format!("{e:#}"),
                    }
                    .into()
                };
                event.end(Some(&err));
                self.state.add_event(event);
                return Err(err);
            }
        };

        if !rendered {
            if scheduled {
                // The cron fired but upstream data has not changed;
                // record the tick for introspection.
                debug!(task = name, "scheduled task triggered with nothing to apply");
                event.end(None);
                self.state.add_event(event);
            }
            return Ok(());
        }

        let result = self
            .retry
            .run(cancel, "apply", || driver.apply_task(cancel))
            .await;

        match result {
            Ok(()) => {
                event.end(None);
                self.state.add_event(event);
                self.notify_run(name);
                Ok(())
            }
            Err(e) => {
                let err: anyhow::Error = if e.is::<Canceled>() {
                    e
                } else {
                    DriverError::Apply {
                        name: name.to_string(),
                        message: format!("{e:#}"),
                    }
                    .into()
                };
                event.end(Some(&err));
                self.state.add_event(event);
                Err(err)
            }
        }
    }

    /// Scheduled tasks reject re-entry; dynamic tasks wait for the
    /// active flag to clear.
    async fn acquire_run_slot(
        &self,
        cancel: &CancellationToken,
        name: &str,
        scheduled: bool,
    ) -> Result<ActiveGuard<'_>> {
        loop {
            if let Some(guard) = self.drivers.acquire_active(name) {
                return Ok(guard);
            }
            if scheduled {
                return Err(TaskError::Active(name.to_string()).into());
            }
            self.drivers.wait_inactive(cancel, name).await?;
        }
    }

    /// Per-scheduled-task loop: sleep until the next cron firing, run,
    /// repeat. Run errors are logged and the cadence continues.
    ///
    /// # Errors
    ///
    /// `TaskError::NotFound` / `TaskError::NotScheduled` on a bad
    /// invocation, [`Canceled`] when the root token fires. Stopping via
    /// `stop` is a clean exit.
    pub async fn run_scheduled_task(
        &self,
        cancel: &CancellationToken,
        stop: CancellationToken,
        name: &str,
    ) -> Result<()> {
        let driver = self
            .drivers
            .get(name)
            .ok_or_else(|| TaskError::NotFound(name.to_string()))?;
        let schedule = driver.task().schedule()?;

        info!(task = name, "scheduled task loop started");
        loop {
            let now = Utc::now();
            let Some(next) = schedule.after(&now).next() else {
                return Err(TaskError::Validation {
                    name: name.to_string(),
                    message: "cron schedule has no upcoming firing".to_string(),
                }
                .into());
            };
            let wait = (next - now).to_std().unwrap_or_default();
            trace!(task = name, wait_ms = %wait.as_millis(), "waiting for next cron firing");

            tokio::select! {
                () = tokio::time::sleep(wait) => {
                    if !self.drivers.contains(name) {
                        info!(task = name, "task no longer registered; stopping schedule");
                        return Ok(());
                    }
                    if self.drivers.is_marked_for_deletion(name) {
                        info!(task = name, "task marked for deletion; stopping schedule");
                        return Ok(());
                    }
                    if let Err(e) = self.task_run_now(cancel, name).await {
                        if e.is::<Canceled>() {
                            return Err(e);
                        }
                        // The cron keeps firing regardless.
                        error!(task = name, error = %format!("{e:#}"), "scheduled run failed");
                    }
                }
                () = stop.cancelled() => {
                    debug!(task = name, "scheduled task loop stopped");
                    return Ok(());
                }
                () = cancel.cancelled() => return Err(Canceled.into()),
            }
        }
    }
}

/// Completes a requested deletion: quiesce, tear down the scheduled
/// loop, destroy the driver, clean state. Runs detached on a fresh
/// token; failures are logged, never surfaced.
async fn delete_task(
    drivers: &DriverRegistry,
    state: &Arc<dyn Store>,
    deleted_schedule_tx: &flume::Sender<String>,
    delete_notify: Option<flume::Sender<String>>,
    name: &str,
) {
    let cancel = CancellationToken::new();

    if let Err(e) = drivers.wait_inactive(&cancel, name).await {
        error!(task = name, error = %e, "deletion aborted while waiting for task to go inactive");
        return;
    }

    match drivers.get(name) {
        Some(driver) => {
            if driver.task().is_scheduled()
                && let Err(e) = deleted_schedule_tx.try_send(name.to_string())
            {
                // Contract: the channel is sized for the peak delete rate.
                panic!("deleted-schedule channel overflow: {e}");
            }
            if let Some(driver) = drivers.remove(name) {
                driver.destroy_task().await;
            }
        }
        None => {
            debug!(task = name, "task not in registry; clearing state only");
            drivers.remove(name);
        }
    }

    state.delete_task(name);
    state.delete_events(name);
    info!(task = name, "task deleted");

    if let Some(tx) = delete_notify {
        let _ = tx.try_send(name.to_string());
    }
}
