// driftsync: Catalog-Driven Infrastructure Sync Controller
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Test doubles for the driver capability set.
//!
//! [`FakeDriver`] scripts render/apply outcomes and counts every
//! capability call. It lives in the library (not behind `cfg(test)`)
//! so the `tests/` integration suite can drive the tasks manager and
//! condition monitor without a real backend.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::{Driver, InspectPlan, PatchTask, RunOption, Task};
use crate::config::{ConditionConfig, GlobalConfig, TaskConfig};
use crate::error::{Canceled, Result};

/// Scripted outcome of one `render_template` call.
#[derive(Debug, Clone)]
pub enum RenderOutcome {
    /// All template dependencies resolved.
    Rendered,
    /// Dependencies still pending.
    Pending,
    /// Hard template error.
    Error(String),
}

/// Scripted outcome of one `apply_task` call.
#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    /// Apply succeeded.
    Success,
    /// Apply failed.
    Error(String),
}

#[derive(Default)]
struct Counters {
    init: AtomicUsize,
    render: AtomicUsize,
    apply: AtomicUsize,
    inspect: AtomicUsize,
    update: AtomicUsize,
    destroy: AtomicUsize,
    set_buffer: AtomicUsize,
    override_notifier: AtomicUsize,
}

/// Scriptable in-memory driver.
///
/// Unscripted calls fall back to "rendered" and "apply succeeds", so
/// the happy path needs no setup.
pub struct FakeDriver {
    task: Mutex<Task>,
    template_ids: Mutex<Vec<String>>,
    render_script: Mutex<VecDeque<RenderOutcome>>,
    apply_script: Mutex<VecDeque<ApplyOutcome>>,
    apply_delay: Mutex<Duration>,
    default_render: Mutex<RenderOutcome>,
    plan: Mutex<InspectPlan>,
    counters: Counters,
}

impl FakeDriver {
    #[must_use]
    pub fn new(task: Task) -> Self {
        let template_ids = task.template_ids();
        Self {
            task: Mutex::new(task),
            template_ids: Mutex::new(template_ids),
            render_script: Mutex::new(VecDeque::new()),
            apply_script: Mutex::new(VecDeque::new()),
            apply_delay: Mutex::new(Duration::ZERO),
            default_render: Mutex::new(RenderOutcome::Rendered),
            plan: Mutex::new(InspectPlan::default()),
            counters: Counters::default(),
        }
    }

    /// Queues an outcome for the next unconsumed `render_template` call.
    pub fn push_render(&self, outcome: RenderOutcome) {
        self.render_script.lock().unwrap().push_back(outcome);
    }

    /// Sets the fallback outcome once the render script is exhausted.
    pub fn set_default_render(&self, outcome: RenderOutcome) {
        *self.default_render.lock().unwrap() = outcome;
    }

    /// Queues an outcome for the next unconsumed `apply_task` call.
    pub fn push_apply(&self, outcome: ApplyOutcome) {
        self.apply_script.lock().unwrap().push_back(outcome);
    }

    /// Makes every apply take at least `delay` (cancellation-aware).
    pub fn set_apply_delay(&self, delay: Duration) {
        *self.apply_delay.lock().unwrap() = delay;
    }

    /// Overrides the plan returned by inspect.
    pub fn set_plan(&self, plan: InspectPlan) {
        *self.plan.lock().unwrap() = plan;
    }

    /// Overrides the bound template IDs.
    pub fn set_template_ids(&self, ids: Vec<String>) {
        *self.template_ids.lock().unwrap() = ids;
    }

    #[must_use]
    pub fn init_calls(&self) -> usize {
        self.counters.init.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn render_calls(&self) -> usize {
        self.counters.render.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn apply_calls(&self) -> usize {
        self.counters.apply.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn inspect_calls(&self) -> usize {
        self.counters.inspect.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn update_calls(&self) -> usize {
        self.counters.update.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn destroy_calls(&self) -> usize {
        self.counters.destroy.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn set_buffer_calls(&self) -> usize {
        self.counters.set_buffer.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn override_notifier_calls(&self) -> usize {
        self.counters.override_notifier.load(Ordering::SeqCst)
    }

    fn next_render(&self) -> RenderOutcome {
        self.render_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_render.lock().unwrap().clone())
    }

    fn next_apply(&self) -> ApplyOutcome {
        self.apply_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ApplyOutcome::Success)
    }
}

impl Driver for FakeDriver {
    fn task(&self) -> Task {
        self.task.lock().unwrap().clone()
    }

    fn template_ids(&self) -> Vec<String> {
        self.template_ids.lock().unwrap().clone()
    }

    fn init_task<'a>(&'a self, _cancel: &'a CancellationToken) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.counters.init.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn render_template<'a>(&'a self, _cancel: &'a CancellationToken) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            self.counters.render.fetch_add(1, Ordering::SeqCst);
            match self.next_render() {
                RenderOutcome::Rendered => Ok(true),
                RenderOutcome::Pending => Ok(false),
                RenderOutcome::Error(message) => Err(anyhow::anyhow!(message)),
            }
        })
    }

    fn apply_task<'a>(&'a self, cancel: &'a CancellationToken) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.counters.apply.fetch_add(1, Ordering::SeqCst);
            let delay = *self.apply_delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = cancel.cancelled() => return Err(Canceled.into()),
                }
            }
            match self.next_apply() {
                ApplyOutcome::Success => Ok(()),
                ApplyOutcome::Error(message) => Err(anyhow::anyhow!(message)),
            }
        })
    }

    fn inspect_task<'a>(
        &'a self,
        _cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<InspectPlan>> {
        Box::pin(async move {
            self.counters.inspect.fetch_add(1, Ordering::SeqCst);
            Ok(self.plan.lock().unwrap().clone())
        })
    }

    fn update_task<'a>(
        &'a self,
        _cancel: &'a CancellationToken,
        patch: PatchTask,
    ) -> BoxFuture<'a, Result<InspectPlan>> {
        Box::pin(async move {
            self.counters.update.fetch_add(1, Ordering::SeqCst);
            let mut task = self.task.lock().unwrap();
            let changed = patch.enabled.is_some_and(|e| e != task.enabled());
            if patch.run != RunOption::Inspect
                && let Some(enabled) = patch.enabled
            {
                task.set_enabled(enabled);
            }
            if patch.run == RunOption::Inspect {
                Ok(InspectPlan {
                    changes_present: changed,
                    plan: format!("would set enabled = {:?}", patch.enabled),
                    url: None,
                })
            } else {
                Ok(InspectPlan::default())
            }
        })
    }

    fn destroy_task<'a>(&'a self) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.counters.destroy.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn set_buffer_period(&self) {
        self.counters.set_buffer.fetch_add(1, Ordering::SeqCst);
    }

    fn override_notifier(&self) {
        self.counters.override_notifier.fetch_add(1, Ordering::SeqCst);
    }
}

/// Builds a finalized dynamic task watching one service.
#[must_use]
pub fn dynamic_task(name: &str) -> Task {
    let mut config = TaskConfig {
        name: name.to_string(),
        module: "test/module".to_string(),
        services: vec!["svc".to_string()],
        ..TaskConfig::default()
    };
    config.finalize(&GlobalConfig::default());
    Task::from_config(&config).expect("valid dynamic test task")
}

/// Builds a finalized scheduled task with the given cron expression.
#[must_use]
pub fn scheduled_task(name: &str, cron: &str) -> Task {
    let mut config = TaskConfig {
        name: name.to_string(),
        module: "test/module".to_string(),
        condition: Some(ConditionConfig::Schedule {
            cron: cron.to_string(),
        }),
        ..TaskConfig::default()
    };
    config.finalize(&GlobalConfig::default());
    Task::from_config(&config).expect("valid scheduled test task")
}
