// driftsync: Catalog-Driven Infrastructure Sync Controller
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Built-in module-execution backend.
//!
//! ```text
//! CommandDriver
//!   render_template: materialize task inputs
//!                    --> <working_dir>/module-inputs.json
//!   apply_task:      run [driver] apply_command via `sh -c`
//!                    in the working directory (optional)
//!   inspect_task:    diff-derived plan, nothing written
//!
//! TemplateNotifier
//!   seen template IDs + override flag --> resolved?
//!   buffer period --> coalesce notification bursts
//! ```
//!
//! Catalog integrations feed [`CommandDriver::notify_template`]; the
//! shipped `NullWatcher` never does, so dynamic tasks complete their
//! first render through the factory's notifier nudge.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use futures_util::future::BoxFuture;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{BufferPeriod, Driver, InspectPlan, PatchTask, RunOption, Task};
use crate::config::DriverSettings;
use crate::error::{Canceled, Result};

/// File the rendered module inputs are written to.
const RENDERED_FILE: &str = "module-inputs.json";

/// Tracks which template dependencies have resolved and coalesces
/// notification bursts into one run.
struct TemplateNotifier {
    ids: Vec<String>,
    seen: Mutex<BTreeSet<String>>,
    overridden: AtomicBool,
    buffer: Mutex<Option<BufferPeriod>>,
    first_pending: Mutex<Option<Instant>>,
    last_notify: Mutex<Option<Instant>>,
}

impl TemplateNotifier {
    fn new(ids: Vec<String>) -> Self {
        Self {
            ids,
            seen: Mutex::new(BTreeSet::new()),
            overridden: AtomicBool::new(false),
            buffer: Mutex::new(None),
            first_pending: Mutex::new(None),
            last_notify: Mutex::new(None),
        }
    }

    fn notify(&self, id: &str) {
        self.seen.lock().unwrap().insert(id.to_string());
        let now = Instant::now();
        *self.last_notify.lock().unwrap() = Some(now);
        self.first_pending.lock().unwrap().get_or_insert(now);
    }

    /// Every dependency has been seen at least once, or the notifier
    /// was overridden.
    fn resolved(&self) -> bool {
        if self.overridden.load(Ordering::SeqCst) {
            return true;
        }
        let seen = self.seen.lock().unwrap();
        self.ids.iter().all(|id| seen.contains(id))
    }

    /// The buffer window (if any) has settled since the last burst.
    fn settled(&self) -> bool {
        let Some(buffer) = *self.buffer.lock().unwrap() else {
            return true;
        };
        let (Some(first), Some(last)) = (
            *self.first_pending.lock().unwrap(),
            *self.last_notify.lock().unwrap(),
        ) else {
            return true;
        };
        last.elapsed() >= buffer.min || first.elapsed() >= buffer.max
    }

    fn clear_pending(&self) {
        *self.first_pending.lock().unwrap() = None;
        *self.last_notify.lock().unwrap() = None;
    }

    fn override_once(&self) {
        self.overridden.store(true, Ordering::SeqCst);
        self.clear_pending();
    }

    fn set_buffer(&self, buffer: Option<BufferPeriod>) {
        *self.buffer.lock().unwrap() = buffer;
    }
}

/// Driver that renders task inputs to the working directory and applies
/// them with a configurable shell command.
pub struct CommandDriver {
    task: Mutex<Task>,
    apply_command: Option<String>,
    notifier: TemplateNotifier,
    last_rendered: Mutex<Option<String>>,
}

impl CommandDriver {
    #[must_use]
    pub fn new(settings: &DriverSettings, task: Task) -> Self {
        let notifier = TemplateNotifier::new(task.template_ids());
        Self {
            task: Mutex::new(task),
            apply_command: settings.apply_command.clone(),
            notifier,
            last_rendered: Mutex::new(None),
        }
    }

    /// Marks one template dependency as changed. Catalog integrations
    /// call this for every upstream update they observe.
    pub fn notify_template(&self, id: &str) {
        self.notifier.notify(id);
    }

    fn rendered_path(&self) -> PathBuf {
        self.task.lock().unwrap().working_dir().join(RENDERED_FILE)
    }

    /// Deterministic serialization of everything the module consumes.
    fn render_content(&self) -> Result<String> {
        let task = self.task.lock().unwrap();
        let content = serde_json::json!({
            "task": task.name(),
            "module": task.module(),
            "version": task.version(),
            "providers": task.providers(),
            "services": task.services(),
            "variables": task.variables(),
            "module_inputs": task.module_inputs(),
        });
        serde_json::to_string_pretty(&content).context("failed to serialize module inputs")
    }
}

impl Driver for CommandDriver {
    fn task(&self) -> Task {
        self.task.lock().unwrap().clone()
    }

    fn template_ids(&self) -> Vec<String> {
        self.notifier.ids.clone()
    }

    fn init_task<'a>(&'a self, _cancel: &'a CancellationToken) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let dir = self.task.lock().unwrap().working_dir().to_path_buf();
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("failed to create working directory {}", dir.display()))?;
            Ok(())
        })
    }

    fn render_template<'a>(&'a self, _cancel: &'a CancellationToken) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            if !self.notifier.resolved() {
                trace!(task = %self.task.lock().unwrap().name(), "template dependencies unresolved");
                return Ok(false);
            }
            if !self.notifier.settled() {
                trace!(task = %self.task.lock().unwrap().name(), "buffer period still open");
                return Ok(false);
            }

            let content = self.render_content()?;
            {
                let last = self.last_rendered.lock().unwrap();
                if last.as_deref() == Some(content.as_str()) {
                    self.notifier.clear_pending();
                    return Ok(true);
                }
            }

            let path = self.rendered_path();
            tokio::fs::write(&path, &content)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            *self.last_rendered.lock().unwrap() = Some(content);
            self.notifier.clear_pending();
            debug!(path = %path.display(), "rendered module inputs");
            Ok(true)
        })
    }

    fn apply_task<'a>(&'a self, cancel: &'a CancellationToken) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let Some(command) = &self.apply_command else {
                debug!(task = %self.task.lock().unwrap().name(), "no apply command configured");
                return Ok(());
            };

            let dir = self.task.lock().unwrap().working_dir().to_path_buf();
            let mut child = tokio::process::Command::new("sh")
                .arg("-c")
                .arg(command)
                .current_dir(&dir)
                .spawn()
                .with_context(|| format!("failed to spawn apply command '{command}'"))?;

            let status = tokio::select! {
                status = child.wait() => status.context("apply command aborted")?,
                () = cancel.cancelled() => {
                    let _ = child.kill().await;
                    return Err(Canceled.into());
                }
            };

            if !status.success() {
                anyhow::bail!("apply command '{command}' exited with {status}");
            }
            Ok(())
        })
    }

    fn inspect_task<'a>(
        &'a self,
        _cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<InspectPlan>> {
        Box::pin(async move {
            let content = self.render_content()?;
            let changes_present = self.last_rendered.lock().unwrap().as_deref()
                != Some(content.as_str());
            let task = self.task.lock().unwrap();
            let plan = if changes_present {
                format!(
                    "task '{}': would write {} ({} bytes) and run module '{}'",
                    task.name(),
                    task.working_dir().join(RENDERED_FILE).display(),
                    content.len(),
                    task.module(),
                )
            } else {
                format!("task '{}': no changes", task.name())
            };
            Ok(InspectPlan {
                changes_present,
                plan,
                url: None,
            })
        })
    }

    fn update_task<'a>(
        &'a self,
        _cancel: &'a CancellationToken,
        patch: PatchTask,
    ) -> BoxFuture<'a, Result<InspectPlan>> {
        Box::pin(async move {
            let mut task = self.task.lock().unwrap();
            let changed = patch.enabled.is_some_and(|e| e != task.enabled());
            if patch.run == RunOption::Inspect {
                return Ok(InspectPlan {
                    changes_present: changed,
                    plan: format!(
                        "task '{}': would set enabled = {:?}",
                        task.name(),
                        patch.enabled
                    ),
                    url: None,
                });
            }
            if let Some(enabled) = patch.enabled {
                task.set_enabled(enabled);
            }
            Ok(InspectPlan::default())
        })
    }

    fn destroy_task<'a>(&'a self) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let path = self.rendered_path();
            if let Err(e) = tokio::fs::remove_file(&path).await
                && e.kind() != std::io::ErrorKind::NotFound
            {
                debug!(path = %path.display(), error = %e, "could not remove rendered inputs");
            }
        })
    }

    fn set_buffer_period(&self) {
        let buffer = self.task.lock().unwrap().buffer_period();
        self.notifier.set_buffer(buffer);
    }

    fn override_notifier(&self) {
        self.notifier.override_once();
    }
}
