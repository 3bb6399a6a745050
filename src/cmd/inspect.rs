// driftsync: Catalog-Driven Infrastructure Sync Controller
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Inspect mode: plan every task, apply nothing.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::error::Result;

use super::{build_manager, install_signal_handler};

/// Renders each configured task to its fixed point and prints the plan
/// a run would apply. No driver is registered and no state changes.
///
/// # Errors
///
/// Returns the first plan failure.
pub async fn run_inspect_command(config: &Config) -> Result<()> {
    let config = Arc::new(config.clone());
    let manager = Arc::new(build_manager(&config));

    let cancel = CancellationToken::new();
    install_signal_handler(&cancel);

    let mut changes = 0usize;
    for task in &config.tasks {
        let plan = manager
            .task_inspect(&cancel, task.clone())
            .await
            .with_context(|| format!("failed to inspect task '{}'", task.name))?;

        println!("==> {}", task.name);
        println!("{}", plan.plan);
        if let Some(url) = &plan.url {
            println!("    plan: {url}");
        }
        if plan.changes_present {
            changes += 1;
        }
    }

    info!(
        tasks = config.tasks.len(),
        with_changes = changes,
        "inspection complete"
    );
    Ok(())
}
