// driftsync: Catalog-Driven Infrastructure Sync Controller
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Upstream catalog watcher contract.
//!
//! ```text
//! Watcher::watch(cancel, out)
//!   pushes template IDs whenever upstream data changes;
//!   a single ID may be pushed multiple times, consumers
//!   must be idempotent. Returning is fatal to the monitor.
//!
//! Watcher::wait(cancel)
//!   blocks until any change has been processed; used by
//!   once-mode to keep templates rendering.
//! ```
//!
//! The shipped binary wires [`NullWatcher`]: no catalog is consulted
//! and only scheduled tasks fire. Catalog integrations implement this
//! trait and feed `CommandDriver::notify_template`.

pub mod testing;

#[cfg(test)]
mod tests;

use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::error::{Canceled, Result};

/// Capability set of the template-dependency watcher.
pub trait Watcher: Send + Sync {
    /// Streams changed template IDs into `out` until cancelled or a
    /// fatal error occurs.
    fn watch<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        out: flume::Sender<String>,
    ) -> BoxFuture<'a, Result<()>>;

    /// Blocks until any upstream change has been processed.
    fn wait<'a>(&'a self, cancel: &'a CancellationToken) -> BoxFuture<'a, Result<()>>;

    /// Number of dependencies currently tracked.
    fn size(&self) -> usize;

    /// Releases watcher resources; further notifications are dropped.
    fn stop(&self);
}

/// Watcher for deployments without a catalog: tracks nothing and never
/// notifies.
#[derive(Debug, Default)]
pub struct NullWatcher;

impl NullWatcher {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Watcher for NullWatcher {
    fn watch<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        _out: flume::Sender<String>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            cancel.cancelled().await;
            Err(Canceled.into())
        })
    }

    fn wait<'a>(&'a self, cancel: &'a CancellationToken) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            cancel.cancelled().await;
            Err(Canceled.into())
        })
    }

    fn size(&self) -> usize {
        0
    }

    fn stop(&self) {}
}
