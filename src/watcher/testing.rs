// driftsync: Catalog-Driven Infrastructure Sync Controller
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Scriptable watcher for tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::future::BoxFuture;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::Watcher;
use crate::error::{Canceled, Result};

/// In-process watcher: tests inject template notifications and fatal
/// errors by hand.
pub struct TestWatcher {
    tx: flume::Sender<Result<String>>,
    rx: flume::Receiver<Result<String>>,
    size: AtomicUsize,
    processed: Notify,
}

impl Default for TestWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWatcher {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = flume::unbounded();
        Self {
            tx,
            rx,
            size: AtomicUsize::new(0),
            processed: Notify::new(),
        }
    }

    /// Injects an upstream change for `template_id`.
    pub fn notify(&self, template_id: &str) {
        let _ = self.tx.send(Ok(template_id.to_string()));
    }

    /// Injects a fatal watcher error; `watch` returns it.
    pub fn fail(&self, message: &str) {
        let _ = self.tx.send(Err(anyhow::anyhow!(message.to_string())));
    }

    /// Sets the reported dependency count.
    pub fn set_size(&self, size: usize) {
        self.size.store(size, Ordering::SeqCst);
    }
}

impl Watcher for TestWatcher {
    fn watch<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        out: flume::Sender<String>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            loop {
                tokio::select! {
                    msg = self.rx.recv_async() => {
                        match msg {
                            Ok(Ok(id)) => {
                                if out.send_async(id).await.is_err() {
                                    return Ok(());
                                }
                                self.processed.notify_waiters();
                            }
                            Ok(Err(e)) => return Err(e),
                            Err(_) => return Ok(()),
                        }
                    }
                    () = cancel.cancelled() => return Err(Canceled.into()),
                }
            }
        })
    }

    fn wait<'a>(&'a self, cancel: &'a CancellationToken) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            tokio::select! {
                () = self.processed.notified() => Ok(()),
                () = cancel.cancelled() => Err(Canceled.into()),
            }
        })
    }

    fn size(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    fn stop(&self) {}
}
