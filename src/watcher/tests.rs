// driftsync: Catalog-Driven Infrastructure Sync Controller
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::testing::TestWatcher;
use super::{NullWatcher, Watcher};
use crate::error::Canceled;

#[tokio::test]
async fn test_test_watcher_forwards_template_ids() {
    let watcher = Arc::new(TestWatcher::new());
    let (out_tx, out_rx) = flume::bounded(16);
    let cancel = CancellationToken::new();

    let handle = {
        let watcher = Arc::clone(&watcher);
        let cancel = cancel.clone();
        tokio::spawn(async move { watcher.watch(&cancel, out_tx).await })
    };

    watcher.notify("services.web");
    watcher.notify("services.web");

    assert_eq!(out_rx.recv_async().await.unwrap(), "services.web");
    assert_eq!(out_rx.recv_async().await.unwrap(), "services.web");

    cancel.cancel();
    let err = handle.await.unwrap().unwrap_err();
    assert!(err.is::<Canceled>());
}

#[tokio::test]
async fn test_test_watcher_surfaces_fatal_error() {
    let watcher = Arc::new(TestWatcher::new());
    let (out_tx, _out_rx) = flume::bounded(16);
    let cancel = CancellationToken::new();

    watcher.fail("catalog connection lost");

    let err = watcher.watch(&cancel, out_tx).await.unwrap_err();
    assert_eq!(err.to_string(), "catalog connection lost");
}

#[tokio::test]
async fn test_test_watcher_wait_completes_after_processing() {
    let watcher = Arc::new(TestWatcher::new());
    let (out_tx, out_rx) = flume::bounded(16);
    let cancel = CancellationToken::new();

    let watch_handle = {
        let watcher = Arc::clone(&watcher);
        let cancel = cancel.clone();
        tokio::spawn(async move { watcher.watch(&cancel, out_tx).await })
    };
    let wait_handle = {
        let watcher = Arc::clone(&watcher);
        let cancel = cancel.clone();
        tokio::spawn(async move { watcher.wait(&cancel).await })
    };

    // Give the waiter a chance to register.
    tokio::time::sleep(Duration::from_millis(10)).await;
    watcher.notify("services.web");
    assert_eq!(out_rx.recv_async().await.unwrap(), "services.web");

    wait_handle.await.unwrap().unwrap();
    cancel.cancel();
    let _ = watch_handle.await.unwrap();
}

#[tokio::test]
async fn test_null_watcher_tracks_nothing() {
    let watcher = NullWatcher::new();
    assert_eq!(watcher.size(), 0);

    let cancel = CancellationToken::new();
    cancel.cancel();

    let (out_tx, out_rx) = flume::bounded(1);
    let err = watcher.watch(&cancel, out_tx).await.unwrap_err();
    assert!(err.is::<Canceled>());
    assert!(out_rx.is_empty());
}
