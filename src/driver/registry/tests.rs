// driftsync: Catalog-Driven Infrastructure Sync Controller
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::DriverRegistry;
use crate::driver::Driver;
use crate::driver::testing::{FakeDriver, dynamic_task};
use crate::error::{Canceled, TaskError};

fn fake(name: &str) -> Arc<FakeDriver> {
    Arc::new(FakeDriver::new(dynamic_task(name)))
}

#[test]
fn test_add_get_remove() {
    let registry = DriverRegistry::new();
    let driver = fake("web");

    registry.add("web", driver).unwrap();
    assert_eq!(registry.len(), 1);
    assert!(registry.contains("web"));
    assert_eq!(registry.get("web").unwrap().task().name(), "web");

    assert!(registry.remove("web").is_some());
    assert!(registry.is_empty());
    assert!(registry.get("web").is_none());
    assert!(registry.remove("web").is_none());
}

#[test]
fn test_add_duplicate_rejected() {
    let registry = DriverRegistry::new();
    registry.add("web", fake("web")).unwrap();

    let err = registry.add("web", fake("web")).unwrap_err();
    match err.downcast_ref::<TaskError>() {
        Some(TaskError::Exists(name)) => assert_eq!(name, "web"),
        other => panic!("expected Exists, got {other:?}"),
    }
}

#[test]
fn test_map_is_snapshot() {
    let registry = DriverRegistry::new();
    registry.add("a", fake("a")).unwrap();
    registry.add("b", fake("b")).unwrap();

    let snapshot = registry.map();
    registry.remove("a");

    assert_eq!(snapshot.len(), 2);
    assert_eq!(registry.len(), 1);
    // Deterministic iteration order.
    let names: Vec<_> = snapshot.keys().cloned().collect();
    assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn test_active_guard() {
    let registry = DriverRegistry::new();
    registry.add("web", fake("web")).unwrap();

    assert!(!registry.is_active("web"));
    let guard = registry.acquire_active("web").unwrap();
    assert!(registry.is_active("web"));

    // Second acquisition fails while the guard lives.
    assert!(registry.acquire_active("web").is_none());

    drop(guard);
    assert!(!registry.is_active("web"));
    assert!(registry.acquire_active("web").is_some());
}

#[test]
fn test_mark_for_deletion() {
    let registry = DriverRegistry::new();
    registry.add("web", fake("web")).unwrap();

    assert!(!registry.is_marked_for_deletion("web"));
    registry.mark_for_deletion("web");
    assert!(registry.is_marked_for_deletion("web"));

    // Removal clears the flag along with the entry.
    registry.remove("web");
    assert!(!registry.is_marked_for_deletion("web"));
}

#[test]
fn test_task_by_template() {
    let registry = DriverRegistry::new();
    let driver = fake("web");
    driver.set_template_ids(vec!["services.web".to_string()]);
    registry.add("web", driver).unwrap();

    let (name, _) = registry.task_by_template("services.web").unwrap();
    assert_eq!(name, "web");
    assert!(registry.task_by_template("services.db").is_none());
}

#[tokio::test]
async fn test_wait_inactive_returns_immediately_when_idle() {
    let registry = DriverRegistry::new();
    registry.add("web", fake("web")).unwrap();

    let cancel = CancellationToken::new();
    registry.wait_inactive(&cancel, "web").await.unwrap();
}

#[tokio::test]
async fn test_wait_inactive_blocks_until_guard_drops() {
    let registry = Arc::new(DriverRegistry::new());
    registry.add("web", fake("web")).unwrap();

    let guard = registry.acquire_active("web").unwrap();
    let cancel = CancellationToken::new();

    let waiter = {
        let registry = Arc::clone(&registry);
        let cancel = cancel.clone();
        tokio::spawn(async move { registry.wait_inactive(&cancel, "web").await })
    };

    // Give the waiter a chance to observe the active flag.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!waiter.is_finished());

    drop(guard);
    waiter.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_wait_inactive_honors_cancellation() {
    let registry = DriverRegistry::new();
    registry.add("web", fake("web")).unwrap();
    let _guard = registry.acquire_active("web").unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = registry.wait_inactive(&cancel, "web").await.unwrap_err();
    assert!(err.is::<Canceled>());
}
