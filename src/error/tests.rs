// driftsync: Catalog-Driven Infrastructure Sync Controller
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use super::{Canceled, ConfigError, DriverError, SyncError, SyncResult, TaskError};

#[test]
fn test_config_error_display() {
    let err = ConfigError::MissingKey {
        section: "global".to_string(),
        key: "working_dir".to_string(),
    };
    insta::assert_snapshot!(
        err.to_string(),
        @"missing required config key 'working_dir' in section '[global]'"
    );
}

#[test]
fn test_task_error_display() {
    insta::assert_snapshot!(
        TaskError::Active("web".to_string()).to_string(),
        @"task 'web' is active and cannot accept another operation"
    );
    insta::assert_snapshot!(
        TaskError::NotFound("web".to_string()).to_string(),
        @"task 'web' not found"
    );
}

#[test]
fn test_driver_error_display() {
    let err = DriverError::InitTimeout {
        name: "web".to_string(),
    };
    insta::assert_snapshot!(
        err.to_string(),
        @"driver for task 'web' timed out rendering its template"
    );
}

#[test]
fn test_sync_error_size() {
    // SyncError should be reasonably small
    // Box<str> variants (Other) are 16 bytes (fat pointer: ptr + len)
    // With discriminant + alignment = 24 bytes
    let size = std::mem::size_of::<SyncError>();
    assert!(size <= 24, "SyncError is {size} bytes, expected <= 24");
}

#[test]
fn test_sync_result_size() {
    let size = std::mem::size_of::<SyncResult<()>>();
    assert!(size <= 24, "SyncResult<()> is {size} bytes, expected <= 24");
}

#[test]
fn test_canceled_detection_through_anyhow() {
    let err: anyhow::Error = Canceled.into();
    assert!(err.is::<Canceled>());

    let wrapped = err.context("run aborted");
    assert!(wrapped.root_cause().is::<Canceled>());
}

#[test]
fn test_task_error_downcast_through_anyhow() {
    let err: anyhow::Error = TaskError::Exists("cache".to_string()).into();
    match err.downcast_ref::<TaskError>() {
        Some(TaskError::Exists(name)) => assert_eq!(name, "cache"),
        other => panic!("unexpected downcast result: {other:?}"),
    }
}
