// driftsync: Catalog-Driven Infrastructure Sync Controller
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::PathBuf;

use super::{Config, ConditionConfig};
use crate::error::TaskError;

fn minimal_toml() -> &'static str {
    r#"
        [[tasks]]
        name = "web"
        module = "modules/lb-pool"
        services = ["web", "api"]
    "#
}

#[test]
fn test_config_defaults() {
    let config = Config::default();
    assert_eq!(config.global.working_dir, PathBuf::from("sync-tasks"));
    assert_eq!(config.global.event_retention, 5);
    assert_eq!(config.global.dependency_warn_threshold, 1000);
    assert!(config.global.buffer_period.enabled);
    assert!(config.global.buffer_period.min <= config.global.buffer_period.max);
    assert!(config.tasks.is_empty());
    assert!(config.driver.apply_command.is_none());
}

#[test]
fn test_from_str_finalizes_dynamic_task() {
    let config = Config::from_str(minimal_toml()).unwrap();
    let task = config.task("web").unwrap();

    assert!(task.enabled);
    assert_eq!(
        task.condition,
        Some(ConditionConfig::Services {
            names: vec!["web".to_string(), "api".to_string()],
        })
    );
    assert_eq!(task.working_dir, Some(PathBuf::from("sync-tasks/web")));
    // Dynamic tasks inherit the global buffer period.
    let buffer = task.buffer_period.unwrap();
    assert_eq!((buffer.min, buffer.max), (5, 20));
}

#[test]
fn test_scheduled_task_gets_no_buffer_period() {
    let config = Config::from_str(
        r#"
            [[tasks]]
            name = "nightly"
            module = "modules/report"
            [tasks.condition]
            type = "schedule"
            cron = "0 0 2 * * * *"
        "#,
    )
    .unwrap();

    let task = config.task("nightly").unwrap();
    assert!(task.is_scheduled());
    assert!(task.buffer_period.is_none());
}

#[test]
fn test_explicit_working_dir_is_kept() {
    let config = Config::from_str(
        r#"
            [[tasks]]
            name = "web"
            module = "m"
            services = ["web"]
            working_dir = "/var/lib/driftsync/web"
        "#,
    )
    .unwrap();

    assert_eq!(
        config.task("web").unwrap().working_dir,
        Some(PathBuf::from("/var/lib/driftsync/web"))
    );
}

#[test]
fn test_bad_cron_rejected() {
    let err = Config::from_str(
        r#"
            [[tasks]]
            name = "nightly"
            module = "m"
            [tasks.condition]
            type = "schedule"
            cron = "not a cron"
        "#,
    )
    .unwrap_err();

    match err.downcast_ref::<TaskError>() {
        Some(TaskError::Validation { name, message }) => {
            assert_eq!(name, "nightly");
            assert!(message.contains("cron"), "unexpected message: {message}");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn test_task_without_condition_or_services_rejected() {
    let err = Config::from_str(
        r#"
            [[tasks]]
            name = "orphan"
            module = "m"
        "#,
    )
    .unwrap_err();

    // Finalization derives a services condition from the (empty)
    // services list, which then fails validation.
    assert!(err.downcast_ref::<TaskError>().is_some(), "got: {err:#}");
}

#[test]
fn test_duplicate_task_names_rejected() {
    let err = Config::from_str(
        r#"
            [[tasks]]
            name = "web"
            module = "m"
            services = ["web"]

            [[tasks]]
            name = "web"
            module = "m"
            services = ["web"]
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("duplicate"), "got: {err:#}");
}

#[test]
fn test_inverted_buffer_period_rejected() {
    let err = Config::from_str(
        r#"
            [[tasks]]
            name = "web"
            module = "m"
            services = ["web"]
            buffer_period = { enabled = true, min = 30, max = 5 }
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("must not exceed"), "got: {err:#}");
}

#[test]
fn test_empty_module_rejected() {
    let err = Config::from_str(
        r#"
            [[tasks]]
            name = "web"
            services = ["web"]
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("module"), "got: {err:#}");
}

#[test]
fn test_unknown_keys_rejected() {
    assert!(Config::from_str("[global]\nbogus_key = 1\n").is_err());
}

#[test]
fn test_variables_roundtrip() {
    let config = Config::from_str(
        r#"
            [[tasks]]
            name = "web"
            module = "m"
            services = ["web"]
            [tasks.variables]
            pool_size = 4
            region = "us-east-1"
        "#,
    )
    .unwrap();

    let task = config.task("web").unwrap();
    assert_eq!(
        task.variables.get("pool_size"),
        Some(&serde_json::json!(4))
    );
    assert_eq!(
        task.variables.get("region"),
        Some(&serde_json::json!("us-east-1"))
    );
}
