// driftsync: Catalog-Driven Infrastructure Sync Controller
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::DriverFactory;
use crate::config::{Config, ConditionConfig, TaskConfig};
use crate::driver::Driver;
use crate::driver::testing::{FakeDriver, RenderOutcome, dynamic_task};
use crate::error::{Canceled, DriverError};

fn task_config(name: &str) -> TaskConfig {
    TaskConfig {
        name: name.to_string(),
        module: "test/module".to_string(),
        services: vec!["svc".to_string()],
        ..TaskConfig::default()
    }
}

/// Factory whose builder hands back a pre-made fake, so tests can
/// observe capability calls on it.
fn factory_with(fake: &Arc<FakeDriver>) -> DriverFactory {
    let fake = Arc::clone(fake);
    DriverFactory::with_builder(
        Arc::new(Config::default()),
        Arc::new(move |_, _| Ok(Arc::clone(&fake) as Arc<dyn Driver>)),
    )
}

#[tokio::test]
async fn test_make_happy_path() {
    let fake = Arc::new(FakeDriver::new(dynamic_task("web")));
    let factory = factory_with(&fake);
    let cancel = CancellationToken::new();

    let driver = factory.make(&cancel, &task_config("web")).await.unwrap();
    assert_eq!(driver.task().name(), "web");

    assert_eq!(fake.init_calls(), 1);
    assert_eq!(fake.render_calls(), 1);
    // The post-render kick that suppresses a spurious first monitor run.
    assert_eq!(fake.override_notifier_calls(), 1);
    assert_eq!(fake.destroy_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_make_polls_until_rendered() {
    let fake = Arc::new(FakeDriver::new(dynamic_task("web")));
    fake.push_render(RenderOutcome::Pending);
    fake.push_render(RenderOutcome::Pending);
    let factory = factory_with(&fake);
    let cancel = CancellationToken::new();

    factory.make(&cancel, &task_config("web")).await.unwrap();
    assert_eq!(fake.render_calls(), 3);
}

#[tokio::test]
async fn test_make_destroys_driver_on_render_error() {
    let fake = Arc::new(FakeDriver::new(dynamic_task("web")));
    fake.push_render(RenderOutcome::Error("template exploded".to_string()));
    let factory = factory_with(&fake);
    let cancel = CancellationToken::new();

    let err = factory.make(&cancel, &task_config("web")).await.unwrap_err();
    assert!(err.to_string().contains("web"), "got: {err:#}");
    assert_eq!(fake.destroy_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_make_times_out_after_60s() {
    let fake = Arc::new(FakeDriver::new(dynamic_task("web")));
    fake.set_default_render(RenderOutcome::Pending);
    let factory = factory_with(&fake);
    let cancel = CancellationToken::new();

    let err = factory.make(&cancel, &task_config("web")).await.unwrap_err();
    match err.downcast_ref::<DriverError>() {
        Some(DriverError::InitTimeout { name }) => assert_eq!(name, "web"),
        other => panic!("expected InitTimeout, got {other:?}"),
    }
    assert_eq!(fake.destroy_calls(), 1);
    // The 30 s nudge fired exactly once before the deadline.
    assert_eq!(fake.override_notifier_calls(), 1);
}

#[tokio::test]
async fn test_make_destroys_driver_on_cancellation() {
    let fake = Arc::new(FakeDriver::new(dynamic_task("web")));
    fake.set_default_render(RenderOutcome::Pending);
    let factory = factory_with(&fake);

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = factory.make(&cancel, &task_config("web")).await.unwrap_err();
    assert!(err.is::<Canceled>());
    assert_eq!(fake.destroy_calls(), 1);
}

#[tokio::test]
async fn test_make_rejects_invalid_config() {
    let fake = Arc::new(FakeDriver::new(dynamic_task("web")));
    let factory = factory_with(&fake);
    let cancel = CancellationToken::new();

    let config = TaskConfig {
        condition: Some(ConditionConfig::Schedule {
            cron: "bogus".to_string(),
        }),
        ..task_config("nightly")
    };

    assert!(factory.make(&cancel, &config).await.is_err());
    assert_eq!(fake.init_calls(), 0);
}
