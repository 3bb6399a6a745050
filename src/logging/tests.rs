// driftsync: Catalog-Driven Infrastructure Sync Controller
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use super::{LogConfig, LogLevel};

#[test]
fn test_log_level_conversion() {
    let conversions = vec![
        ("from_int(0)", LogLevel::from_int(0)),
        ("from_int(3)", LogLevel::from_int(3)),
        ("from_int(5)", LogLevel::from_int(5)),
        ("from_int(100)", LogLevel::from_int(100)),
    ];
    insta::assert_debug_snapshot!(conversions, @r#"
    [
        (
            "from_int(0)",
            LogLevel(
                0,
            ),
        ),
        (
            "from_int(3)",
            LogLevel(
                3,
            ),
        ),
        (
            "from_int(5)",
            LogLevel(
                5,
            ),
        ),
        (
            "from_int(100)",
            LogLevel(
                5,
            ),
        ),
    ]
    "#);
}

#[test]
fn test_log_level_bounds() {
    assert!(LogLevel::new(5).is_ok());
    assert!(LogLevel::new(6).is_err());
    assert_eq!(LogLevel::from_u8(6), None);
    assert_eq!(LogLevel::from_u8(2), Some(LogLevel::WARN));
}

#[test]
fn test_log_level_filter_strings() {
    assert_eq!(LogLevel::SILENT.to_filter_string(), "off");
    assert_eq!(LogLevel::INFO.to_filter_string(), "info");
    assert_eq!(LogLevel::TRACE.to_filter_string(), "trace");
}

#[test]
fn test_log_level_tracing_mapping() {
    assert_eq!(LogLevel::SILENT.to_tracing_level(), None);
    assert_eq!(LogLevel::WARN.to_tracing_level(), Some(tracing::Level::WARN));
    assert_eq!(LogLevel::DEBUG.to_tracing_level(), Some(tracing::Level::DEBUG));
}

#[test]
fn test_log_config_defaults() {
    let config = LogConfig::default();
    assert_eq!(config.console_level(), LogLevel::INFO);
    assert_eq!(config.file_level(), LogLevel::TRACE);
    assert!(config.log_file().is_none());
    assert!(!config.show_target());
}
