// driftsync: Catalog-Driven Infrastructure Sync Controller
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Error handling module.
//!
//! ```text
//!             SyncError (~24 bytes)
//!                   |
//!        +----------+----------+--------+
//!        |          |          |        |
//!        v          v          v        v
//!      Config      Task      Driver   Io/Other
//!       Box        Box        Box     Box<str>
//!
//! Sub-errors (unboxed internally):
//!   Config  MissingKey, InvalidValue
//!   Task    NotFound, Exists, Active, Validation, NotScheduled
//!   Driver  InitTimeout, Render, Apply
//!
//! Canceled is a standalone marker: every suspension point that
//! observes its cancellation token returns it, and callers detect
//! it with err.is::<Canceled>().
//! ```

use thiserror::Error;

/// Convenience alias for `anyhow::Result`.
pub type Result<T> = anyhow::Result<T>;

/// Result type using [`SyncError`].
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Top-level application error type.
///
/// All sub-errors are boxed to keep this enum at ~24 bytes on the stack.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] Box<ConfigError>),

    /// Task lifecycle error.
    #[error("task error: {0}")]
    Task(#[from] Box<TaskError>),

    /// Driver error.
    #[error("driver error: {0}")]
    Driver(#[from] Box<DriverError>),

    /// I/O error.
    #[error("io error: {0}")]
    Io(Box<std::io::Error>),

    /// Generic error with message.
    #[error("{0}")]
    Other(Box<str>),
}

// --- From implementations for boxing ---

/// Macro to generate `From` implementations that box the source error.
macro_rules! impl_from_boxed {
    ($($error:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$error> for SyncError {
                fn from(err: $error) -> Self {
                    SyncError::$variant(Box::new(err))
                }
            }
        )+
    };
}

impl_from_boxed! {
    ConfigError => Config,
    TaskError => Task,
    DriverError => Driver,
    std::io::Error => Io,
}

/// Marker error propagated from a cancellation token.
///
/// Never stored on an event unless an apply was in flight when the
/// token fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation canceled")]
pub struct Canceled;

// --- Config Errors ---

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing required configuration key.
    #[error("missing required config key '{key}' in section '[{section}]'")]
    MissingKey { section: String, key: String },

    /// Invalid configuration value.
    #[error("invalid value for '{key}' in section '[{section}]': {message}")]
    InvalidValue {
        section: String,
        key: String,
        message: String,
    },
}

// --- Task Errors ---

/// Task lifecycle errors surfaced by the tasks manager.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Task was not found in the state store or driver registry.
    #[error("task '{0}' not found")]
    NotFound(String),

    /// A task with this name is already registered.
    #[error("task '{0}' already exists")]
    Exists(String),

    /// The task is active and cannot accept the requested operation.
    ///
    /// Scheduled runs and updates reject instead of queueing.
    #[error("task '{0}' is active and cannot accept another operation")]
    Active(String),

    /// Malformed task configuration (missing fields, bad cron, ...).
    #[error("invalid configuration for task '{name}': {message}")]
    Validation { name: String, message: String },

    /// A scheduled-task operation was invoked on a task without a
    /// schedule condition.
    #[error("task '{0}' does not have a schedule condition")]
    NotScheduled(String),
}

// --- Driver Errors ---

/// Errors reported by a task's driver.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The driver failed to render its template within the init deadline.
    #[error("driver for task '{name}' timed out rendering its template")]
    InitTimeout { name: String },

    /// The template engine reported a hard error.
    #[error("failed to render template for task '{name}': {message}")]
    Render { name: String, message: String },

    /// The driver reported an apply failure after retries were exhausted.
    #[error("failed to apply task '{name}': {message}")]
    Apply { name: String, message: String },
}

#[cfg(test)]
mod tests;
