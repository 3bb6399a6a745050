// driftsync: Catalog-Driven Infrastructure Sync Controller
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! CLI module for driftsync using clap derive.
//!
//! # Command Structure
//!
//! ```text
//! driftsync [global options] [command]
//! (none) | daemon   watch conditions and apply tasks until stopped
//! once              render and apply every task exactly once
//! inspect           plan every task, apply nothing
//! options           print the resolved configuration
//! version
//! ```

pub mod global;


use crate::cli::global::GlobalOptions;
use clap::{Parser, Subcommand};

/// Catalog-Driven Infrastructure Sync Controller
///
/// A long-running controller that turns declarative tasks into executed
/// infrastructure-change runs.
#[derive(Debug, Parser)]
#[command(
    name = "driftsync",
    author,
    version,
    about = "Catalog-driven infrastructure sync controller",
    long_about = "driftsync Copyright (C) 2026 Romeo Ahmed\n\
                  This program comes with ABSOLUTELY NO WARRANTY\n\
                  This is free software, and you are welcome to redistribute it\n\
                  under certain conditions; see LICENSE for details.\n\n\
                  driftsync watches an upstream service catalog and applies\n\
                  declarative tasks whenever their dependencies change or\n\
                  their cron schedule fires. Without a command it runs as a\n\
                  daemon; `driftsync once` applies every task a single time\n\
                  and exits, `driftsync inspect` only plans.",
    after_help = "CONFIG FILES:\n\n\
                  By default, driftsync looks for `driftsync.toml` in the\n\
                  current directory. Additional files can be passed with\n\
                  --config and are merged over it in order. Environment\n\
                  variables prefixed with DSYNC_ and --set overrides win\n\
                  over every file."
)]
pub struct Cli {
    /// Global options shared by all commands
    #[command(flatten)]
    pub global: GlobalOptions,

    /// Command to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shows the version.
    #[command(visible_alias = "-v")]
    Version,

    /// Lists all options and their resolved values.
    Options,

    /// Runs the controller until stopped (the default).
    Daemon,

    /// Renders and applies every task exactly once, then exits.
    Once,

    /// Plans every task without applying anything.
    Inspect,
}

/// Parses command-line arguments.
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}

/// Parses command-line arguments from an iterator.
pub fn parse_from<I, T>(iter: I) -> Cli
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::parse_from(iter)
}

/// Tries to parse command-line arguments, returning an error on failure.
///
/// # Errors
///
/// Returns a `clap::Error` if the arguments are invalid or if
/// help/version information was requested.
pub fn try_parse() -> Result<Cli, clap::Error> {
    Cli::try_parse()
}
