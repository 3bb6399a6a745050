// driftsync: Catalog-Driven Infrastructure Sync Controller
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Entry point.
//!
//! ```text
//! cli::parse() --> Logging --> Command Dispatch
//!   Daemon (default) | Once | Inspect | Options | Version
//! ```

use std::process::ExitCode;

use driftsync::cli::global::GlobalOptions;
use driftsync::cli::{self, Command};
use driftsync::cmd::{
    run_daemon_command, run_inspect_command, run_once_command, run_options_command,
};
use driftsync::config::Config;
use driftsync::logging::init_logging;
use driftsync::logging::{LogConfig, LogLevel};

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::parse();

    let log_config = build_log_config(&cli.global);
    let _log_guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    dispatch_command(&cli).await
}

fn build_log_config(global: &GlobalOptions) -> LogConfig {
    let console_level = global
        .log_level
        .and_then(LogLevel::from_u8)
        .unwrap_or(LogLevel::INFO);

    let file_level = global
        .file_log_level
        .and_then(LogLevel::from_u8)
        .unwrap_or(console_level);

    LogConfig::builder()
        .with_console_level(console_level)
        .with_file_level(file_level)
        .maybe_with_log_file(global.log_file.as_ref().map(|p| p.display().to_string()))
        .build()
}

async fn dispatch_command(cli: &cli::Cli) -> ExitCode {
    let result = match &cli.command {
        Some(Command::Version) => {
            handle_version_command();
            Ok(())
        }
        Some(Command::Options) => load_config(&cli.global).map(|config| {
            run_options_command(&config);
        }),
        Some(Command::Once) => match load_config(&cli.global) {
            Ok(config) => run_once_command(&config).await,
            Err(e) => Err(e),
        },
        Some(Command::Inspect) => match load_config(&cli.global) {
            Ok(config) => run_inspect_command(&config).await,
            Err(e) => Err(e),
        },
        Some(Command::Daemon) | None => match load_config(&cli.global) {
            Ok(config) => run_daemon_command(&config).await,
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn handle_version_command() {
    println!("{}", env!("CARGO_PKG_VERSION"));
}

fn load_config(global: &GlobalOptions) -> driftsync::error::Result<Config> {
    let mut loader = Config::builder().add_toml_file_optional("driftsync.toml");
    for path in &global.configs {
        loader = loader.add_toml_file(path);
    }
    loader = loader.with_env_prefix("DSYNC");
    for option in &global.options {
        let Some((key, value)) = option.split_once('=') else {
            return Err(anyhow::anyhow!(
                "invalid --set option '{option}': expected KEY=VALUE"
            ));
        };
        loader = loader.set(&key.replace('/', "."), value)?;
    }
    loader.build().map_err(|e| {
        eprintln!("Failed to load config: {e}");
        e
    })
}
