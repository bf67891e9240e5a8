// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Incrementum swarm daemon (incrd)
//!
//! HTTP control plane that runs agent jobs against isolated workspace
//! checkouts of the repository in the current directory.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use fs2::FileExt;
use incr_server::{drain_jobs, Config, SwarmServer, DEFAULT_LISTEN};
use incr_vcs::JjClient;
use std::fs::File;
use std::future::IntoFuture;
use std::io::Write;
use std::path::Path;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle info flags before any config/lock acquisition
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("incrd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("incrd {}", env!("CARGO_PKG_VERSION"));
                println!("Incrementum swarm daemon - runs agent jobs against the repo in the current directory");
                println!();
                println!("USAGE:");
                println!("    incrd");
                println!();
                println!("The daemon is typically started by the `incr` CLI and should not");
                println!("be invoked directly. It serves HTTP on INCR_LISTEN (default {DEFAULT_LISTEN})");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: incrd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let repo_path = std::env::current_dir()?;
    let config = Config::load(&repo_path)?;
    std::fs::create_dir_all(&config.state_dir)?;

    rotate_log_if_needed(&config.log_path());
    let _log_guard = setup_logging(&config)?;

    // Exclusive pid lock: two servers must never share a state dir.
    let lock_file = match acquire_pid_lock(&config) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("incrd is already running ({e})");
            std::process::exit(1);
        }
    };

    info!(repo = %config.repo_path.display(), listen = %config.listen, "starting swarm server");
    if config.agent_command.is_empty() {
        warn!("INCR_AGENT_CMD is not set; /do requests will fail");
    }

    let server = SwarmServer::new(config.clone(), JjClient::new());
    let state = std::sync::Arc::clone(&server.state);
    let router = server.router();

    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    let addr = listener.local_addr()?;
    info!(%addr, "listening");

    // Signal ready for the parent process (CLI waiting for startup)
    println!("READY {addr}");

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let serve = axum::serve(listener, router);
    tokio::select! {
        result = serve.into_future() => {
            if let Err(e) = result {
                error!(error = %e, "server error");
            }
        }
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    // Interrupt live jobs, wait up to the drain deadline each, force-fail
    // the rest.
    let errors = drain_jobs(&state).await;
    for e in &errors {
        error!(error = %e, "shutdown");
    }

    drop(lock_file);
    let _ = std::fs::remove_file(config.pid_path());
    info!("swarm server stopped");

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; ").into())
    }
}

/// Take the exclusive lock on the pid file and record our pid.
fn acquire_pid_lock(config: &Config) -> std::io::Result<File> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(config.pid_path())?;
    file.try_lock_exclusive()?;
    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(file)
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep.
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the log file if it exceeds [`MAX_LOG_SIZE`].
///
/// Shifts `incrd.log` → `incrd.log.1` → `incrd.log.2` → `incrd.log.3`,
/// deleting the oldest. Best-effort: rotation failures are silently
/// ignored so the server still starts.
fn rotate_log_if_needed(log_path: &Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_path = config.log_path();
    let dir = log_path
        .parent()
        .ok_or_else(|| std::io::Error::other("log path has no parent"))?;
    std::fs::create_dir_all(dir)?;
    let file_name = log_path
        .file_name()
        .ok_or_else(|| std::io::Error::other("log path has no file name"))?;

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
