// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server configuration: directory layout and bind address.
//!
//! Full config-file loading lives in the CLI front-end; the server itself
//! resolves XDG-style defaults with environment overrides.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Application directory name under the XDG base dirs.
pub const APP_DIR: &str = "incrementum";

/// Default HTTP bind address.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:7420";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Repository this server orchestrates.
    pub repo_path: PathBuf,
    /// State dir: state.json, lock, pid, log.
    pub state_dir: PathBuf,
    /// Per-repo workspace checkouts.
    pub workspaces_dir: PathBuf,
    /// Per-job event logs.
    pub events_dir: PathBuf,
    /// HTTP bind address.
    pub listen: SocketAddr,
    /// Agent subprocess argv (whitespace-split from the environment).
    pub agent_command: Vec<String>,
}

impl Config {
    /// Resolve configuration for a repo from the environment.
    ///
    /// `INCR_STATE_DIR`, `INCR_WORKSPACES_DIR`, `INCR_LISTEN`, and
    /// `INCR_AGENT_CMD` override the defaults.
    pub fn load(repo_path: &Path) -> Result<Self, ConfigError> {
        let state_dir = match std::env::var_os("INCR_STATE_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::state_dir()
                .or_else(dirs::data_local_dir)
                .ok_or(ConfigError::NoStateDir)?
                .join(APP_DIR),
        };
        let workspaces_dir = match std::env::var_os("INCR_WORKSPACES_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .ok_or(ConfigError::NoStateDir)?
                .join(APP_DIR)
                .join("workspaces"),
        };
        let listen = match std::env::var("INCR_LISTEN") {
            Ok(addr) => addr
                .parse()
                .map_err(|_| ConfigError::BadListenAddr(addr))?,
            Err(_) => DEFAULT_LISTEN
                .parse()
                .map_err(|_| ConfigError::BadListenAddr(DEFAULT_LISTEN.to_string()))?,
        };
        let agent_command = std::env::var("INCR_AGENT_CMD")
            .map(|cmd| cmd.split_whitespace().map(String::from).collect())
            .unwrap_or_default();

        Ok(Self {
            repo_path: repo_path.to_path_buf(),
            events_dir: state_dir.join("events"),
            state_dir,
            workspaces_dir,
            listen,
            agent_command,
        })
    }

    pub fn log_path(&self) -> PathBuf {
        self.state_dir.join("incrd.log")
    }

    pub fn pid_path(&self) -> PathBuf {
        self.state_dir.join("incrd.pid")
    }
}

/// Errors from configuration resolution.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no state directory available for this user")]
    NoStateDir,
    #[error("invalid listen address: {0}")]
    BadListenAddr(String),
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
