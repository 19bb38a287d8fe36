//! Hostwatch System - host adapters for the monitoring ports
//!
//! Implements the collaborator traits from `hostwatch_core::ports` against
//! the local Linux host:
//!
//! - [`ping::PingProbe`] - [`IReachabilityProbe`](hostwatch_core::ports::IReachabilityProbe) via `ping`
//! - [`netstat::ProcNetScanner`] - [`IPortScanner`](hostwatch_core::ports::IPortScanner) via `/proc/net/tcp{,6}`
//! - [`host_info::HostReporter`] - [`IHostReporter`](hostwatch_core::ports::IHostReporter) via `sysinfo`
//! - [`speedtest::SpeedtestCli`] - [`ISpeedProbe`](hostwatch_core::ports::ISpeedProbe) via the Ookla CLI
//! - [`organizer::FileOrganizer`] - [`IFileCategorizer`](hostwatch_core::ports::IFileCategorizer) by extension

pub mod host_info;
pub mod netstat;
pub mod organizer;
pub mod ping;
pub mod speedtest;

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the host adapters
#[derive(Debug, Error)]
pub enum SystemError {
    /// A procfs read or filesystem operation failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An external command could not be run or exited unsuccessfully
    #[error("command `{command}` failed: {reason}")]
    Command { command: String, reason: String },

    /// Output could not be parsed
    #[error("unexpected output: {0}")]
    Parse(String),

    /// A blocking task was cancelled or panicked
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
