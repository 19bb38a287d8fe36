//! Hostwatch Monitor - Autonomous monitoring and delivery scheduler
//!
//! Provides:
//! - UP/DOWN connectivity tracking with outage-duration reporting
//! - Edge-triggered listening-port notifications
//! - An in-memory FIFO of notifications that could not be delivered,
//!   replayed in order once connectivity returns
//! - Filesystem ingestion with per-path de-duplication
//! - Hourly maintenance (categorization sweep + status broadcast)
//!
//! ## Modules
//!
//! - [`connectivity`] - Connectivity Monitor state machine driver
//! - [`port_watch`] - Per-port last-known-state tracking
//! - [`queue`] - Notification Queue and the send-or-queue gate
//! - [`watcher`] - `notify` wrapper producing [`watcher::ChangeEvent`]s
//! - [`ingestion`] - Routing of change events to delivery or categorization
//! - [`maintenance`] - Periodic sweep and status broadcast
//! - [`scheduler`] - Runs all loops for the process lifetime

pub mod connectivity;
pub mod ingestion;
pub mod maintenance;
pub mod port_watch;
pub mod queue;
pub mod scheduler;
pub mod watcher;

#[cfg(test)]
pub(crate) mod testing;

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by monitoring tasks
///
/// None of these reach a chat user. Handlers log them and carry on.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// An I/O error occurred during file operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// The messenger rejected a file attachment
    #[error("Delivery of {path} failed: {reason}")]
    DeliveryFailed { path: PathBuf, reason: String },

    /// The categorization sweep failed as a whole
    #[error("Categorization sweep failed: {0}")]
    CategorizeFailed(String),
}
