//! Ingestion Watcher - routes filesystem changes to delivery or categorization
//!
//! Two directories are watched:
//!
//! - the **deliver folder**: a file dropped here is sent to the administrator
//!   as a document after a short grace period and then deleted. A failed
//!   upload leaves the file in place.
//! - the **inbox**: any new or rewritten file triggers a full categorization
//!   sweep of the inbox. The sweep is idempotent, so one per event is fine.
//!
//! ## De-duplication
//!
//! Editors and copy tools emit several events for one logical write. The
//! [`ProcessingSet`] admits at most one in-flight handling task per path:
//!
//! ```text
//! ┌──────┐  event, path free  ┌───────────┐  task done (ok, error, panic)
//! │ idle │ ─────────────────▶ │ in-flight │ ─────────────────────────────┐
//! └──────┘                    └───────────┘                              │
//!    ▲          event, path in flight: dropped                          │
//!    └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The marker is an RAII [`InFlightGuard`] moved into the task, so it is
//! released on every exit path. Concurrency across paths is bounded by a
//! semaphore whose permit is taken before the task is spawned.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hostwatch_core::domain::ChatId;
use hostwatch_core::ports::{IFileCategorizer, IMessenger};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::watcher::ChangeEvent;
use crate::MonitorError;

/// Caption attached to documents sent from the deliver folder
pub const DELIVERY_CAPTION: &str = "Sent automatically from the outbox folder.";

const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);
const DEFAULT_MAX_CONCURRENT_TASKS: usize = 4;

// ============================================================================
// ProcessingSet
// ============================================================================

/// Paths that currently have a handling task
#[derive(Debug, Clone, Default)]
pub struct ProcessingSet {
    inner: Arc<DashMap<PathBuf, ()>>,
}

impl ProcessingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `path` in flight, or returns `None` if it already is
    pub fn try_acquire(&self, path: &Path) -> Option<InFlightGuard> {
        match self.inner.entry(path.to_path_buf()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(InFlightGuard {
                    set: Arc::clone(&self.inner),
                    path: path.to_path_buf(),
                })
            }
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.inner.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Releases its path from the [`ProcessingSet`] when dropped
#[derive(Debug)]
pub struct InFlightGuard {
    set: Arc<DashMap<PathBuf, ()>>,
    path: PathBuf,
}

impl InFlightGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.remove(&self.path);
    }
}

// ============================================================================
// Routing
// ============================================================================

/// What to do with a changed file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Send as attachment, then delete
    Deliver,
    /// Run a categorization sweep of the inbox
    Categorize,
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

// ============================================================================
// IngestionWatcher
// ============================================================================

struct Handler {
    messenger: Arc<dyn IMessenger>,
    categorizer: Arc<dyn IFileCategorizer>,
    admin: ChatId,
    grace_period: Duration,
}

impl Handler {
    async fn handle(&self, route: Route, path: PathBuf) {
        match route {
            Route::Deliver => {
                if let Err(e) = self.deliver_and_remove(&path).await {
                    error!(path = %path.display(), error = %e, "Delivery failed, file retained");
                }
            }
            Route::Categorize => match self.categorizer.categorize_inbox().await {
                Ok(moved) => info!(moved, trigger = %path.display(), "Inbox categorized"),
                Err(e) => {
                    let err = MonitorError::CategorizeFailed(e.to_string());
                    warn!(trigger = %path.display(), error = %err, "Inbox categorization failed");
                }
            },
        }
    }

    async fn deliver_and_remove(&self, path: &Path) -> Result<(), MonitorError> {
        // let the writer finish
        tokio::time::sleep(self.grace_period).await;

        self.messenger
            .send_document(self.admin, path, DELIVERY_CAPTION)
            .await
            .map_err(|e| MonitorError::DeliveryFailed {
                path: path.to_path_buf(),
                reason: format!("{e:#}"),
            })?;

        tokio::fs::remove_file(path).await?;
        info!(path = %path.display(), "File delivered and removed");
        Ok(())
    }
}

/// Turns change events into at most one handling task per path
pub struct IngestionWatcher {
    inbox: PathBuf,
    deliver_dir: PathBuf,
    handler: Arc<Handler>,
    in_flight: ProcessingSet,
    permits: Arc<Semaphore>,
}

impl IngestionWatcher {
    /// Creates a watcher for `inbox` and `deliver_dir`
    ///
    /// Both directories should exist; they are canonicalized so events from
    /// symlinked paths still route correctly.
    pub fn new(
        inbox: &Path,
        deliver_dir: &Path,
        messenger: Arc<dyn IMessenger>,
        categorizer: Arc<dyn IFileCategorizer>,
        admin: ChatId,
    ) -> Self {
        Self {
            inbox: canonical(inbox),
            deliver_dir: canonical(deliver_dir),
            handler: Arc::new(Handler {
                messenger,
                categorizer,
                admin,
                grace_period: DEFAULT_GRACE_PERIOD,
            }),
            in_flight: ProcessingSet::new(),
            permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT_TASKS)),
        }
    }

    /// Wait before uploading a file from the deliver folder
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        if let Some(handler) = Arc::get_mut(&mut self.handler) {
            handler.grace_period = grace_period;
        }
        self
    }

    /// Upper bound on concurrently running handling tasks
    pub fn with_max_concurrent_tasks(mut self, max: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(max.max(1)));
        self
    }

    pub fn in_flight(&self) -> &ProcessingSet {
        &self.in_flight
    }

    /// Decides which behavior a path gets, by its parent directory
    pub fn route(&self, path: &Path) -> Option<Route> {
        let parent = canonical(path.parent()?);
        if parent == self.deliver_dir {
            Some(Route::Deliver)
        } else if parent == self.inbox {
            Some(Route::Categorize)
        } else {
            None
        }
    }

    /// Runs one categorization sweep outside the event path
    pub async fn sweep(&self) {
        match self.handler.categorizer.categorize_inbox().await {
            Ok(moved) => info!(moved, "Initial inbox sweep complete"),
            Err(e) => warn!(error = %e, "Initial inbox sweep failed"),
        }
    }

    /// Handles one change event
    ///
    /// Returns the spawned task, or `None` when the event was dropped
    /// (unwatched directory, not a regular file, or path already in flight).
    pub async fn dispatch(&self, event: ChangeEvent) -> Option<JoinHandle<()>> {
        let path = event.path().to_path_buf();

        let Some(route) = self.route(&path) else {
            debug!(path = %path.display(), "Event outside watched directories");
            return None;
        };

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                debug!(path = %path.display(), "Ignoring non-file entry");
                return None;
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Path vanished before dispatch");
                return None;
            }
        }

        let Some(guard) = self.in_flight.try_acquire(&path) else {
            debug!(path = %path.display(), event = ?event, "Already in flight, event dropped");
            return None;
        };

        let permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                warn!(error = %e, "Task permits closed, event dropped");
                return None;
            }
        };

        debug!(path = %path.display(), route = ?route, "Dispatching handler");
        let handler = Arc::clone(&self.handler);
        Some(tokio::spawn(async move {
            let _guard = guard;
            let _permit = permit;
            handler.handle(route, path).await;
        }))
    }

    /// Consumes change events until the channel closes or `shutdown` fires
    ///
    /// Handling tasks already spawned keep running to completion.
    pub async fn run(&self, mut events: mpsc::Receiver<ChangeEvent>, shutdown: CancellationToken) {
        info!(
            inbox = %self.inbox.display(),
            deliver_dir = %self.deliver_dir.display(),
            "Ingestion watcher started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => {
                        self.dispatch(event).await;
                    }
                    None => {
                        warn!("Change channel closed");
                        break;
                    }
                },
            }
        }

        info!("Ingestion watcher stopped");
    }
}
