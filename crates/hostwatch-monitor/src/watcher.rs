//! Filesystem watching for the ingestion directories
//!
//! Wraps the `notify` crate and converts raw OS events into [`ChangeEvent`]
//! values on a tokio channel. Only creations and writes matter for
//! ingestion; removals, renames away and access events are dropped here.
//!
//! ```text
//! inotify
//!    │
//!    ▼
//! FileWatcher ──→ mpsc::channel ──→ IngestionWatcher
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Capacity of the event channel between the notify thread and the loop
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// A create-or-write observation for one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A new file appeared (created or moved in)
    Created(PathBuf),
    /// An existing file's content changed
    Modified(PathBuf),
}

impl ChangeEvent {
    pub fn path(&self) -> &Path {
        match self {
            ChangeEvent::Created(p) | ChangeEvent::Modified(p) => p,
        }
    }
}

/// Watches directories (non-recursively) using the OS-native mechanism
///
/// Dropping the watcher stops all watches and closes the event channel.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Creates the watcher and the receiver its events are delivered on
    ///
    /// # Errors
    /// Returns an error if the OS watcher cannot be created (e.g. inotify
    /// instance limit reached)
    pub fn new() -> Result<(Self, mpsc::Receiver<ChangeEvent>)> {
        let (tx, rx) = mpsc::channel::<ChangeEvent>(EVENT_CHANNEL_CAPACITY);

        let watcher = RecommendedWatcher::new(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    if let Some(change) = map_notify_event(&event) {
                        if let Err(e) = tx.blocking_send(change) {
                            warn!(error = %e, "Failed to forward change event (receiver dropped)");
                        }
                    }
                }
                Err(err) => {
                    error!(error = %err, "File watcher error");
                }
            },
            notify::Config::default(),
        )
        .context("Failed to create file watcher")?;

        Ok((Self { watcher }, rx))
    }

    /// Starts watching the direct children of `path`
    ///
    /// # Errors
    /// Returns an error if the directory does not exist or cannot be watched
    pub fn watch(&mut self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "Watching directory");

        self.watcher
            .watch(path, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch path: {}", path.display()))
    }
}

/// Converts a `notify::Event` into a [`ChangeEvent`]
///
/// - `Create(*)` -> `Created`
/// - `Modify(Name(To | Both))` -> `Created` for the destination path
/// - `Modify(Data(*))` and other content modifications -> `Modified`
/// - metadata changes, removals, renames away and access events -> `None`
fn map_notify_event(event: &notify::Event) -> Option<ChangeEvent> {
    let paths = &event.paths;

    match &event.kind {
        EventKind::Create(_) => {
            let path = paths.first()?;
            debug!(path = %path.display(), "Mapped Create event");
            Some(ChangeEvent::Created(path.clone()))
        }

        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let path = paths.get(1).or_else(|| paths.first())?;
            debug!(path = %path.display(), "Rename into watched directory");
            Some(ChangeEvent::Created(path.clone()))
        }

        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            let path = paths.first()?;
            debug!(path = %path.display(), "Moved into watched directory");
            Some(ChangeEvent::Created(path.clone()))
        }

        EventKind::Modify(ModifyKind::Name(_)) | EventKind::Modify(ModifyKind::Metadata(_)) => {
            debug!(kind = ?event.kind, "Ignoring name/metadata event");
            None
        }

        EventKind::Modify(_) => {
            let path = paths.first()?;
            debug!(path = %path.display(), "Mapped Modify event");
            Some(ChangeEvent::Modified(path.clone()))
        }

        _ => {
            debug!(kind = ?event.kind, "Ignoring event kind");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind};

    use super::*;

    fn event(kind: EventKind, paths: &[&str]) -> notify::Event {
        let mut event = notify::Event::new(kind);
        for p in paths {
            event = event.add_path(PathBuf::from(p));
        }
        event
    }

    #[test]
    fn test_map_create() {
        let e = event(EventKind::Create(CreateKind::File), &["/inbox/a.txt"]);
        assert_eq!(
            map_notify_event(&e),
            Some(ChangeEvent::Created(PathBuf::from("/inbox/a.txt")))
        );
    }

    #[test]
    fn test_map_data_modify() {
        let e = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/inbox/a.txt"],
        );
        assert_eq!(
            map_notify_event(&e),
            Some(ChangeEvent::Modified(PathBuf::from("/inbox/a.txt")))
        );
    }

    #[test]
    fn test_map_rename_uses_destination() {
        let e = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/tmp/a.part", "/inbox/a.txt"],
        );
        assert_eq!(
            map_notify_event(&e),
            Some(ChangeEvent::Created(PathBuf::from("/inbox/a.txt")))
        );

        let e = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            &["/inbox/b.txt"],
        );
        assert_eq!(
            map_notify_event(&e),
            Some(ChangeEvent::Created(PathBuf::from("/inbox/b.txt")))
        );
    }

    #[test]
    fn test_map_ignored_kinds() {
        let ignored = [
            EventKind::Remove(RemoveKind::File),
            EventKind::Access(AccessKind::Any),
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
        ];
        for kind in ignored {
            assert_eq!(map_notify_event(&event(kind, &["/inbox/a.txt"])), None);
        }
    }

    #[test]
    fn test_map_without_paths() {
        let e = event(EventKind::Create(CreateKind::File), &[]);
        assert_eq!(map_notify_event(&e), None);
    }

    #[test]
    fn test_change_event_path() {
        let e = ChangeEvent::Modified(PathBuf::from("/x/y"));
        assert_eq!(e.path(), Path::new("/x/y"));
    }

    #[tokio::test]
    async fn test_watcher_reports_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let (mut watcher, mut rx) = FileWatcher::new().unwrap();
        watcher.watch(dir.path()).unwrap();

        let file = dir.path().join("hello.txt");
        std::fs::write(&file, b"hi").unwrap();

        let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no event within timeout")
            .expect("channel closed");
        assert_eq!(received.path().file_name(), file.file_name());
    }

    #[test]
    fn test_watch_missing_directory_fails() {
        let (mut watcher, _rx) = FileWatcher::new().unwrap();
        assert!(watcher.watch(Path::new("/nonexistent/hostwatch/inbox")).is_err());
    }
}
