//! Extension-based inbox organizer
//!
//! Moves every regular file sitting directly in the inbox into a category
//! folder chosen by its extension. Existing names are never overwritten:
//! `photo.jpg` becomes `photo_1.jpg`, `photo_2.jpg`, ... on collision.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use hostwatch_core::ports::IFileCategorizer;
use tracing::{debug, info, warn};

use crate::SystemError;

/// Destination folder for a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Images,
    Videos,
    Documents,
    Audio,
    Archives,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Images,
        Category::Videos,
        Category::Documents,
        Category::Audio,
        Category::Archives,
        Category::Other,
    ];

    pub fn folder(&self) -> &'static str {
        match self {
            Category::Images => "Images",
            Category::Videos => "Videos",
            Category::Documents => "Documents",
            Category::Audio => "Audio",
            Category::Archives => "Archives",
            Category::Other => "Other",
        }
    }

    /// Classifies a file name by its (case-insensitive) extension
    pub fn of(file_name: &str) -> Self {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("jpg" | "jpeg" | "png" | "gif" | "bmp" | "svg" | "webp" | "tiff") => {
                Category::Images
            }
            Some("mp4" | "mkv" | "mov" | "avi" | "webm" | "flv" | "wmv" | "m4v") => {
                Category::Videos
            }
            Some(
                "pdf" | "docx" | "doc" | "xlsx" | "xls" | "pptx" | "ppt" | "txt" | "rtf" | "odt"
                | "ods",
            ) => Category::Documents,
            Some("mp3" | "wav" | "flac" | "aac" | "ogg" | "wma" | "m4a" | "opus") => {
                Category::Audio
            }
            Some("zip" | "rar" | "7z" | "tar" | "gz" | "bz2") => Category::Archives,
            _ => Category::Other,
        }
    }
}

/// First free path for `file_name` inside `dir`
pub fn unique_target(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = match file_name.rfind('.') {
        Some(pos) if pos > 0 => (&file_name[..pos], &file_name[pos..]),
        _ => (file_name, ""),
    };

    (1u32..)
        .map(|n| dir.join(format!("{stem}_{n}{ext}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// [`IFileCategorizer`] sorting the inbox into category folders
#[derive(Debug, Clone)]
pub struct FileOrganizer {
    inbox: PathBuf,
    /// Serializes sweeps so two never race on the same file
    serial: Arc<Mutex<()>>,
}

impl FileOrganizer {
    pub fn new(inbox: impl Into<PathBuf>) -> Self {
        Self {
            inbox: inbox.into(),
            serial: Arc::new(Mutex::new(())),
        }
    }

    pub fn inbox(&self) -> &Path {
        &self.inbox
    }

    /// Creates the inbox, the deliver folder and every category folder
    pub fn ensure_directories(&self, deliver_dir: &Path) -> Result<(), SystemError> {
        let dirs = std::iter::once(self.inbox.clone())
            .chain(std::iter::once(deliver_dir.to_path_buf()))
            .chain(Category::ALL.iter().map(|c| self.inbox.join(c.folder())));

        for dir in dirs {
            std::fs::create_dir_all(&dir).map_err(|source| SystemError::Io {
                path: dir.clone(),
                source,
            })?;
        }
        debug!(inbox = %self.inbox.display(), "Directory layout ready");
        Ok(())
    }

    /// Synchronous sweep; returns the number of files moved
    pub fn organize_blocking(&self) -> Result<usize, SystemError> {
        let _serial = self.serial.lock().unwrap_or_else(PoisonError::into_inner);

        let entries = std::fs::read_dir(&self.inbox).map_err(|source| SystemError::Io {
            path: self.inbox.clone(),
            source,
        })?;

        let mut moved = 0;
        for entry in entries.flatten() {
            match entry.file_type() {
                Ok(t) if t.is_file() => {}
                _ => continue,
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                warn!(path = %entry.path().display(), "Skipping non UTF-8 file name");
                continue;
            };

            let category = Category::of(&name);
            let dir = self.inbox.join(category.folder());
            if let Err(e) = std::fs::create_dir_all(&dir) {
                warn!(path = %dir.display(), error = %e, "Cannot create category folder");
                continue;
            }

            let target = unique_target(&dir, &name);
            match std::fs::rename(entry.path(), &target) {
                Ok(()) => {
                    moved += 1;
                    debug!(file = %name, category = category.folder(), "Organized");
                }
                Err(e) => warn!(file = %name, error = %e, "Failed to move file"),
            }
        }

        if moved > 0 {
            info!(moved, "Inbox organized");
        }
        Ok(moved)
    }
}

#[async_trait::async_trait]
impl IFileCategorizer for FileOrganizer {
    async fn categorize_inbox(&self) -> anyhow::Result<usize> {
        let organizer = self.clone();
        let moved = tokio::task::spawn_blocking(move || organizer.organize_blocking())
            .await
            .map_err(SystemError::from)?
            .context("Inbox sweep failed")?;
        Ok(moved)
    }
}
