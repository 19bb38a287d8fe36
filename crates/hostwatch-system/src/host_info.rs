//! Host resource summary for the status broadcast
//!
//! CPU, load and memory come from `sysinfo`, disk usage from the `sysinfo`
//! disk list entry whose mount point holds the inbox, and the file count from
//! a walk of the inbox tree. Any metric that cannot be read is reported as
//! unavailable.

use std::path::{Path, PathBuf};
use std::time::Duration;

use hostwatch_core::ports::IHostReporter;
use sysinfo::{
    CpuRefreshKind, Disks, MemoryRefreshKind, RefreshKind, System, MINIMUM_CPU_UPDATE_INTERVAL,
};
use tracing::{debug, warn};

const GB: f64 = 1e9;

/// One reading of the host, ready to render
#[derive(Debug, Clone, PartialEq)]
pub struct HostSnapshot {
    pub cores: usize,
    pub cpu_usage: Option<f32>,
    /// 1, 5 and 15 minute load averages
    pub load: Option<[f64; 3]>,
    /// `(total, used)` bytes
    pub memory: Option<(u64, u64)>,
    /// `(total, used)` bytes of the inbox filesystem
    pub disk: Option<(u64, u64)>,
    pub files: usize,
}

impl HostSnapshot {
    pub fn render(&self) -> String {
        let mut cpu_line = match self.cpu_usage {
            Some(usage) => format!("💻 CPU: {usage:.1}% ({} cores", self.cores),
            None => format!("💻 CPU: unavailable ({} cores", self.cores),
        };
        if let Some([one, five, fifteen]) = self.load {
            cpu_line.push_str(&format!(", load {one:.2} {five:.2} {fifteen:.2}"));
        }
        cpu_line.push(')');

        let mem_line = match self.memory {
            Some((total, used)) => format!("🧠 RAM: {}", usage_text(total, used)),
            None => "🧠 RAM: unavailable".to_string(),
        };
        let disk_line = match self.disk {
            Some((total, used)) => format!("💾 Disk: {}", usage_text(total, used)),
            None => "💾 Disk: unavailable".to_string(),
        };

        format!("{cpu_line}\n{mem_line}\n{disk_line}\n📁 Files: {}", self.files)
    }
}

fn usage_text(total: u64, used: u64) -> String {
    let percent = if total == 0 {
        0.0
    } else {
        used as f64 * 100.0 / total as f64
    };
    format!(
        "{:.2} / {:.2} GB ({percent:.1}%)",
        used as f64 / GB,
        total as f64 / GB
    )
}

/// `(total, used)` of the mount with the longest mount point containing `path`
///
/// `mounts` yields `(mount_point, total, available)`.
pub fn filesystem_usage<'a>(
    path: &Path,
    mounts: impl IntoIterator<Item = (&'a Path, u64, u64)>,
) -> Option<(u64, u64)> {
    mounts
        .into_iter()
        .filter(|(mount, _, _)| path.starts_with(mount))
        .max_by_key(|(mount, _, _)| mount.components().count())
        .map(|(_, total, available)| (total, total.saturating_sub(available)))
}

/// Number of regular files under `root`, recursively
pub fn count_files(root: &Path) -> usize {
    let mut count = 0;
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            match entry.file_type() {
                Ok(t) if t.is_dir() => pending.push(entry.path()),
                Ok(t) if t.is_file() => count += 1,
                _ => {}
            }
        }
    }
    count
}

fn disk_usage(inbox: &Path) -> Option<(u64, u64)> {
    let path = std::fs::canonicalize(inbox).unwrap_or_else(|_| inbox.to_path_buf());
    let disks = Disks::new_with_refreshed_list();
    let usage = filesystem_usage(
        &path,
        disks
            .list()
            .iter()
            .map(|d| (d.mount_point(), d.total_space(), d.available_space())),
    );
    if usage.is_none() {
        debug!(path = %path.display(), "No mounted filesystem holds the inbox");
    }
    usage
}

/// [`IHostReporter`] backed by `sysinfo`
#[derive(Debug, Clone)]
pub struct HostReporter {
    inbox: PathBuf,
    sample_window: Duration,
}

impl HostReporter {
    pub fn new(inbox: impl Into<PathBuf>) -> Self {
        Self {
            inbox: inbox.into(),
            sample_window: Duration::from_secs(1),
        }
    }

    /// CPU usage is averaged over this window, never shorter than
    /// [`MINIMUM_CPU_UPDATE_INTERVAL`]
    pub fn with_sample_window(mut self, window: Duration) -> Self {
        self.sample_window = window;
        self
    }

    /// Takes a reading; blocks for the sample window
    pub fn snapshot_blocking(&self) -> HostSnapshot {
        let mut sys = System::new_with_specifics(
            RefreshKind::nothing()
                .with_cpu(CpuRefreshKind::nothing().with_cpu_usage())
                .with_memory(MemoryRefreshKind::nothing().with_ram()),
        );
        std::thread::sleep(self.sample_window.max(MINIMUM_CPU_UPDATE_INTERVAL));
        sys.refresh_cpu_usage();

        let cores = match sys.cpus().len() {
            0 => std::thread::available_parallelism().map_or(1, |n| n.get()),
            n => n,
        };
        let cpu_usage = (!sys.cpus().is_empty()).then(|| sys.global_cpu_usage());

        let load = System::load_average();
        let total = sys.total_memory();
        let memory = (total > 0).then(|| (total, total.saturating_sub(sys.available_memory())));

        HostSnapshot {
            cores,
            cpu_usage,
            load: Some([load.one, load.five, load.fifteen]),
            memory,
            disk: disk_usage(&self.inbox),
            files: count_files(&self.inbox),
        }
    }
}

#[async_trait::async_trait]
impl IHostReporter for HostReporter {
    async fn summary(&self) -> String {
        let reporter = self.clone();
        match tokio::task::spawn_blocking(move || reporter.snapshot_blocking()).await {
            Ok(snapshot) => snapshot.render(),
            Err(e) => {
                warn!(error = %e, "Host snapshot task failed");
                "Host metrics unavailable.".to_string()
            }
        }
    }
}
