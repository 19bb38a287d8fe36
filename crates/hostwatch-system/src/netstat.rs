//! Listening-port scanner over procfs
//!
//! One scan reads `/proc/net/tcp` and `/proc/net/tcp6`, keeps sockets in the
//! LISTEN state whose local port was requested, then maps socket inodes to
//! owning pids by walking `/proc/<pid>/fd`. Process names come from
//! `sysinfo`.
//!
//! ```text
//!   sl  local_address rem_address   st ... uid  timeout inode
//!    0: 00000000:0016 00000000:0000 0A ...   0        0 23811
//!                 ^^^^              ^^                  ^^^^^
//!                 port (hex)        LISTEN              inode
//! ```

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use anyhow::Context;
use hostwatch_core::domain::ProcessIdentity;
use hostwatch_core::ports::IPortScanner;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::{debug, trace};

use crate::SystemError;

/// `st` column value for TCP_LISTEN
const TCP_LISTEN: &str = "0A";

/// A listening socket found in a `/proc/net/tcp*` table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListeningSocket {
    pub port: u16,
    pub inode: u64,
}

/// Parses one `/proc/net/tcp`-format table
///
/// Returns the LISTEN sockets whose port is in `wanted`. Malformed lines are
/// skipped.
pub fn parse_listening(table: &str, wanted: &BTreeSet<u16>) -> Vec<ListeningSocket> {
    table
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 10 || fields[3] != TCP_LISTEN {
                return None;
            }
            let (_, port_hex) = fields[1].rsplit_once(':')?;
            let port = u16::from_str_radix(port_hex, 16).ok()?;
            if !wanted.contains(&port) {
                return None;
            }
            let inode = fields[9].parse::<u64>().ok()?;
            Some(ListeningSocket { port, inode })
        })
        .collect()
}

/// Extracts the inode from a `socket:[12345]` fd link target
fn socket_inode(target: &Path) -> Option<u64> {
    target
        .to_str()?
        .strip_prefix("socket:[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}

/// Looks up the executable names of `pids`
///
/// Pids that exited or cannot be inspected are absent from the result.
pub fn process_names(pids: &[u32]) -> HashMap<u32, String> {
    if pids.is_empty() {
        return HashMap::new();
    }
    let pids: Vec<Pid> = pids.iter().map(|&pid| Pid::from_u32(pid)).collect();
    let mut sys = System::new();
    sys.refresh_processes_specifics(
        ProcessesToUpdate::Some(&pids),
        true,
        ProcessRefreshKind::nothing(),
    );

    pids.iter()
        .filter_map(|&pid| {
            let name = sys.process(pid)?.name().to_string_lossy().into_owned();
            (!name.is_empty()).then(|| (pid.as_u32(), name))
        })
        .collect()
}

/// [`IPortScanner`] reading the procfs socket tables
#[derive(Debug, Clone)]
pub struct ProcNetScanner {
    root: PathBuf,
}

impl Default for ProcNetScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcNetScanner {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Reads from an alternative procfs mount
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_tables(&self, wanted: &BTreeSet<u16>) -> Result<Vec<ListeningSocket>, SystemError> {
        let v4 = self.root.join("net/tcp");
        let table = std::fs::read_to_string(&v4).map_err(|source| SystemError::Io {
            path: v4.clone(),
            source,
        })?;
        let mut sockets = parse_listening(&table, wanted);

        // absent when IPv6 is disabled
        let v6 = self.root.join("net/tcp6");
        match std::fs::read_to_string(&v6) {
            Ok(table) => sockets.extend(parse_listening(&table, wanted)),
            Err(e) => debug!(path = %v6.display(), error = %e, "Skipping IPv6 socket table"),
        }

        Ok(sockets)
    }

    /// Maps socket inodes to the pids holding them
    ///
    /// Processes whose fd directory cannot be read (other users, exited
    /// meanwhile) are skipped.
    fn resolve_pids(&self, inodes: &BTreeSet<u64>) -> HashMap<u64, u32> {
        let mut pids = HashMap::new();
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return pids;
        };

        for entry in entries.flatten() {
            let Some(pid) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<u32>().ok())
            else {
                continue;
            };

            let Ok(fds) = std::fs::read_dir(entry.path().join("fd")) else {
                trace!(pid, "fd directory unreadable");
                continue;
            };

            for fd in fds.flatten() {
                if let Some(inode) = std::fs::read_link(fd.path())
                    .ok()
                    .and_then(|target| socket_inode(&target))
                    .filter(|inode| inodes.contains(inode))
                {
                    pids.entry(inode).or_insert(pid);
                }
            }

            if pids.len() == inodes.len() {
                break;
            }
        }

        pids
    }

    /// Synchronous scan; runs on the blocking pool from [`IPortScanner::scan`]
    pub fn scan_blocking(
        &self,
        ports: &BTreeSet<u16>,
    ) -> Result<HashMap<u16, ProcessIdentity>, SystemError> {
        let sockets = self.read_tables(ports)?;
        let inodes: BTreeSet<u64> = sockets.iter().map(|s| s.inode).filter(|&i| i != 0).collect();
        let pids = if inodes.is_empty() {
            HashMap::new()
        } else {
            self.resolve_pids(&inodes)
        };
        let names = process_names(&pids.values().copied().collect::<Vec<_>>());

        let mut active = HashMap::new();
        for socket in sockets {
            let owner = match pids.get(&socket.inode) {
                Some(&pid) => ProcessIdentity {
                    pid: Some(pid),
                    name: names.get(&pid).cloned(),
                },
                None => ProcessIdentity::unknown(),
            };
            // a port bound on both v4 and v6 keeps the first resolved owner
            let slot = active.entry(socket.port).or_insert_with(ProcessIdentity::unknown);
            if !slot.is_known() {
                *slot = owner;
            }
        }

        debug!(requested = ports.len(), listening = active.len(), "Port scan complete");
        Ok(active)
    }
}

#[async_trait::async_trait]
impl IPortScanner for ProcNetScanner {
    async fn scan(&self, ports: &BTreeSet<u16>) -> anyhow::Result<HashMap<u16, ProcessIdentity>> {
        let scanner = self.clone();
        let ports = ports.clone();
        let active = tokio::task::spawn_blocking(move || scanner.scan_blocking(&ports))
            .await
            .map_err(SystemError::from)?
            .context("Failed to read listening sockets")?;
        Ok(active)
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::symlink;

    use super::*;

    const TCP: &str = "\
  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000:0016 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 23811 1 0000000000000000 100 0 0 10 0
   1: 0100007F:1538 00000000:0000 0A 00000000:00000000 00:00000000 00000000   112        0 30155 1 0000000000000000 100 0 0 10 0
   2: 0F02000A:0016 0202000A:C350 01 00000000:00000000 02:0008E3A4 00000000     0        0 41200 4 0000000000000000 20 4 30 10 -1
   3: garbage
";

    const TCP6: &str = "\
  sl  local_address                         remote_address                        st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000000000000000000000000000:0050 00000000000000000000000000000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 50001 1 0000000000000000 100 0 0 10 0
";

    fn wanted(ports: &[u16]) -> BTreeSet<u16> {
        ports.iter().copied().collect()
    }

    #[test]
    fn test_parse_listening_filters_state_and_port() {
        let sockets = parse_listening(TCP, &wanted(&[22, 5432, 8080]));
        assert_eq!(
            sockets,
            vec![
                ListeningSocket { port: 22, inode: 23811 },
                ListeningSocket { port: 5432, inode: 30155 },
            ]
        );
    }

    #[test]
    fn test_parse_ipv6_table() {
        let sockets = parse_listening(TCP6, &wanted(&[80]));
        assert_eq!(sockets, vec![ListeningSocket { port: 80, inode: 50001 }]);
    }

    #[test]
    fn test_socket_inode() {
        assert_eq!(socket_inode(Path::new("socket:[23811]")), Some(23811));
        assert_eq!(socket_inode(Path::new("pipe:[1]")), None);
        assert_eq!(socket_inode(Path::new("/dev/null")), None);
    }

    fn fake_proc() -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("net")).unwrap();
        std::fs::write(root.path().join("net/tcp"), TCP).unwrap();
        std::fs::write(root.path().join("net/tcp6"), TCP6).unwrap();

        // names are resolved against the live host, so use our own pid
        let owner = root.path().join(std::process::id().to_string());
        std::fs::create_dir_all(owner.join("fd")).unwrap();
        symlink("/dev/null", owner.join("fd/0")).unwrap();
        symlink("socket:[23811]", owner.join("fd/3")).unwrap();

        // not a pid
        std::fs::create_dir_all(root.path().join("self")).unwrap();
        root
    }

    #[test]
    fn test_scan_resolves_owners() {
        let root = fake_proc();
        let scanner = ProcNetScanner::with_root(root.path());

        let active = scanner.scan_blocking(&wanted(&[22, 80, 5432, 9999])).unwrap();

        assert_eq!(active.len(), 3);
        assert_eq!(active[&22].pid, Some(std::process::id()));
        assert!(active[&22].name.is_some());
        assert!(!active[&80].is_known());
        assert!(!active[&5432].is_known());
        assert!(!active.contains_key(&9999));
    }

    #[test]
    fn test_missing_table_is_error() {
        let root = tempfile::tempdir().unwrap();
        let scanner = ProcNetScanner::with_root(root.path());

        let err = scanner.scan_blocking(&wanted(&[22])).unwrap_err();
        assert!(matches!(err, SystemError::Io { .. }));
    }

    #[tokio::test]
    async fn test_async_scan() {
        let root = fake_proc();
        let scanner = ProcNetScanner::with_root(root.path());

        let active = scanner.scan(&wanted(&[22])).await.unwrap();
        assert_eq!(active[&22].pid, Some(std::process::id()));
    }

    #[test]
    fn test_process_names_of_live_pids() {
        let own = std::process::id();
        let names = process_names(&[own, u32::MAX]);

        assert!(names.get(&own).is_some_and(|n| !n.is_empty()));
        assert!(!names.contains_key(&u32::MAX));
        assert!(process_names(&[]).is_empty());
    }
}
