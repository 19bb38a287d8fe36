//! Monitored ports and edge-triggered change detection
//!
//! A [`PortWatchEntry`] remembers the last listening state seen for one
//! configured port. The first observation only records a baseline; every
//! later observation that differs yields a [`PortChange`].

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// A port the operator asked to watch, with a human-readable label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredPort {
    /// TCP port number
    pub port: u16,
    /// Service name shown in notifications (e.g. `nginx`)
    pub label: String,
}

impl MonitoredPort {
    pub fn new(port: u16, label: impl Into<String>) -> Self {
        Self {
            port,
            label: label.into(),
        }
    }
}

/// The process that owns a listening socket
///
/// Either field may be unknown when the owning process belongs to another
/// user and its file descriptors cannot be inspected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessIdentity {
    pub pid: Option<u32>,
    pub name: Option<String>,
}

impl ProcessIdentity {
    pub fn new(pid: u32, name: impl Into<String>) -> Self {
        Self {
            pid: Some(pid),
            name: Some(name.into()),
        }
    }

    /// An owner that could not be resolved
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_known(&self) -> bool {
        self.pid.is_some()
    }
}

impl Display for ProcessIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match (&self.name, self.pid) {
            (Some(name), Some(pid)) => write!(f, "{name} (pid {pid})"),
            (None, Some(pid)) => write!(f, "pid {pid}"),
            (Some(name), None) => write!(f, "{name}"),
            (None, None) => write!(f, "unknown process"),
        }
    }
}

/// Direction of a listening-state edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortChange {
    Started,
    Stopped,
}

/// Last-known listening state of one monitored port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortWatchEntry {
    pub port: u16,
    pub label: String,
    /// `None` until the first scan has been observed
    pub last_known_active: Option<bool>,
}

impl PortWatchEntry {
    pub fn new(port: u16, label: impl Into<String>) -> Self {
        Self {
            port,
            label: label.into(),
            last_known_active: None,
        }
    }

    /// Records `active` and reports the edge it represents, if any
    ///
    /// The first observation is a baseline and never reports a change.
    pub fn observe(&mut self, active: bool) -> Option<PortChange> {
        let previous = self.last_known_active.replace(active);
        match previous {
            Some(was_active) if was_active != active => Some(if active {
                PortChange::Started
            } else {
                PortChange::Stopped
            }),
            _ => None,
        }
    }
}

impl From<&MonitoredPort> for PortWatchEntry {
    fn from(port: &MonitoredPort) -> Self {
        Self::new(port.port, port.label.clone())
    }
}
