//! Port Watch
//!
//! Keeps one [`PortWatchEntry`] per configured port and reports only edges:
//! a service that starts or stops listening produces one notification, an
//! unchanged port produces nothing. The first scan records a baseline.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hostwatch_core::domain::{
    code_span, escape_markdown, ChatId, MonitoredPort, OutboundMessage, PortChange,
    PortWatchEntry, ProcessIdentity,
};
use hostwatch_core::ports::IPortScanner;
use tracing::{debug, info, warn};

use crate::connectivity::ConnectivityMonitor;
use crate::queue::SendGate;

/// One reported edge, as returned by [`PortWatch::scan_once`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortEvent {
    pub port: u16,
    pub label: String,
    pub change: PortChange,
    /// Owner of the socket, for `Started` events
    pub owner: Option<ProcessIdentity>,
}

impl PortEvent {
    fn render(&self) -> String {
        match self.change {
            PortChange::Started => {
                let mut text = format!(
                    "✅ *Service started:* {} (Port {})",
                    escape_markdown(&self.label),
                    self.port
                );
                if let Some(owner) = self.owner.as_ref().filter(|o| o.is_known()) {
                    text.push('\n');
                    text.push_str(&code_span(&owner.to_string()));
                }
                text
            }
            PortChange::Stopped => format!(
                "❌ *Service stopped:* {} (Port {})",
                escape_markdown(&self.label),
                self.port
            ),
        }
    }
}

/// Edge-triggered watcher over a fixed port set
pub struct PortWatch {
    scanner: Arc<dyn IPortScanner>,
    gate: Arc<SendGate>,
    link: Arc<ConnectivityMonitor>,
    admin: ChatId,
    entries: Mutex<BTreeMap<u16, PortWatchEntry>>,
    enabled: AtomicBool,
}

impl PortWatch {
    pub fn new(
        scanner: Arc<dyn IPortScanner>,
        gate: Arc<SendGate>,
        link: Arc<ConnectivityMonitor>,
        admin: ChatId,
        monitored: &[MonitoredPort],
        enabled: bool,
    ) -> Self {
        let entries = monitored
            .iter()
            .map(|p| (p.port, PortWatchEntry::from(p)))
            .collect();

        Self {
            scanner,
            gate,
            link,
            admin,
            entries: Mutex::new(entries),
            enabled: AtomicBool::new(enabled),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<u16, PortWatchEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
        info!(enabled, "Port watch toggled");
    }

    /// Copy of the current entries, ordered by port
    pub fn entries(&self) -> Vec<PortWatchEntry> {
        self.lock().values().cloned().collect()
    }

    /// Runs one batched scan and notifies about every changed port
    ///
    /// A scanner error skips the tick without touching any entry.
    pub async fn scan_once(&self) -> Vec<PortEvent> {
        if !self.is_enabled() {
            return Vec::new();
        }

        let ports: BTreeSet<u16> = self.lock().keys().copied().collect();
        if ports.is_empty() {
            return Vec::new();
        }

        let mut active = match self.scanner.scan(&ports).await {
            Ok(active) => active,
            Err(e) => {
                warn!(error = %e, "Port scan failed, skipping tick");
                return Vec::new();
            }
        };

        let events: Vec<PortEvent> = {
            let mut entries = self.lock();
            entries
                .values_mut()
                .filter_map(|entry| {
                    let owner = active.remove(&entry.port);
                    let change = entry.observe(owner.is_some())?;
                    Some(PortEvent {
                        port: entry.port,
                        label: entry.label.clone(),
                        change,
                        owner,
                    })
                })
                .collect()
        };

        if events.is_empty() {
            debug!(ports = ports.len(), "No port changes");
            return events;
        }

        let is_down = self.link.is_down();
        for event in &events {
            info!(port = event.port, label = %event.label, change = ?event.change, "Port state changed");
            self.gate
                .send_or_queue(OutboundMessage::markdown(self.admin, event.render()), is_down)
                .await;
        }

        events
    }
}
