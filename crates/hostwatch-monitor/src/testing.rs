//! Scripted collaborators shared by the unit tests of this crate

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use hostwatch_core::domain::{ChatId, OutboundMessage, ProcessIdentity};
use hostwatch_core::ports::{
    IFileCategorizer, IHostReporter, IMessenger, IPortScanner, IReachabilityProbe, ISpeedProbe,
    SpeedSample,
};
use tokio::time::Instant;

use crate::connectivity::ConnectivityMonitor;
use crate::queue::SendGate;

pub const ADMIN: ChatId = ChatId::new(42);

/// Returns queued reachability results, then `fallback` forever
pub struct ScriptedProbe {
    results: Mutex<VecDeque<bool>>,
    fallback: bool,
    pub calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new(results: &[bool]) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results.iter().copied().collect()),
            fallback: true,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl IReachabilityProbe for ScriptedProbe {
    async fn is_reachable(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback)
    }
}

/// Returns queued scan results; `Err` entries simulate an unreadable socket table
pub struct ScriptedScanner {
    results: Mutex<VecDeque<Result<Vec<u16>, String>>>,
    pub requested: Mutex<Vec<BTreeSet<u16>>>,
}

impl ScriptedScanner {
    pub fn new(results: Vec<Result<Vec<u16>, String>>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results.into()),
            requested: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait::async_trait]
impl IPortScanner for ScriptedScanner {
    async fn scan(&self, ports: &BTreeSet<u16>) -> anyhow::Result<HashMap<u16, ProcessIdentity>> {
        self.requested.lock().unwrap().push(ports.clone());
        let next = self
            .results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()));
        match next {
            Ok(active) => Ok(active
                .into_iter()
                .map(|port| (port, ProcessIdentity::new(1000 + port as u32, "daemon")))
                .collect()),
            Err(reason) => Err(anyhow!(reason)),
        }
    }
}

/// Records every delivery with its (virtual) timestamp
#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<(Instant, OutboundMessage)>>,
    pub attempts: Mutex<Vec<String>>,
    pub documents: Mutex<Vec<PathBuf>>,
    /// Remaining forced failures keyed by exact message text
    failures: Mutex<HashMap<String, usize>>,
    fail_everything: AtomicBool,
}

impl RecordingMessenger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The next `times` deliveries of `text` fail
    pub fn fail_text(&self, text: &str, times: usize) {
        self.failures
            .lock()
            .unwrap()
            .insert(text.to_string(), times);
    }

    pub fn set_offline(&self, offline: bool) {
        self.fail_everything.store(offline, Ordering::SeqCst);
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, m)| m.text.clone())
            .collect()
    }

    pub fn timestamps(&self) -> Vec<Instant> {
        self.sent.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    fn should_fail(&self, text: &str) -> bool {
        if self.fail_everything.load(Ordering::SeqCst) {
            return true;
        }
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(text) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait::async_trait]
impl IMessenger for RecordingMessenger {
    async fn send_message(&self, message: &OutboundMessage) -> anyhow::Result<()> {
        self.attempts.lock().unwrap().push(message.text.clone());
        if self.should_fail(&message.text) {
            return Err(anyhow!("simulated delivery failure"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((Instant::now(), message.clone()));
        Ok(())
    }

    async fn send_document(
        &self,
        _chat_id: ChatId,
        path: &Path,
        _caption: &str,
    ) -> anyhow::Result<()> {
        if self.fail_everything.load(Ordering::SeqCst) {
            return Err(anyhow!("simulated upload failure"));
        }
        self.documents.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

/// Counts sweeps; optionally panics to exercise cleanup paths
#[derive(Default)]
pub struct CountingCategorizer {
    pub calls: AtomicUsize,
    pub moved_per_sweep: usize,
    pub panic: bool,
    pub fail: bool,
}

#[async_trait::async_trait]
impl IFileCategorizer for CountingCategorizer {
    async fn categorize_inbox(&self) -> anyhow::Result<usize> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic {
            panic!("categorizer exploded");
        }
        if self.fail {
            return Err(anyhow!("inbox unreadable"));
        }
        Ok(self.moved_per_sweep)
    }
}

pub struct StaticReporter;

#[async_trait::async_trait]
impl IHostReporter for StaticReporter {
    async fn summary(&self) -> String {
        "CPU: 3.0%\nRAM: 41.0%".to_string()
    }
}

pub struct FixedSpeed(pub Option<SpeedSample>);

#[async_trait::async_trait]
impl ISpeedProbe for FixedSpeed {
    async fn measure(&self) -> anyhow::Result<SpeedSample> {
        self.0.clone().ok_or_else(|| anyhow!("speedtest not installed"))
    }
}

pub fn gate(messenger: &Arc<RecordingMessenger>, pacing: Duration) -> Arc<SendGate> {
    Arc::new(SendGate::new(
        Arc::clone(messenger) as Arc<dyn IMessenger>,
        pacing,
    ))
}

pub fn monitor(probe: &Arc<ScriptedProbe>, gate: &Arc<SendGate>) -> Arc<ConnectivityMonitor> {
    Arc::new(ConnectivityMonitor::new(
        Arc::clone(probe) as Arc<dyn IReachabilityProbe>,
        Arc::clone(gate),
        ADMIN,
        true,
    ))
}
