//! Monitor scheduler - runs every monitoring loop for the process lifetime
//!
//! Three timer loops and one event loop, each its own task:
//!
//! ```text
//!  interval(connectivity) ──→ ConnectivityMonitor::probe_once ──┐
//!  interval(ports)        ──→ PortWatch::scan_once ─────────────┼──→ SendGate
//!  interval(maintenance)  ──→ Maintenance::run_once ────────────┘
//!  FileWatcher ──→ mpsc ──→ IngestionWatcher::run ──→ handling tasks
//! ```
//!
//! Connectivity and port ticks fire immediately; maintenance first fires one
//! full interval after start. The ingestion loop runs one categorization
//! sweep before it starts consuming events. Cancelling the shutdown token
//! stops the timers; a tick already running completes first.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::connectivity::ConnectivityMonitor;
use crate::ingestion::IngestionWatcher;
use crate::maintenance::Maintenance;
use crate::port_watch::PortWatch;
use crate::watcher::ChangeEvent;

/// Tick periods of the timer loops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopIntervals {
    pub connectivity: Duration,
    pub ports: Duration,
    pub maintenance: Duration,
}

impl Default for LoopIntervals {
    fn default() -> Self {
        Self {
            connectivity: Duration::from_secs(30),
            ports: Duration::from_secs(5),
            maintenance: Duration::from_secs(3600),
        }
    }
}

/// Owns the monitors until [`spawn`](MonitorScheduler::spawn) hands them to tasks
pub struct MonitorScheduler {
    connectivity: Arc<ConnectivityMonitor>,
    ports: Arc<PortWatch>,
    /// `None` when periodic maintenance is disabled
    maintenance: Option<Arc<Maintenance>>,
    ingestion: Arc<IngestionWatcher>,
    intervals: LoopIntervals,
}

/// Join handles of the running loops
pub struct SchedulerHandle {
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl SchedulerHandle {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Waits for every loop to return
    pub async fn join(self) {
        for (name, task) in self.tasks {
            match task.await {
                Ok(()) => debug!(task = name, "Loop finished"),
                Err(e) => error!(task = name, error = %e, "Loop terminated abnormally"),
            }
        }
    }
}

impl MonitorScheduler {
    pub fn new(
        connectivity: Arc<ConnectivityMonitor>,
        ports: Arc<PortWatch>,
        maintenance: Option<Arc<Maintenance>>,
        ingestion: Arc<IngestionWatcher>,
        intervals: LoopIntervals,
    ) -> Self {
        Self {
            connectivity,
            ports,
            maintenance,
            ingestion,
            intervals,
        }
    }

    /// Spawns every loop on the current runtime
    ///
    /// # Arguments
    /// * `events` - Receiver from [`FileWatcher::new`](crate::watcher::FileWatcher::new)
    /// * `shutdown` - Cancelled to stop all loops
    pub fn spawn(
        self,
        events: mpsc::Receiver<ChangeEvent>,
        shutdown: CancellationToken,
    ) -> SchedulerHandle {
        info!(
            connectivity_secs = self.intervals.connectivity.as_secs(),
            ports_secs = self.intervals.ports.as_secs(),
            maintenance_secs = self.intervals.maintenance.as_secs(),
            maintenance = self.maintenance.is_some(),
            "Starting monitor loops"
        );

        let mut tasks = Vec::with_capacity(4);

        let connectivity = self.connectivity;
        tasks.push((
            "connectivity",
            tokio::spawn(run_timer(
                "connectivity",
                self.intervals.connectivity,
                true,
                shutdown.clone(),
                move || {
                    let monitor = Arc::clone(&connectivity);
                    async move {
                        monitor.probe_once().await;
                    }
                },
            )),
        ));

        let ports = self.ports;
        tasks.push((
            "ports",
            tokio::spawn(run_timer(
                "ports",
                self.intervals.ports,
                true,
                shutdown.clone(),
                move || {
                    let watch = Arc::clone(&ports);
                    async move {
                        watch.scan_once().await;
                    }
                },
            )),
        ));

        if let Some(maintenance) = self.maintenance {
            tasks.push((
                "maintenance",
                tokio::spawn(run_timer(
                    "maintenance",
                    self.intervals.maintenance,
                    false,
                    shutdown.clone(),
                    move || {
                        let maintenance = Arc::clone(&maintenance);
                        async move {
                            maintenance.run_once().await;
                        }
                    },
                )),
            ));
        }

        let ingestion = self.ingestion;
        tasks.push((
            "ingestion",
            tokio::spawn(async move {
                ingestion.sweep().await;
                ingestion.run(events, shutdown).await;
            }),
        ));

        SchedulerHandle { tasks }
    }
}

/// Calls `tick` every `period` until `shutdown` is cancelled
///
/// With `immediate` the first tick fires at once, otherwise after one period.
async fn run_timer<F, Fut>(
    name: &'static str,
    period: Duration,
    immediate: bool,
    shutdown: CancellationToken,
    mut tick: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let start = if immediate {
        Instant::now()
    } else {
        Instant::now() + period
    };
    let mut interval = tokio::time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => tick().await,
        }
    }

    info!(task = name, "Loop stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use hostwatch_core::domain::MonitoredPort;
    use hostwatch_core::ports::{
        IFileCategorizer, IHostReporter, IMessenger, IPortScanner, ISpeedProbe,
    };

    use super::*;
    use crate::queue::SendGate;
    use crate::testing::{
        gate, monitor, CountingCategorizer, FixedSpeed, RecordingMessenger, ScriptedProbe,
        ScriptedScanner, StaticReporter, ADMIN,
    };

    struct Rig {
        probe: Arc<ScriptedProbe>,
        scanner: Arc<ScriptedScanner>,
        categorizer: Arc<CountingCategorizer>,
        scheduler: MonitorScheduler,
        _dir: tempfile::TempDir,
    }

    fn rig(with_maintenance: bool) -> Rig {
        let dir = tempfile::tempdir().unwrap();
        let outbox = dir.path().join("Outbox");
        std::fs::create_dir_all(&outbox).unwrap();

        let messenger = RecordingMessenger::new();
        let probe = ScriptedProbe::new(&[]);
        let scanner = ScriptedScanner::new(Vec::new());
        let categorizer = Arc::new(CountingCategorizer::default());
        let gate: Arc<SendGate> = gate(&messenger, Duration::ZERO);
        let link = monitor(&probe, &gate);

        let ports = Arc::new(PortWatch::new(
            Arc::clone(&scanner) as Arc<dyn IPortScanner>,
            Arc::clone(&gate),
            Arc::clone(&link),
            ADMIN,
            &[MonitoredPort::new(22, "ssh")],
            true,
        ));
        let maintenance = with_maintenance.then(|| {
            Arc::new(Maintenance::new(
                Arc::clone(&categorizer) as Arc<dyn IFileCategorizer>,
                Arc::new(StaticReporter) as Arc<dyn IHostReporter>,
                Some(Arc::new(FixedSpeed(None)) as Arc<dyn ISpeedProbe>),
                Duration::from_secs(120),
                Arc::clone(&gate),
                Arc::clone(&link),
                ADMIN,
            ))
        });
        let ingestion = Arc::new(IngestionWatcher::new(
            dir.path(),
            &outbox,
            Arc::clone(&messenger) as Arc<dyn IMessenger>,
            Arc::clone(&categorizer) as Arc<dyn IFileCategorizer>,
            ADMIN,
        ));

        let scheduler = MonitorScheduler::new(
            link,
            ports,
            maintenance,
            ingestion,
            LoopIntervals::default(),
        );

        Rig {
            probe,
            scanner,
            categorizer,
            scheduler,
            _dir: dir,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_loops_tick_at_their_intervals() {
        let rig = rig(true);
        let (_tx, rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        let handle = rig.scheduler.spawn(rx, shutdown.clone());
        assert_eq!(handle.len(), 4);

        tokio::time::sleep(Duration::from_secs(61)).await;

        // t = 0, 30, 60
        assert_eq!(rig.probe.calls.load(Ordering::SeqCst), 3);
        // t = 0, 5, ..., 60
        assert_eq!(rig.scanner.requested.lock().unwrap().len(), 13);
        // startup sweep only; maintenance has not fired yet
        assert_eq!(rig.categorizer.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(rig.categorizer.calls.load(Ordering::SeqCst), 2);

        shutdown.cancel();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_maintenance_has_no_loop() {
        let rig = rig(false);
        let (_tx, rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        let handle = rig.scheduler.spawn(rx, shutdown.clone());
        assert_eq!(handle.len(), 3);

        tokio::time::sleep(Duration::from_secs(3601)).await;
        assert_eq!(rig.categorizer.calls.load(Ordering::SeqCst), 1);

        shutdown.cancel();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_ticks() {
        let rig = rig(false);
        let (_tx, rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        let handle = rig.scheduler.spawn(rx, shutdown.clone());

        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown.cancel();
        handle.join().await;
        let calls = rig.probe.calls.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(rig.probe.calls.load(Ordering::SeqCst), calls);
    }
}
