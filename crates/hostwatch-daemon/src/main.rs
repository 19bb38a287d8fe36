//! Hostwatch Daemon - Background monitoring service
//!
//! This binary runs in the background for the lifetime of the host and handles:
//! - Connectivity probing with outage reports to the administrator
//! - Listening-port start/stop notifications
//! - Inbox categorization and outbox delivery
//! - Hourly status broadcasts
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon wires the host and Telegram adapters into the monitors of
//! `hostwatch-monitor`, hands them to the [`MonitorScheduler`], and waits
//! until a `CancellationToken` is triggered by SIGTERM or SIGINT. SIGUSR1 and
//! SIGUSR2 toggle the connectivity monitor and the port watch at runtime.

mod logging;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use hostwatch_core::config::Config;
use hostwatch_core::ports::{
    IFileCategorizer, IHostReporter, IMessenger, IPortScanner, IReachabilityProbe, ISpeedProbe,
};
use hostwatch_monitor::connectivity::ConnectivityMonitor;
use hostwatch_monitor::ingestion::IngestionWatcher;
use hostwatch_monitor::maintenance::Maintenance;
use hostwatch_monitor::port_watch::PortWatch;
use hostwatch_monitor::queue::SendGate;
use hostwatch_monitor::scheduler::{LoopIntervals, MonitorScheduler};
use hostwatch_monitor::watcher::FileWatcher;
use hostwatch_system::host_info::HostReporter;
use hostwatch_system::netstat::ProcNetScanner;
use hostwatch_system::organizer::FileOrganizer;
use hostwatch_system::ping::PingProbe;
use hostwatch_system::speedtest::SpeedtestCli;
use hostwatch_telegram::client::TelegramClient;
use hostwatch_telegram::messenger::TelegramMessenger;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

// ============================================================================
// Command line
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "hostwatchd", version, about = "Hostwatch monitoring daemon")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    check_config: bool,
}

/// Loads the configuration file and applies `HOSTWATCH_*` overrides
fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.map_or_else(Config::default_path, Path::to_path_buf);
    let mut config = Config::load(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    config
        .apply_env_overrides()
        .context("Failed to apply environment overrides")?;
    Ok(config)
}

// ============================================================================
// DaemonService
// ============================================================================

/// Main daemon service that owns every monitor until the scheduler starts
struct DaemonService {
    /// Validated application configuration
    config: Config,
    /// Telegram client, kept for the startup token check
    client: Arc<TelegramClient>,
    connectivity: Arc<ConnectivityMonitor>,
    ports: Arc<PortWatch>,
    /// `None` when `maintenance.enabled` is false
    maintenance: Option<Arc<Maintenance>>,
    ingestion: Arc<IngestionWatcher>,
    gate: Arc<SendGate>,
    /// Token for signalling graceful shutdown to all async tasks
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Builds the adapters and monitors and prepares the directory layout
    fn new(config: Config, shutdown: CancellationToken) -> Result<Self> {
        let admin = config.telegram.admin_chat_id;
        let inbox = config.ingestion.inbox.clone();
        let deliver_dir = config.ingestion.deliver_dir();

        let organizer = FileOrganizer::new(&inbox);
        organizer
            .ensure_directories(&deliver_dir)
            .context("Failed to prepare inbox directories")?;
        let categorizer: Arc<dyn IFileCategorizer> = Arc::new(organizer);

        let client = Arc::new(
            TelegramClient::with_base_url(
                config.telegram.bot_token.clone(),
                config.telegram.api_base.clone(),
                config.telegram.request_timeout(),
            )
            .context("Failed to build Telegram client")?,
        );
        let messenger: Arc<dyn IMessenger> =
            Arc::new(TelegramMessenger::new(Arc::clone(&client)));

        let gate = Arc::new(SendGate::new(
            Arc::clone(&messenger),
            config.notifications.flush_pacing(),
        ));

        let probe: Arc<dyn IReachabilityProbe> = Arc::new(PingProbe::new(
            config.connectivity.probe_host.clone(),
            config.connectivity.probe_timeout(),
        ));
        let connectivity = Arc::new(ConnectivityMonitor::new(
            probe,
            Arc::clone(&gate),
            admin,
            config.connectivity.enabled,
        ));

        let scanner: Arc<dyn IPortScanner> = Arc::new(ProcNetScanner::new());
        let ports = Arc::new(PortWatch::new(
            scanner,
            Arc::clone(&gate),
            Arc::clone(&connectivity),
            admin,
            &config.ports.monitored,
            config.ports.enabled,
        ));

        let maintenance = config.maintenance.enabled.then(|| {
            let reporter: Arc<dyn IHostReporter> = Arc::new(HostReporter::new(&inbox));
            let speed = config
                .maintenance
                .speed_test
                .then(|| Arc::new(SpeedtestCli::new()) as Arc<dyn ISpeedProbe>);
            Arc::new(Maintenance::new(
                Arc::clone(&categorizer),
                reporter,
                speed,
                config.maintenance.speed_test_timeout(),
                Arc::clone(&gate),
                Arc::clone(&connectivity),
                admin,
            ))
        });

        let ingestion = Arc::new(
            IngestionWatcher::new(&inbox, &deliver_dir, messenger, categorizer, admin)
                .with_grace_period(config.ingestion.grace_period())
                .with_max_concurrent_tasks(config.ingestion.max_concurrent_tasks),
        );

        Ok(Self {
            config,
            client,
            connectivity,
            ports,
            maintenance,
            ingestion,
            gate,
            shutdown,
        })
    }

    fn intervals(&self) -> LoopIntervals {
        LoopIntervals {
            connectivity: self.config.connectivity.interval(),
            ports: self.config.ports.interval(),
            maintenance: self.config.maintenance.interval(),
        }
    }

    /// Logs which bot account the token belongs to
    ///
    /// Failure is not fatal: the host may simply be offline at boot.
    async fn check_token(&self) {
        match self.client.get_me().await {
            Ok(me) => info!(
                bot_id = me.id,
                username = me.username.as_deref().unwrap_or("-"),
                "Telegram bot authenticated"
            ),
            Err(e) => warn!(error = %e, "Could not verify bot token; continuing"),
        }
    }

    /// Runs until the shutdown token is cancelled
    ///
    /// # Errors
    /// Returns an error if the filesystem watches cannot be established
    async fn run(self) -> Result<()> {
        let inbox = self.config.ingestion.inbox.clone();
        let deliver_dir = self.config.ingestion.deliver_dir();

        // The watcher must outlive the scheduler; dropping it closes the channel.
        let (mut watcher, events) = FileWatcher::new()?;
        watcher
            .watch(&inbox)
            .with_context(|| format!("Failed to watch inbox {}", inbox.display()))?;
        watcher
            .watch(&deliver_dir)
            .with_context(|| format!("Failed to watch {}", deliver_dir.display()))?;
        info!(
            inbox = %inbox.display(),
            deliver_dir = %deliver_dir.display(),
            "Watching directories"
        );

        self.check_token().await;

        tokio::spawn(toggle_signals(
            Arc::clone(&self.connectivity),
            Arc::clone(&self.ports),
            self.shutdown.clone(),
        ));

        let intervals = self.intervals();
        let scheduler = MonitorScheduler::new(
            self.connectivity,
            self.ports,
            self.maintenance,
            self.ingestion,
            intervals,
        );
        let handle = scheduler.spawn(events, self.shutdown.clone());

        self.shutdown.cancelled().await;
        info!("Shutdown requested, waiting for loops to finish");
        handle.join().await;
        drop(watcher);

        let pending = self.gate.queued_len();
        if pending > 0 {
            warn!(pending, "Discarding undelivered notifications");
        }

        Ok(())
    }
}

// ============================================================================
// Signal handling
// ============================================================================

/// Waits for SIGINT or SIGTERM, then cancels `token`
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// Both monitors log the new state themselves.
fn flip_connectivity(connectivity: &ConnectivityMonitor) {
    connectivity.set_enabled(!connectivity.is_enabled());
}

fn flip_ports(ports: &PortWatch) {
    ports.set_enabled(!ports.is_enabled());
}

/// SIGUSR1 flips the connectivity monitor, SIGUSR2 the port watch
#[cfg(unix)]
async fn toggle_signals(
    connectivity: Arc<ConnectivityMonitor>,
    ports: Arc<PortWatch>,
    shutdown: CancellationToken,
) {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut usr1, mut usr2) = match (
        signal(SignalKind::user_defined1()),
        signal(SignalKind::user_defined2()),
    ) {
        (Ok(usr1), Ok(usr2)) => (usr1, usr2),
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "Runtime toggles unavailable");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = usr1.recv() => flip_connectivity(&connectivity),
            _ = usr2.recv() => flip_ports(&ports),
        }
    }
}

#[cfg(not(unix))]
async fn toggle_signals(
    _connectivity: Arc<ConnectivityMonitor>,
    _ports: Arc<PortWatch>,
    _shutdown: CancellationToken,
) {
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let errors = config.validate();

    if cli.check_config {
        if errors.is_empty() {
            println!("Configuration OK");
            return Ok(());
        }
        for e in &errors {
            eprintln!("  - {e}");
        }
        bail!("configuration has {} error(s)", errors.len());
    }

    let _log_guard = logging::init(&config.logging)?;

    if !errors.is_empty() {
        for e in &errors {
            error!(field = %e.field, "{}", e.message);
        }
        bail!("configuration has {} error(s)", errors.len());
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Hostwatch daemon starting (hostwatchd)");

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token)?;
    let result = service.run().await;

    match &result {
        Ok(()) => info!("Hostwatch daemon shut down gracefully"),
        Err(e) => error!(error = %e, "Hostwatch daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
