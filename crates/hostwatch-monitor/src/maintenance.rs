//! Periodic Maintenance
//!
//! Once per long interval: run a categorization sweep, then compose a status
//! broadcast (host summary plus a bandwidth measurement) and route it through
//! the send gate. A failed or slow speed test degrades to a placeholder line.

use std::sync::Arc;
use std::time::Duration;

use hostwatch_core::domain::{escape_markdown, ChatId, OutboundMessage};
use hostwatch_core::ports::{IFileCategorizer, IHostReporter, ISpeedProbe, SpeedSample};
use tracing::{info, warn};

use crate::connectivity::ConnectivityMonitor;
use crate::queue::SendGate;

/// Shown instead of the speed line when no measurement is available
pub const SPEED_PLACEHOLDER: &str = "Speed test unavailable.";

/// Builds the broadcast text
///
/// `moved` is only mentioned when the sweep actually moved something.
pub fn compose_report(
    timestamp: &str,
    summary: &str,
    moved: Option<usize>,
    speed: Option<&SpeedSample>,
) -> String {
    let mut report = format!("📊 *Status report* ({timestamp})\n\n{summary}\n");

    if let Some(moved) = moved.filter(|&n| n > 0) {
        report.push_str(&format!("\n🗂 Organized {moved} new file(s).\n"));
    }

    match speed {
        Some(sample) => {
            report.push_str(&format!("\n🌐 *Connection:* {sample}\nQuality: {}", sample.quality()));
            if let Some(server) = &sample.server {
                report.push_str(&format!("\nServer: {}", escape_markdown(server)));
            }
        }
        None => {
            report.push('\n');
            report.push_str(SPEED_PLACEHOLDER);
        }
    }

    report
}

pub struct Maintenance {
    categorizer: Arc<dyn IFileCategorizer>,
    reporter: Arc<dyn IHostReporter>,
    /// `None` when speed tests are disabled
    speed: Option<Arc<dyn ISpeedProbe>>,
    speed_timeout: Duration,
    gate: Arc<SendGate>,
    link: Arc<ConnectivityMonitor>,
    admin: ChatId,
}

impl Maintenance {
    pub fn new(
        categorizer: Arc<dyn IFileCategorizer>,
        reporter: Arc<dyn IHostReporter>,
        speed: Option<Arc<dyn ISpeedProbe>>,
        speed_timeout: Duration,
        gate: Arc<SendGate>,
        link: Arc<ConnectivityMonitor>,
        admin: ChatId,
    ) -> Self {
        Self {
            categorizer,
            reporter,
            speed,
            speed_timeout,
            gate,
            link,
            admin,
        }
    }

    async fn measure_speed(&self) -> Option<SpeedSample> {
        let probe = self.speed.as_ref()?;
        match tokio::time::timeout(self.speed_timeout, probe.measure()).await {
            Ok(Ok(sample)) => Some(sample),
            Ok(Err(e)) => {
                warn!(error = %e, "Speed test failed");
                None
            }
            Err(_) => {
                warn!(timeout_secs = self.speed_timeout.as_secs(), "Speed test timed out");
                None
            }
        }
    }

    /// One maintenance tick; returns the broadcast text that was handed to the gate
    pub async fn run_once(&self) -> String {
        info!("Periodic maintenance starting");

        let moved = match self.categorizer.categorize_inbox().await {
            Ok(moved) => {
                info!(moved, "Maintenance sweep complete");
                Some(moved)
            }
            Err(e) => {
                warn!(error = %e, "Maintenance sweep failed");
                None
            }
        };

        let summary = self.reporter.summary().await;
        let speed = self.measure_speed().await;
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M").to_string();
        let report = compose_report(&timestamp, &summary, moved, speed.as_ref());

        self.gate
            .send_or_queue(
                OutboundMessage::markdown(self.admin, report.clone()),
                self.link.is_down(),
            )
            .await;

        report
    }
}
