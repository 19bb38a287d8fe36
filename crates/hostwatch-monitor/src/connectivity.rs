//! Connectivity Monitor
//!
//! Drives [`ConnectivityState`] from periodic reachability probes and turns
//! each transition into exactly one administrator notification. A recovery
//! also replays the notification queue, after the recovery message itself.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hostwatch_core::domain::{
    format_outage, ChatId, ConnectivityState, ConnectivityTransition, OutboundMessage,
};
use hostwatch_core::ports::IReachabilityProbe;
use tracing::{debug, info, warn};

use crate::queue::SendGate;

#[derive(Debug)]
struct MonitorInner {
    enabled: bool,
    state: ConnectivityState,
}

/// Owns the UP/DOWN state and the runtime enable toggle
pub struct ConnectivityMonitor {
    probe: Arc<dyn IReachabilityProbe>,
    gate: Arc<SendGate>,
    admin: ChatId,
    inner: Mutex<MonitorInner>,
}

impl ConnectivityMonitor {
    pub fn new(
        probe: Arc<dyn IReachabilityProbe>,
        gate: Arc<SendGate>,
        admin: ChatId,
        enabled: bool,
    ) -> Self {
        Self {
            probe,
            gate,
            admin,
            inner: Mutex::new(MonitorInner {
                enabled,
                state: ConnectivityState::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MonitorInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The flag other loops consult before sending
    pub fn is_down(&self) -> bool {
        self.lock().state.is_down()
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    /// Turns the monitor on or off
    ///
    /// Turning it off clears an outage in progress without announcing a
    /// recovery, so no stale DOWN flag keeps messages queued.
    pub fn set_enabled(&self, enabled: bool) {
        let mut inner = self.lock();
        inner.enabled = enabled;
        if !enabled && inner.state.reset() {
            info!("Connectivity monitor disabled during outage, down flag cleared");
        }
        info!(enabled, "Connectivity monitor toggled");
    }

    /// Runs one probe and reports the transition it caused, if any
    ///
    /// The probe runs outside the lock. A disabled monitor does nothing.
    pub async fn probe_once(&self) -> Option<ConnectivityTransition> {
        if !self.is_enabled() {
            return None;
        }

        let reachable = self.probe.is_reachable().await;
        let now = tokio::time::Instant::now().into_std();

        let transition = {
            let mut inner = self.lock();
            // toggled off while the probe was running
            if !inner.enabled {
                return None;
            }
            inner.state.observe(reachable, now)
        };

        match transition {
            Some(ConnectivityTransition::WentDown) => {
                warn!("Upstream network unreachable");
                // pre-transition status: the announcement itself tries to go out
                self.gate
                    .send_or_queue(
                        OutboundMessage::markdown(self.admin, "⚠️ *Internet connection lost.*"),
                        false,
                    )
                    .await;
            }
            Some(ConnectivityTransition::Recovered { outage }) => {
                let rendered = format_outage(outage);
                info!(outage = %rendered, "Upstream network restored");
                let text = format!(
                    "✅ *Internet connection restored!*\n\n🕒 Total outage: *{rendered}*"
                );
                self.gate
                    .send_or_queue(OutboundMessage::markdown(self.admin, text), false)
                    .await;
                self.gate.flush().await;
            }
            None => debug!(reachable, "Connectivity unchanged"),
        }

        transition
    }
}
