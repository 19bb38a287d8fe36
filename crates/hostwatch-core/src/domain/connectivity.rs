//! Connectivity state machine
//!
//! Two states, UP and DOWN. [`ConnectivityState::observe`] folds one probe
//! result into the state and reports the transition it caused, if any.
//! Steady-state observations never produce a transition.
//!
//! ```text
//!            !reachable
//!      UP ──────────────▶ DOWN   (records downtime start)
//!       ▲                   │
//!       └───────────────────┘
//!             reachable          (reports outage duration)
//! ```

use std::time::{Duration, Instant};

/// A state change observed by [`ConnectivityState::observe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityTransition {
    /// UP → DOWN
    WentDown,
    /// DOWN → UP, carrying the outage length rounded to whole seconds
    Recovered {
        /// Time between the UP→DOWN and DOWN→UP observations
        outage: Duration,
    },
}

/// Upstream reachability as last observed
///
/// `downtime_start` is only meaningful while `down` is true. It is set on the
/// UP→DOWN transition and consumed on DOWN→UP.
#[derive(Debug, Clone, Default)]
pub struct ConnectivityState {
    down: bool,
    downtime_start: Option<Instant>,
}

impl ConnectivityState {
    /// Starts in the UP state
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the last transition was UP → DOWN
    pub fn is_down(&self) -> bool {
        self.down
    }

    /// When the current outage began, if one is in progress
    pub fn downtime_start(&self) -> Option<Instant> {
        if self.down {
            self.downtime_start
        } else {
            None
        }
    }

    /// Folds a probe result observed at `now` into the state
    pub fn observe(&mut self, reachable: bool, now: Instant) -> Option<ConnectivityTransition> {
        match (reachable, self.down) {
            (true, true) => {
                let started = self.downtime_start.take().unwrap_or(now);
                self.down = false;
                Some(ConnectivityTransition::Recovered {
                    outage: round_to_seconds(now.saturating_duration_since(started)),
                })
            }
            (false, false) => {
                self.down = true;
                self.downtime_start = Some(now);
                Some(ConnectivityTransition::WentDown)
            }
            _ => None,
        }
    }

    /// Forces the UP state without reporting a transition
    ///
    /// Returns `true` if an outage was in progress.
    pub fn reset(&mut self) -> bool {
        let was_down = self.down;
        self.down = false;
        self.downtime_start = None;
        was_down
    }
}

/// Rounds to the nearest whole second; exactly half a second rounds up
pub fn round_to_seconds(d: Duration) -> Duration {
    let millis = d.as_millis();
    let secs = (millis + 500) / 1000;
    Duration::from_secs(secs as u64)
}

/// Renders a duration as `45s`, `1m35s` or `2h0m5s`
pub fn format_outage(d: Duration) -> String {
    let total = round_to_seconds(d).as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}
