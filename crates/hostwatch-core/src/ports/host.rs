//! Host status ports
//!
//! Inputs for the periodic status broadcast: a resource summary and a
//! bandwidth measurement.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Result of one bandwidth measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedSample {
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub ping_ms: f64,
    /// Name of the test server, when reported
    pub server: Option<String>,
}

/// Coarse grade derived from download speed and latency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl SpeedSample {
    pub fn quality(&self) -> ConnectionQuality {
        let (down, ping) = (self.download_mbps, self.ping_ms);
        if down >= 50.0 && ping <= 30.0 {
            ConnectionQuality::Excellent
        } else if down >= 25.0 && ping <= 50.0 {
            ConnectionQuality::Good
        } else if down >= 10.0 && ping <= 100.0 {
            ConnectionQuality::Fair
        } else {
            ConnectionQuality::Poor
        }
    }
}

impl Display for ConnectionQuality {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionQuality::Excellent => "🟢 Excellent",
            ConnectionQuality::Good => "🟡 Good",
            ConnectionQuality::Fair => "🟠 Fair",
            ConnectionQuality::Poor => "🔴 Poor",
        };
        write!(f, "{s}")
    }
}

impl Display for SpeedSample {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.1}↓ / {:.1}↑ Mbps ({:.1}ms ping)",
            self.download_mbps, self.upload_mbps, self.ping_ms
        )
    }
}

/// Produces a human-readable host resource summary
#[async_trait::async_trait]
pub trait IHostReporter: Send + Sync {
    /// Summary text (CPU, memory, disk, file counts)
    ///
    /// Individual metrics that cannot be read are omitted or shown as
    /// unavailable; the call itself never fails.
    async fn summary(&self) -> String;
}

/// Measures upstream bandwidth
#[async_trait::async_trait]
pub trait ISpeedProbe: Send + Sync {
    /// Runs one measurement
    ///
    /// # Errors
    /// Returns an error if the measurement tool fails, times out, or
    /// produces unreadable output.
    async fn measure(&self) -> anyhow::Result<SpeedSample>;
}
