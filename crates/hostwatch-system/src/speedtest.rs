//! Bandwidth probe over the Ookla `speedtest` CLI
//!
//! Runs `speedtest --format json --accept-license --accept-gdpr` and converts
//! the reported bandwidth (bytes per second) into Mbps.

use std::process::Stdio;

use anyhow::Context;
use hostwatch_core::ports::{ISpeedProbe, SpeedSample};
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::SystemError;

#[derive(Debug, Deserialize)]
struct Latency {
    latency: f64,
}

#[derive(Debug, Deserialize)]
struct Bandwidth {
    /// Bytes per second
    bandwidth: u64,
}

#[derive(Debug, Default, Deserialize)]
struct Server {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpeedtestReport {
    ping: Latency,
    download: Bandwidth,
    upload: Bandwidth,
    #[serde(default)]
    server: Server,
}

fn bytes_per_sec_to_mbps(bandwidth: u64) -> f64 {
    bandwidth as f64 * 8.0 / 1_000_000.0
}

/// Parses the CLI's JSON result
pub fn parse_report(json: &str) -> Result<SpeedSample, SystemError> {
    let report: SpeedtestReport =
        serde_json::from_str(json).map_err(|e| SystemError::Parse(e.to_string()))?;

    let server = match (report.server.name, report.server.country) {
        (Some(name), Some(country)) => Some(format!("{name} ({country})")),
        (Some(name), None) => Some(name),
        _ => None,
    };

    Ok(SpeedSample {
        download_mbps: bytes_per_sec_to_mbps(report.download.bandwidth),
        upload_mbps: bytes_per_sec_to_mbps(report.upload.bandwidth),
        ping_ms: report.ping.latency,
        server,
    })
}

/// [`ISpeedProbe`] that shells out to `speedtest`
///
/// The caller bounds the run time; the child is killed when the future is
/// dropped.
#[derive(Debug, Clone)]
pub struct SpeedtestCli {
    program: String,
}

impl Default for SpeedtestCli {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeedtestCli {
    pub fn new() -> Self {
        Self {
            program: "speedtest".to_string(),
        }
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self) -> Result<SpeedSample, SystemError> {
        debug!(program = %self.program, "Running speed test");
        let output = Command::new(&self.program)
            .args(["--format", "json", "--accept-license", "--accept-gdpr"])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SystemError::Command {
                command: self.program.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(SystemError::Command {
                command: self.program.clone(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_report(&String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait::async_trait]
impl ISpeedProbe for SpeedtestCli {
    async fn measure(&self) -> anyhow::Result<SpeedSample> {
        let sample = self.run().await.context("Speed test failed")?;
        info!(
            download_mbps = sample.download_mbps,
            upload_mbps = sample.upload_mbps,
            ping_ms = sample.ping_ms,
            "Speed test complete"
        );
        Ok(sample)
    }
}
