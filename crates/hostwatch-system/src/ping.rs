//! ICMP reachability probe
//!
//! Runs `ping -c 1 -W <secs> <host>` and folds every failure mode (spawn
//! error, non-zero exit, timeout) into "unreachable".

use std::process::Stdio;
use std::time::Duration;

use hostwatch_core::ports::IReachabilityProbe;
use tokio::process::Command;
use tracing::debug;

/// Slack on top of ping's own deadline before the process is killed
const KILL_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct PingProbe {
    program: String,
    host: String,
    timeout: Duration,
}

impl PingProbe {
    pub fn new(host: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: "ping".to_string(),
            host: host.into(),
            timeout,
        }
    }

    /// Replaces the `ping` executable (e.g. a full path)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

#[async_trait::async_trait]
impl IReachabilityProbe for PingProbe {
    async fn is_reachable(&self) -> bool {
        let wait_secs = self.timeout.as_secs().max(1).to_string();
        let status = Command::new(&self.program)
            .args(["-c", "1", "-W", wait_secs.as_str(), self.host.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        match tokio::time::timeout(self.timeout + KILL_GRACE, status).await {
            Ok(Ok(status)) => {
                debug!(host = %self.host, code = ?status.code(), "Ping finished");
                status.success()
            }
            Ok(Err(e)) => {
                debug!(program = %self.program, error = %e, "Ping could not be spawned");
                false
            }
            Err(_) => {
                debug!(host = %self.host, "Ping timed out");
                false
            }
        }
    }
}
