//! Network inspection ports
//!
//! Both checks block their caller for a bounded time (sub-second to a few
//! seconds) and are invoked from timer loops.

use std::collections::{BTreeSet, HashMap};

use crate::domain::ProcessIdentity;

/// Answers whether the host's upstream network is reachable
#[async_trait::async_trait]
pub trait IReachabilityProbe: Send + Sync {
    /// Returns `true` if the upstream network responded
    ///
    /// Never fails: timeouts, unreachable hosts and spawn errors all fold
    /// into `false`.
    async fn is_reachable(&self) -> bool;
}

/// Answers which of a set of ports are in the listening state
#[async_trait::async_trait]
pub trait IPortScanner: Send + Sync {
    /// Performs one batched query for all `ports`
    ///
    /// Returns a map from each listening port to the process that owns it.
    /// Ports that are not listening are absent from the map.
    ///
    /// # Errors
    /// Returns an error when the OS socket table cannot be read
    /// (permissions, missing procfs).
    async fn scan(&self, ports: &BTreeSet<u16>) -> anyhow::Result<HashMap<u16, ProcessIdentity>>;
}
