//! Hostwatch Core - Domain types, collaborator ports and configuration
//!
//! This crate contains the pieces shared by every other Hostwatch crate:
//! - **Domain types** - `ConnectivityState`, `PortWatchEntry`, `ProcessIdentity`,
//!   `OutboundMessage`, `ChatId`
//! - **Port definitions** - Traits for the external collaborators the monitor
//!   drives: `IReachabilityProbe`, `IPortScanner`, `IMessenger`,
//!   `IFileCategorizer`, `IHostReporter`, `ISpeedProbe`
//! - **Configuration** - The YAML-backed `Config` with validation and a builder
//!
//! # Architecture
//!
//! The domain module is pure: state machines take the current time as an
//! argument and return the transition they observed, leaving delivery and
//! scheduling to `hostwatch-monitor`. Adapters in `hostwatch-system` and
//! `hostwatch-telegram` implement the port traits.

pub mod config;
pub mod domain;
pub mod ports;
