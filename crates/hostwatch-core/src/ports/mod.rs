//! Port definitions (hexagonal architecture interfaces)
//!
//! These traits are the boundaries between the monitoring core and the
//! outside world. The core depends only on the traits; implementations live
//! in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IMessenger`] - Chat delivery of text messages and file attachments
//! - [`IReachabilityProbe`] - "Is the upstream network reachable right now?"
//! - [`IPortScanner`] - Batched listening-port query
//! - [`IFileCategorizer`] - Inbox organization sweep
//! - [`IHostReporter`] / [`ISpeedProbe`] - Inputs for the status broadcast

pub mod filesystem;
pub mod host;
pub mod messenger;
pub mod network;

pub use filesystem::IFileCategorizer;
pub use host::{ConnectionQuality, IHostReporter, ISpeedProbe, SpeedSample};
pub use messenger::IMessenger;
pub use network::{IPortScanner, IReachabilityProbe};
