//! Domain entities and state machines
//!
//! This module contains the core domain types for Hostwatch:
//! - Newtypes for chat identifiers
//! - The UP/DOWN connectivity state machine
//! - Per-port watch entries with edge-triggered change detection
//! - Outbound administrator messages
//! - Domain-specific error types

pub mod connectivity;
pub mod errors;
pub mod message;
pub mod newtypes;
pub mod port;

// Re-export commonly used types
pub use connectivity::{format_outage, round_to_seconds, ConnectivityState, ConnectivityTransition};
pub use errors::DomainError;
pub use message::{code_span, escape_markdown, OutboundMessage, ParseMode};
pub use newtypes::ChatId;
pub use port::{MonitoredPort, PortChange, PortWatchEntry, ProcessIdentity};
