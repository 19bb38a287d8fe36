//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! such as malformed identifiers supplied through configuration.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A chat identifier could not be parsed
    #[error("Invalid chat id: {0}")]
    InvalidChatId(String),
}
