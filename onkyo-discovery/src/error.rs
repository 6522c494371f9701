//! Error types for the discovery system.

use std::fmt;

/// Error type for discovery reply handling.
///
/// Discovery itself never fails hard: these errors describe individual
/// replies that could not be turned into a [`crate::Device`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    /// The reply is not an ECN response
    NotEcnReply(String),
    /// The reply is an ECN response with missing or unparseable fields
    ParseError(String),
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryError::NotEcnReply(msg) => write!(f, "Not an ECN reply: {}", msg),
            DiscoveryError::ParseError(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for DiscoveryError {}

/// Convenience Result type alias for discovery operations.
pub type Result<T> = std::result::Result<T, DiscoveryError>;
