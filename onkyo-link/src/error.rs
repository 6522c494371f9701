//! Error types for the receiver link

use thiserror::Error;

/// Errors that can occur while talking to a receiver
#[derive(Debug, Error)]
pub enum LinkError {
    /// No session is open
    #[error("Not connected to receiver")]
    NotConnected,

    /// The zone or action has no ISCP equivalent
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// The value is not accepted for this action
    #[error("Invalid value '{value}' for {action}")]
    InvalidValue { action: String, value: String },

    /// Packet framing error
    #[error("Frame error: {0}")]
    Frame(String),

    /// Socket level failure
    #[error("Network error: {0}")]
    Io(#[from] std::io::Error),

    /// Connecting took longer than the connect timeout
    #[error("Connection to {0} timed out")]
    Timeout(String),

    /// The session task has gone away
    #[error("Session closed")]
    Closed,

    /// The link was created outside a tokio runtime
    #[error("No tokio runtime available: {0}")]
    Runtime(String),
}

/// Result type for link operations
pub type Result<T> = std::result::Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_error_display() {
        let error = LinkError::InvalidValue {
            action: "volume".to_string(),
            value: "loud".to_string(),
        };
        assert_eq!(error.to_string(), "Invalid value 'loud' for volume");

        let error = LinkError::UnknownCommand("dock.power".to_string());
        assert_eq!(error.to_string(), "Unknown command: dock.power");

        assert_eq!(LinkError::NotConnected.to_string(), "Not connected to receiver");
    }
}
