use thiserror::Error;

/// Errors that can occur in the sync engine
///
/// None of these stop the engine; they describe why a particular step was
/// skipped or degraded.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Receiver address missing or incomplete
    #[error("No valid receiver connection configured")]
    NoValidConnection,

    /// Transport level failure reported by the link
    #[error("Receiver link error: {0}")]
    Link(#[from] onkyo_link::LinkError),

    /// Discovery found nothing and no manual receiver is configured
    #[error("No Onkyo receivers found")]
    DiscoveryEmpty,

    /// Discovery answered with something unusable
    #[error("Discovery returned an unusable payload: {0}")]
    DiscoveryMalformed(String),

    /// A receiver selector or setting could not be understood
    #[error("Configuration error: {0}")]
    Config(String),

    /// The configuration file could not be read
    #[error("Failed to read configuration: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// The configuration file is not valid JSON
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// The engine loop is no longer running
    #[error("Sync engine has stopped")]
    EngineStopped,
}

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
