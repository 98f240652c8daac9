use thiserror::Error;

/// Result type for light operations
pub type Result<T> = std::result::Result<T, LightError>;

/// Errors that can occur when talking to or running a light device
#[derive(Error, Debug)]
pub enum LightError {
    /// WebSocket connection error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connection was closed unexpectedly
    #[error("Connection closed")]
    ConnectionClosed,

    /// Operation timed out
    #[error("Timed out: {0}")]
    Timeout(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Device address could not be understood
    #[error("Invalid device address: {0}")]
    InvalidAddress(String),

    /// Settings or command line values are inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal channel closed or overflowed
    #[error("Channel error: {0}")]
    ChannelError(String),
}
