//! Error types for PravahaIO

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// PravahaIO error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Sync marker not found within the scan budget during open
    #[error("Sync marker not found within {scanned} byte reads")]
    SyncTimeout {
        /// Read attempts consumed before giving up
        scanned: usize,
    },

    /// Byte source reported closure or disconnection
    #[error("Byte source disconnected")]
    Disconnected,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Configuration file parse error
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration file encode error
    #[error("Config encode error: {0}")]
    ConfigEncode(#[from] toml::ser::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
