//! Error handling for examwatch

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Capture device error
    #[error("Capture error: {0}")]
    Capture(String),

    /// Pose/behavior analysis error
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Image encode/decode error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bounded lock wait expired
    #[error("Lock timeout: {0}")]
    LockTimeout(String),

    /// Invalid lifecycle transition
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    /// Config error
    #[error("Config error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
