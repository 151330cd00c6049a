use thiserror::Error;

/// Transport-level bridge failures. These end a session; per-request
/// problems are answered with an error response instead.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Bridge I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode bridge message: {0}")]
    Encode(#[from] serde_json::Error),

    /// A response over the limit is answered with an `InternalError` instead.
    #[error("Outbound frame too large: {size} bytes (max: {max_size})")]
    FrameTooLarge { size: usize, max_size: usize },
}

pub type Result<T> = std::result::Result<T, BridgeError>;
