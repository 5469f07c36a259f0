//! Error types for SOAP message processing

/// Result type alias for kernel operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while filtering SOAP messages
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A multipart content type without `boundary` parameter
    #[error("Missing boundary parameter in content type: {0}")]
    MissingBoundary(String),

    /// The multipart body could not be split into parts
    #[error("Malformed multipart body: {0}")]
    MalformedMultipart(String),

    /// No part matches the `start` parameter
    #[error("Root part {0} not found in multipart body")]
    MissingRootPart(String),

    /// Base64 transfer encoding could not be decoded
    #[error("Invalid base64 part content: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// A filter refused the message
    #[error("Filter error: {0}")]
    Filter(String),
}

impl Error {
    /// Create a malformed multipart error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedMultipart(msg.into())
    }

    /// Create a filter error
    pub fn filter(msg: impl Into<String>) -> Self {
        Self::Filter(msg.into())
    }
}
