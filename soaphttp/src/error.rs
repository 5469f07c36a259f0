//! Error types for the SOAP HTTP adapter

/// Result type alias for adapter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or running an HTTP exchange
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket transport (ureq) failure
    #[error("HTTP request failed: {0}")]
    Ureq(#[from] ureq::Error),

    /// Generic client (reqwest) failure
    #[error("HTTP request failed: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Header name or value rejected
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// IO error (certificate files, ...)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The factory does not know this client name
    #[error("Unsupported http client: \"{0}\"")]
    UnsupportedClient(String),

    /// Auth scheme unknown or not available with the chosen transport
    #[error("Auth method is not supported: {0}")]
    UnsupportedAuthScheme(String),

    /// Proxy options could not be turned into a URL
    #[error("Invalid proxy: {0}")]
    InvalidProxy(String),

    /// Certificate, key or CA material rejected
    #[error("TLS configuration error: {0}")]
    Tls(String),

    /// More consecutive 307 responses than allowed
    #[error("Redirection limit reached ({0}), aborting")]
    TooManyRedirects(u32),

    /// 307 response without a usable Location header
    #[error("HTTP 307 response without Location header")]
    MissingLocation,

    /// SOAP exchange failed at the HTTP level
    #[error("SOAP HTTP exchange failed: {0}")]
    Http(String),

    /// Attachment filtering failed
    #[error(transparent)]
    Kernel(#[from] soapkernel::Error),

    /// Configuration error (from soapconfig/anyhow)
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a TLS configuration error
    pub fn tls(msg: impl Into<String>) -> Self {
        Self::Tls(msg.into())
    }

    /// Create an invalid header error
    pub fn invalid_header(msg: impl Into<String>) -> Self {
        Self::InvalidHeader(msg.into())
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(e: http::header::InvalidHeaderValue) -> Self {
        Self::InvalidHeader(e.to_string())
    }
}

impl From<http::header::InvalidHeaderName> for Error {
    fn from(e: http::header::InvalidHeaderName) -> Self {
        Self::InvalidHeader(e.to_string())
    }
}
