//! Pluggable HTTP transports
//!
//! A transport sends exactly one request and hands back the raw response,
//! whatever its status. Redirects, header merging and introspection are
//! handled above, by [`crate::http_client::TransportHttpClient`].

mod pem;
mod reqwest_transport;
mod ureq_transport;

pub use reqwest_transport::ReqwestTransport;
pub use ureq_transport::UreqTransport;

use crate::error::Result;
use http::{HeaderMap, Method, StatusCode, Version};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Upper bound on a buffered response body
pub(crate) const MAX_BODY_SIZE: u64 = 64 * 1024 * 1024;

/// A request as handed to a transport
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    /// Overall timeout for this call
    pub timeout: Option<Duration>,
}

/// A response as returned by a transport, body fully read
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }
}

/// Sends one HTTP request without following redirects
pub trait HttpTransport: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn send(&self, request: &TransportRequest) -> Result<TransportResponse>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn send(&self, request: &TransportRequest) -> Result<TransportResponse> {
        (**self).send(request)
    }
}

impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn send(&self, request: &TransportRequest) -> Result<TransportResponse> {
        (**self).send(request)
    }
}
