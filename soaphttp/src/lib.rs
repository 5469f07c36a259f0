//! # soaphttp - HTTP adapter for SOAP clients
//!
//! Lets a SOAP client send its envelopes through a pluggable HTTP
//! transport while keeping a uniform view of what went over the wire.
//!
//! - [`options`]: translation of [`ClientOptions`] (TLS, proxy, timeouts,
//!   credentials, compression) into [`TransportSettings`]
//! - [`transport`]: the [`HttpTransport`] trait with a socket-level backend
//!   ([`UreqTransport`]) and a generic client backend ([`ReqwestTransport`])
//! - [`http_client`]: [`TransportHttpClient`], which follows `307`
//!   redirects only and records the last request/response
//! - [`factory`]: [`HttpClientFactory`], clients by name
//! - [`client`]: [`SoapClient`], the glue with the `soapkernel` filters
//!
//! ## Example
//!
//! ```no_run
//! use soaphttp::{ClientOptions, HttpClientFactory, SoapClient};
//! use soapkernel::SoapVersion;
//!
//! # fn main() -> soaphttp::Result<()> {
//! let options = ClientOptions {
//!     login: Some("api".into()),
//!     password: Some("s3cret".into()),
//!     connection_timeout: Some(10),
//!     ..Default::default()
//! };
//! let http = HttpClientFactory::new().get_http_client("ureq", &options)?;
//!
//! let mut client = SoapClient::new(http, "https://example.org/ws", SoapVersion::Soap11);
//! let response = client.call("urn:Ping", "<soap:Envelope>...</soap:Envelope>")?;
//! println!("{}", response.content_str());
//! println!("{}", client.last_response_headers());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod factory;
pub mod http_client;
pub mod options;
pub mod transport;

#[cfg(feature = "soapconfig")]
pub mod config_ext;

pub use client::SoapClient;
pub use error::{Error, Result};
pub use factory::{HttpClientFactory, HttpClientKind};
pub use http_client::{
    DEFAULT_MAX_REDIRECTS, ExecOptions, RecordedRequest, SoapHttpClient, TransportHttpClient,
};
pub use options::{AuthScheme, ClientOptions, Compression, TransportSettings};
pub use transport::{
    HttpTransport, ReqwestTransport, TransportRequest, TransportResponse, UreqTransport,
};

#[cfg(feature = "soapconfig")]
pub use config_ext::SoapClientConfigExt;
