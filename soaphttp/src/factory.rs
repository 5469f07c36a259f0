//! HTTP client factory

use crate::error::{Error, Result};
use crate::http_client::{DEFAULT_MAX_REDIRECTS, SoapHttpClient, TransportHttpClient};
use crate::options::{ClientOptions, TransportSettings};
use crate::transport::{ReqwestTransport, UreqTransport};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Available HTTP client implementations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpClientKind {
    /// Socket-level transport (`ureq`)
    #[default]
    Ureq,
    /// Generic HTTP client (`reqwest`)
    Reqwest,
}

impl HttpClientKind {
    pub const ALL: [HttpClientKind; 2] = [HttpClientKind::Ureq, HttpClientKind::Reqwest];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpClientKind::Ureq => "ureq",
            HttpClientKind::Reqwest => "reqwest",
        }
    }
}

impl fmt::Display for HttpClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpClientKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ureq" => Ok(HttpClientKind::Ureq),
            "reqwest" => Ok(HttpClientKind::Reqwest),
            _ => Err(Error::UnsupportedClient(s.to_string())),
        }
    }
}

/// Builds [`SoapHttpClient`]s by name
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    follow_location_max_redirects: u32,
}

impl Default for HttpClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClientFactory {
    pub fn new() -> Self {
        Self {
            follow_location_max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }

    /// Redirect limit given to the clients built from now on
    pub fn with_max_redirects(mut self, max: u32) -> Self {
        self.follow_location_max_redirects = max;
        self
    }

    /// Returns the client registered under `name` (`"ureq"` or `"reqwest"`)
    pub fn get_http_client(
        &self,
        name: &str,
        options: &ClientOptions,
    ) -> Result<Box<dyn SoapHttpClient>> {
        self.create(name.parse()?, options)
    }

    pub fn create(
        &self,
        kind: HttpClientKind,
        options: &ClientOptions,
    ) -> Result<Box<dyn SoapHttpClient>> {
        let settings = TransportSettings::from_options(options)?;
        debug!(
            client = %kind,
            max_redirects = self.follow_location_max_redirects,
            proxy = ?settings.proxy.as_ref().and_then(|p| p.host_str()),
            "Creating SOAP HTTP client"
        );

        let client: Box<dyn SoapHttpClient> = match kind {
            HttpClientKind::Ureq => Box::new(
                TransportHttpClient::new(
                    UreqTransport::new(&settings)?,
                    UreqTransport::supported_headers(settings.headers),
                )
                    .with_max_redirects(self.follow_location_max_redirects),
            ),
            HttpClientKind::Reqwest => Box::new(
                TransportHttpClient::new(ReqwestTransport::new(&settings)?, settings.headers)
                    .with_max_redirects(self.follow_location_max_redirects),
            ),
        };
        Ok(client)
    }
}
