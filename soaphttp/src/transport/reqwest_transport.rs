//! Generic HTTP client transport on top of `reqwest::blocking`

use super::{HttpTransport, MAX_BODY_SIZE, TransportRequest, TransportResponse, pem};
use crate::error::{Error, Result};
use crate::options::TransportSettings;
use reqwest::blocking::Client;
use reqwest::{Certificate, Identity, Proxy, redirect};
use std::io::Read;
use std::time::Duration;
use tracing::{debug, warn};

/// Transport delegating to a `reqwest` blocking client
///
/// Must not be used from inside an async runtime: the blocking client
/// drives its own.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(settings: &TransportSettings) -> Result<Self> {
        settings.ensure_supported()?;

        let mut builder = Client::builder()
            .redirect(redirect::Policy::none())
            .http1_only()
            .gzip(settings.decode_content)
            .deflate(settings.decode_content)
            .timeout(None::<Duration>);

        if let Some(timeout) = settings.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(keepalive) = settings.tcp_keepalive {
            builder = builder
                .tcp_keepalive(keepalive.idle)
                .tcp_keepalive_interval(keepalive.interval);
        }
        if let Some(proxy) = &settings.proxy {
            builder = builder.proxy(Proxy::all(proxy.as_str())?);
        }

        match pem::ca_bundle(&settings.tls)? {
            None => {
                warn!("TLS peer verification is disabled");
                builder = builder.danger_accept_invalid_certs(true);
            }
            Some(bundle) => {
                let certs = Certificate::from_pem_bundle(&bundle)?;
                if certs.is_empty() {
                    return Err(Error::tls("CA bundle holds no certificate"));
                }
                builder = builder.tls_built_in_root_certs(false);
                for cert in certs {
                    builder = builder.add_root_certificate(cert);
                }
            }
        }

        if let Some(identity) = pem::client_identity(&settings.tls)? {
            builder = builder.identity(Identity::from_pem(&identity)?);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

impl HttpTransport for ReqwestTransport {
    fn name(&self) -> &'static str {
        "reqwest"
    }

    fn send(&self, request: &TransportRequest) -> Result<TransportResponse> {
        debug!(method = %request.method, url = %request.url, "reqwest: sending request");

        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send()?;
        let status = response.status();
        let version = response.version();
        let headers = response.headers().clone();

        if response
            .content_length()
            .is_some_and(|len| len > MAX_BODY_SIZE)
        {
            return Err(Error::other(format!(
                "response body exceeds {} bytes",
                MAX_BODY_SIZE
            )));
        }
        let body = read_limited(response, MAX_BODY_SIZE)?;

        debug!(status = status.as_u16(), bytes = body.len(), "reqwest: response received");
        Ok(TransportResponse {
            status,
            version,
            headers,
            body,
        })
    }
}

/// Reads at most `limit` bytes, chunked bodies included
fn read_limited(reader: impl Read, limit: u64) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    reader.take(limit + 1).read_to_end(&mut body)?;
    if body.len() as u64 > limit {
        return Err(Error::other(format!("response body exceeds {} bytes", limit)));
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{ClientOptions, TcpKeepalive};

    #[test]
    fn test_read_limited() {
        assert_eq!(read_limited(&b"<ok/>"[..], 5).unwrap(), b"<ok/>");
        assert!(read_limited(&b"<ok/>!"[..], 5).is_err());
    }

    #[test]
    fn test_builds_with_keepalive() {
        let mut settings = TransportSettings::from_options(&ClientOptions::default()).unwrap();
        settings.tcp_keepalive = Some(TcpKeepalive {
            idle: Duration::from_secs(30),
            interval: Duration::from_secs(5),
        });
        assert!(ReqwestTransport::new(&settings).is_ok());

        settings.tcp_keepalive = None;
        assert!(ReqwestTransport::new(&settings).is_ok());
    }
}
