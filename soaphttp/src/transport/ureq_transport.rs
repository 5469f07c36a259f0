//! Socket-level transport on top of `ureq`

use super::{HttpTransport, MAX_BODY_SIZE, TransportRequest, TransportResponse, pem};
use crate::error::{Error, Result};
use crate::options::TransportSettings;
use http::header::{ACCEPT_ENCODING, HeaderMap, HeaderValue};
use http::Method;
use std::sync::Arc;
use tracing::{debug, warn};
use ureq::tls::{Certificate, ClientCert, PemItem, PrivateKey, RootCerts, TlsConfig};
use ureq::{Agent, RequestBuilder};

/// Content codings ureq decodes by itself
const DECODED_CODINGS: [&str; 3] = ["gzip", "x-gzip", "identity"];

/// Transport speaking HTTP/1.1 directly over ureq's connection pool
///
/// HTTP error statuses are plain responses and the agent never follows
/// redirects by itself.
#[derive(Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl std::fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

impl UreqTransport {
    pub fn new(settings: &TransportSettings) -> Result<Self> {
        settings.ensure_supported()?;

        let mut config = Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(0)
            .max_redirects_will_error(false)
            .timeout_connect(settings.connect_timeout)
            .tls_config(tls_config(settings)?);

        if let Some(proxy) = &settings.proxy {
            config = config.proxy(Some(ureq::Proxy::new(proxy.as_str())?));
        }

        let agent: Agent = config.build().into();
        Ok(Self { agent })
    }

    /// Restricts `Accept-Encoding` to the codings this transport decodes
    ///
    /// ureq only inflates gzip bodies: advertising `deflate` would hand the
    /// raw zlib stream to the caller.
    pub fn supported_headers(mut headers: HeaderMap) -> HeaderMap {
        let Some(value) = headers.get(ACCEPT_ENCODING) else {
            return headers;
        };

        let requested = value.to_str().unwrap_or_default();
        let accepted: Vec<&str> = requested
            .split(',')
            .map(str::trim)
            .filter(|coding| {
                let name = coding.split(';').next().unwrap_or_default().trim();
                DECODED_CODINGS.iter().any(|c| c.eq_ignore_ascii_case(name))
            })
            .collect();

        let restricted = match HeaderValue::from_str(&accepted.join(", ")) {
            Ok(value) if !accepted.is_empty() => value,
            _ => HeaderValue::from_static("identity"),
        };
        if restricted != requested {
            debug!(
                requested,
                sent = ?restricted,
                "ureq: dropping content codings it cannot decode"
            );
        }
        headers.insert(ACCEPT_ENCODING, restricted);
        headers
    }

    fn prepare<B>(
        &self,
        mut builder: RequestBuilder<B>,
        request: &TransportRequest,
    ) -> RequestBuilder<B> {
        let headers = Self::supported_headers(request.headers.clone());
        for (name, value) in &headers {
            builder = builder.header(name, value);
        }
        match request.timeout {
            Some(timeout) => builder.config().timeout_global(Some(timeout)).build(),
            None => builder,
        }
    }
}

impl HttpTransport for UreqTransport {
    fn name(&self) -> &'static str {
        "ureq"
    }

    fn send(&self, request: &TransportRequest) -> Result<TransportResponse> {
        let url = request.url.as_str();
        debug!(method = %request.method, url, "ureq: sending request");

        let mut response = if request.method == Method::POST {
            let body = request.body.as_deref().unwrap_or_default();
            self.prepare(self.agent.post(url), request).send(body)?
        } else if request.method == Method::GET && request.body.is_none() {
            self.prepare(self.agent.get(url), request).call()?
        } else {
            return Err(Error::other(format!(
                "ureq transport does not send {} requests with this body",
                request.method
            )));
        };

        let status = response.status();
        let version = response.version();
        let headers = response.headers().clone();
        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_SIZE)
            .read_to_vec()?;

        debug!(status = status.as_u16(), bytes = body.len(), "ureq: response received");
        Ok(TransportResponse {
            status,
            version,
            headers,
            body,
        })
    }
}

fn tls_config(settings: &TransportSettings) -> Result<TlsConfig> {
    let mut builder = TlsConfig::builder();

    match pem::ca_bundle(&settings.tls)? {
        None => {
            warn!("TLS peer verification is disabled");
            builder = builder.disable_verification(true);
        }
        Some(bundle) => {
            let (certs, _) = parse_pem(&bundle)?;
            if certs.is_empty() {
                return Err(Error::tls("CA bundle holds no certificate"));
            }
            builder = builder.root_certs(RootCerts::Specific(Arc::new(certs)));
        }
    }

    if let Some(identity) = pem::client_identity(&settings.tls)? {
        let (chain, key) = parse_pem(&identity)?;
        let key = key.ok_or_else(|| Error::tls("client certificate has no private key"))?;
        if chain.is_empty() {
            return Err(Error::tls("client certificate file holds no certificate"));
        }
        builder = builder.client_cert(Some(ClientCert::new_with_certs(&chain, key)));
    }

    Ok(builder.build())
}

fn parse_pem(pem: &[u8]) -> Result<(Vec<Certificate<'static>>, Option<PrivateKey<'static>>)> {
    let mut certs = Vec::new();
    let mut key = None;
    for item in ureq::tls::parse_pem(pem) {
        match item? {
            PemItem::Certificate(cert) => certs.push(cert.to_owned()),
            PemItem::PrivateKey(k) => key = Some(k.to_owned()),
            _ => {}
        }
    }
    Ok((certs, key))
}
