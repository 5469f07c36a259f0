//! HTTP client adapter used by the SOAP client
//!
//! [`TransportHttpClient`] drives any [`HttpTransport`]: it merges default
//! and per-call headers, applies the SOAP redirect policy and keeps the
//! last request/response for introspection through [`SoapHttpClient`].
//!
//! Only `307 Temporary Redirect` is followed. It is the one redirect status
//! that guarantees the method and body are replayed unchanged, which a SOAP
//! POST needs; every other 3xx response is handed back to the caller.

use crate::error::{Error, Result};
use crate::transport::{HttpTransport, TransportRequest, TransportResponse};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HOST, LOCATION};
use http::{HeaderMap, HeaderValue, Method, StatusCode, Version};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Default bound on consecutive 307 redirects
pub const DEFAULT_MAX_REDIRECTS: u32 = 10;

/// Per-call options
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Overall timeout of each HTTP request
    pub timeout: Option<Duration>,
}

/// Introspectable HTTP client, as seen by the SOAP client
pub trait SoapHttpClient: Send {
    /// Sends `body` to `location` (POST with a body, GET without)
    ///
    /// HTTP error statuses are not errors: the response is available
    /// through the accessors. `Err` means no usable response (transport
    /// failure, redirect limit, ...), and [`error_message`] describes it.
    ///
    /// [`error_message`]: SoapHttpClient::error_message
    fn exec(
        &mut self,
        location: &str,
        body: Option<&[u8]>,
        headers: &HeaderMap,
        options: &ExecOptions,
    ) -> Result<()>;

    /// Error of the last exec, `""` when it succeeded
    fn error_message(&self) -> String;

    /// Request line and headers of the last request actually sent
    fn request_headers(&self) -> String;

    /// Response headers text followed by the body
    fn response(&self) -> Vec<u8>;

    /// Status line and headers of the last response
    fn response_headers(&self) -> String;

    fn response_status_code(&self) -> Option<u16>;

    /// Standard reason phrase of the last response status
    ///
    /// Transports do not expose the phrase the server actually sent: the
    /// canonical one for the status code is returned, and `""` for codes
    /// without one (599, ...). The status line of [`response_headers`]
    /// uses the same phrase.
    ///
    /// [`response_headers`]: SoapHttpClient::response_headers
    fn response_status_message(&self) -> String;

    fn response_content_type(&self) -> String;

    fn response_body(&self) -> &[u8];
}

/// The last request sent, as recorded for introspection
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: Url,
    pub version: Version,
    pub headers: HeaderMap,
}

impl RecordedRequest {
    fn from_transport(request: &TransportRequest) -> Self {
        let mut headers = HeaderMap::with_capacity(request.headers.len() + 2);
        if !request.headers.contains_key(HOST) {
            if let Some(host) = host_header(&request.url) {
                headers.insert(HOST, host);
            }
        }
        for (name, value) in &request.headers {
            headers.append(name.clone(), value.clone());
        }
        if let Some(body) = &request.body {
            if !headers.contains_key(CONTENT_LENGTH) {
                headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
            }
        }

        Self {
            method: request.method.clone(),
            url: request.url.clone(),
            version: Version::HTTP_11,
            headers,
        }
    }

    /// Origin-form target: path plus query
    pub fn target(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }

    pub fn to_header_text(&self) -> String {
        let mut text = format!(
            "{} {} HTTP/{}\r\n",
            self.method,
            self.target(),
            version_str(self.version)
        );
        push_header_lines(&mut text, &self.headers);
        text
    }
}

/// [`SoapHttpClient`] implementation over a pluggable transport
pub struct TransportHttpClient<T> {
    transport: T,
    default_headers: HeaderMap,
    follow_location_max_redirects: u32,
    request: Option<RecordedRequest>,
    response: Option<TransportResponse>,
    error: Option<String>,
}

impl<T: HttpTransport> TransportHttpClient<T> {
    pub fn new(transport: T, default_headers: HeaderMap) -> Self {
        Self {
            transport,
            default_headers,
            follow_location_max_redirects: DEFAULT_MAX_REDIRECTS,
            request: None,
            response: None,
            error: None,
        }
    }

    /// Sets the bound on consecutive 307 redirects
    pub fn with_max_redirects(mut self, max: u32) -> Self {
        self.follow_location_max_redirects = max;
        self
    }

    pub fn max_redirects(&self) -> u32 {
        self.follow_location_max_redirects
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn last_request(&self) -> Option<&RecordedRequest> {
        self.request.as_ref()
    }

    pub fn last_response(&self) -> Option<&TransportResponse> {
        self.response.as_ref()
    }

    fn merge_headers(&self, headers: &HeaderMap) -> HeaderMap {
        let mut merged = self.default_headers.clone();
        for name in headers.keys() {
            merged.remove(name);
        }
        for (name, value) in headers {
            merged.append(name.clone(), value.clone());
        }
        merged
    }

    fn run(
        &mut self,
        location: &str,
        body: Option<&[u8]>,
        headers: &HeaderMap,
        options: &ExecOptions,
    ) -> Result<()> {
        let method = if body.is_some() {
            Method::POST
        } else {
            Method::GET
        };
        let mut request = TransportRequest {
            method,
            url: Url::parse(location)?,
            headers: self.merge_headers(headers),
            body: body.map(<[u8]>::to_vec),
            timeout: options.timeout,
        };

        let mut redirects = 0;
        loop {
            self.request = Some(RecordedRequest::from_transport(&request));
            debug!(
                transport = self.transport.name(),
                method = %request.method,
                url = %request.url,
                "Sending SOAP HTTP request"
            );

            self.response = None;
            let response = self.transport.send(&request)?;
            let status = response.status;
            let next = response
                .headers
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            self.response = Some(response);

            if status != StatusCode::TEMPORARY_REDIRECT {
                debug!(status = status.as_u16(), "SOAP HTTP response received");
                return Ok(());
            }

            if redirects >= self.follow_location_max_redirects {
                warn!(
                    limit = self.follow_location_max_redirects,
                    url = %request.url,
                    "Redirection limit reached, aborting"
                );
                return Err(Error::TooManyRedirects(self.follow_location_max_redirects));
            }

            let next = next.ok_or(Error::MissingLocation)?;
            request.url = request.url.join(&next)?;
            redirects += 1;
            info!(redirect = redirects, location = %request.url, "Following HTTP 307 redirect");
        }
    }
}

impl<T: HttpTransport> SoapHttpClient for TransportHttpClient<T> {
    fn exec(
        &mut self,
        location: &str,
        body: Option<&[u8]>,
        headers: &HeaderMap,
        options: &ExecOptions,
    ) -> Result<()> {
        self.request = None;
        self.response = None;
        self.error = None;

        match self.run(location, body, headers, options) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(location, error = %e, "SOAP HTTP request failed");
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn error_message(&self) -> String {
        self.error.clone().unwrap_or_default()
    }

    fn request_headers(&self) -> String {
        self.request
            .as_ref()
            .map(RecordedRequest::to_header_text)
            .unwrap_or_default()
    }

    fn response(&self) -> Vec<u8> {
        match &self.response {
            Some(response) => {
                let mut raw = self.response_headers().into_bytes();
                raw.extend_from_slice(&response.body);
                raw
            }
            None => Vec::new(),
        }
    }

    fn response_headers(&self) -> String {
        let Some(response) = &self.response else {
            return String::new();
        };

        let mut text = format!(
            "HTTP/{} {} {}\r\n",
            version_str(response.version),
            response.status.as_str(),
            response.status.canonical_reason().unwrap_or("")
        );
        push_header_lines(&mut text, &response.headers);
        text
    }

    fn response_status_code(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status.as_u16())
    }

    fn response_status_message(&self) -> String {
        self.response
            .as_ref()
            .and_then(|r| r.status.canonical_reason())
            .unwrap_or("")
            .to_string()
    }

    fn response_content_type(&self) -> String {
        self.response
            .as_ref()
            .map(|r| header_text(&r.headers, CONTENT_TYPE.as_str()))
            .unwrap_or_default()
    }

    fn response_body(&self) -> &[u8] {
        self.response
            .as_ref()
            .map(|r| r.body.as_slice())
            .unwrap_or_default()
    }
}

fn host_header(url: &Url) -> Option<HeaderValue> {
    let host = url.host_str()?;
    let value = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    HeaderValue::from_str(&value).ok()
}

fn version_str(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}

/// All values of a header joined with `", "`
fn header_text(headers: &HeaderMap, name: &str) -> String {
    headers
        .get_all(name)
        .iter()
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .collect::<Vec<_>>()
        .join(", ")
}

fn push_header_lines(text: &mut String, headers: &HeaderMap) {
    for name in headers.keys() {
        text.push_str(&canonical_name(name.as_str()));
        text.push_str(": ");
        text.push_str(&header_text(headers, name.as_str()));
        text.push_str("\r\n");
    }
    text.push_str("\r\n");
}

/// `content-type` -> `Content-Type`; `http` stores names lower-cased
fn canonical_name(name: &str) -> String {
    if name == "soapaction" {
        return "SOAPAction".to_string();
    }
    name.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{ACCEPT, USER_AGENT};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Transport rejouant des réponses préparées
    #[derive(Default)]
    struct ScriptedTransport {
        replies: Mutex<VecDeque<Result<TransportResponse>>>,
        sent: Mutex<Vec<TransportRequest>>,
    }

    impl ScriptedTransport {
        fn reply(self, status: u16, headers: &[(&str, &str)], body: &str) -> Self {
            let mut response = TransportResponse::new(StatusCode::from_u16(status).unwrap());
            for (name, value) in headers {
                response.headers.append(
                    http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                    HeaderValue::from_str(value).unwrap(),
                );
            }
            response.body = body.as_bytes().to_vec();
            self.replies.lock().unwrap().push_back(Ok(response));
            self
        }

        fn fail(self, message: &str) -> Self {
            self.replies
                .lock()
                .unwrap()
                .push_back(Err(Error::other(message)));
            self
        }

        fn redirect(self, location: &str) -> Self {
            self.reply(307, &[("location", location)], "")
        }
    }

    impl HttpTransport for ScriptedTransport {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn send(&self, request: &TransportRequest) -> Result<TransportResponse> {
            self.sent.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::other("no scripted reply left")))
        }
    }

    type Scripted = Arc<ScriptedTransport>;

    fn client(transport: ScriptedTransport) -> (TransportHttpClient<Scripted>, Scripted) {
        let transport = Arc::new(transport);
        let mut defaults = HeaderMap::new();
        defaults.insert(USER_AGENT, HeaderValue::from_static("test-agent"));
        defaults.insert(ACCEPT, HeaderValue::from_static("*/*"));
        (TransportHttpClient::new(transport.clone(), defaults), transport)
    }

    fn post(http: &mut impl SoapHttpClient, url: &str) -> Result<()> {
        http.exec(url, Some(b"x".as_slice()), &HeaderMap::new(), &ExecOptions::default())
    }

    fn soap_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/xml; charset=utf-8"));
        headers.insert("soapaction", HeaderValue::from_static("\"urn:Op\""));
        headers
    }

    #[test]
    fn test_status_message_is_canonical_reason() {
        let (mut http, _) = client(ScriptedTransport::default().reply(599, &[], ""));

        post(&mut http, "http://example.org/ws").unwrap();

        assert_eq!(http.response_status_code(), Some(599));
        assert_eq!(http.response_status_message(), "");
        assert!(http.response_headers().starts_with("HTTP/1.1 599 \r\n"));
    }

    #[test]
    fn test_307_is_followed_with_same_method_and_body() {
        let (mut http, transport) = client(
            ScriptedTransport::default()
                .redirect("http://backup.example.org/ws")
                .reply(200, &[("content-type", "text/xml")], "<ok/>"),
        );

        http.exec(
            "http://example.org/ws",
            Some(b"<env/>".as_slice()),
            &soap_headers(),
            &ExecOptions::default(),
        )
        .unwrap();

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].url.as_str(), "http://backup.example.org/ws");
        assert_eq!(sent[1].method, Method::POST);
        assert_eq!(sent[1].body.as_deref(), Some(&b"<env/>"[..]));
        assert_eq!(sent[1].headers["soapaction"], "\"urn:Op\"");

        assert_eq!(http.response_status_code(), Some(200));
        assert_eq!(http.response_body(), b"<ok/>");
        assert!(http.request_headers().contains("Host: backup.example.org\r\n"));
        assert_eq!(http.error_message(), "");
    }

    #[test]
    fn test_relative_location_is_resolved() {
        let (mut http, transport) = client(
            ScriptedTransport::default()
                .redirect("../v2/ws?mode=full")
                .reply(200, &[], ""),
        );

        http.exec(
            "http://example.org/v1/ws",
            Some(b"x".as_slice()),
            &HeaderMap::new(),
            &ExecOptions::default(),
        )
        .unwrap();

        assert_eq!(
            transport.sent.lock().unwrap()[1].url.as_str(),
            "http://example.org/v2/ws?mode=full"
        );
        assert!(http.request_headers().starts_with("POST /v2/ws?mode=full HTTP/1.1\r\n"));
    }

    #[test]
    fn test_other_redirects_are_not_followed() {
        for status in [301, 302, 303, 308] {
            let (mut http, transport) = client(ScriptedTransport::default().reply(
                status,
                &[("location", "http://elsewhere/")],
                "",
            ));

            post(&mut http, "http://example.org/ws").unwrap();

            assert_eq!(transport.sent.lock().unwrap().len(), 1);
            assert_eq!(http.response_status_code(), Some(status));
        }
    }

    #[test]
    fn test_redirect_limit() {
        let mut script = ScriptedTransport::default();
        for _ in 0..4 {
            script = script.redirect("/again");
        }
        let (http, transport) = client(script);
        let mut http = http.with_max_redirects(3);

        let err = post(&mut http, "http://example.org/ws").unwrap_err();

        assert!(matches!(err, Error::TooManyRedirects(3)));
        // 1 requête initiale + 3 redirections suivies
        assert_eq!(transport.sent.lock().unwrap().len(), 4);
        assert_eq!(http.response_status_code(), Some(307));
        assert!(http.error_message().contains("Redirection limit reached"));
    }

    #[test]
    fn test_zero_limit_does_not_follow() {
        let (http, transport) = client(ScriptedTransport::default().redirect("/other"));
        let mut http = http.with_max_redirects(0);

        assert!(
            http.exec("http://example.org/ws", None, &HeaderMap::new(), &ExecOptions::default())
                .is_err()
        );
        assert_eq!(transport.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_307_without_location() {
        let (mut http, _) = client(ScriptedTransport::default().reply(307, &[], ""));

        let err = post(&mut http, "http://example.org/ws").unwrap_err();

        assert!(matches!(err, Error::MissingLocation));
        assert_eq!(http.response_status_code(), Some(307));
    }

    #[test]
    fn test_method_follows_body_presence() {
        let (mut http, transport) = client(
            ScriptedTransport::default()
                .reply(200, &[], "")
                .reply(200, &[], ""),
        );

        http.exec("http://example.org/wsdl", None, &HeaderMap::new(), &ExecOptions::default())
            .unwrap();
        assert!(http.request_headers().starts_with("GET /wsdl HTTP/1.1\r\n"));
        assert!(!http.request_headers().contains("Content-Length"));

        http.exec("http://example.org/ws", Some(b"".as_slice()), &HeaderMap::new(), &ExecOptions::default())
            .unwrap();
        assert!(http.request_headers().starts_with("POST /ws HTTP/1.1\r\n"));
        assert!(http.request_headers().contains("Content-Length: 0\r\n"));

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].method, Method::GET);
        assert!(sent[0].body.is_none());
        assert_eq!(sent[1].method, Method::POST);
    }

    #[test]
    fn test_per_call_headers_win() {
        let (mut http, transport) = client(ScriptedTransport::default().reply(200, &[], ""));
        let mut headers = HeaderMap::new();
        headers.insert("user-agent", HeaderValue::from_static("custom"));

        http.exec("http://example.org:8080/ws", None, &headers, &ExecOptions::default())
            .unwrap();

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].headers.get_all(USER_AGENT).iter().count(), 1);
        assert_eq!(sent[0].headers[USER_AGENT], "custom");
        assert_eq!(sent[0].headers[ACCEPT], "*/*");

        let text = http.request_headers();
        assert!(text.contains("User-Agent: custom\r\n"));
        assert!(text.contains("Host: example.org:8080\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_response_introspection() {
        let (mut http, _) = client(ScriptedTransport::default().reply(
            500,
            &[
                ("content-type", "text/xml; charset=utf-8"),
                ("set-cookie", "a=1"),
                ("set-cookie", "b=2"),
            ],
            "<Fault/>",
        ));

        post(&mut http, "http://example.org/ws").unwrap();

        assert_eq!(http.response_status_code(), Some(500));
        assert_eq!(http.response_status_message(), "Internal Server Error");
        assert_eq!(http.response_content_type(), "text/xml; charset=utf-8");

        let headers = http.response_headers();
        assert!(headers.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
        assert!(headers.contains("Set-Cookie: a=1, b=2\r\n"));
        assert!(headers.ends_with("\r\n\r\n"));

        let raw = http.response();
        assert!(raw.starts_with(headers.as_bytes()));
        assert!(raw.ends_with(b"<Fault/>"));
    }

    #[test]
    fn test_transport_failure_resets_state() {
        let (mut http, _) = client(
            ScriptedTransport::default()
                .reply(200, &[("content-type", "text/xml")], "<ok/>")
                .fail("connection refused"),
        );

        post(&mut http, "http://example.org/ws").unwrap();
        assert_eq!(http.response_status_code(), Some(200));

        assert!(post(&mut http, "http://example.org/ws").is_err());
        assert_eq!(http.error_message(), "connection refused");
        assert_eq!(http.response_status_code(), None);
        assert_eq!(http.response_status_message(), "");
        assert_eq!(http.response_content_type(), "");
        assert!(http.response_body().is_empty());
        assert!(http.response().is_empty());
        assert_eq!(http.response_headers(), "");
        // La requête tentée reste visible
        assert!(http.request_headers().starts_with("POST /ws"));
    }

    #[test]
    fn test_nothing_recorded_before_exec() {
        let (http, _) = client(ScriptedTransport::default());
        assert_eq!(http.request_headers(), "");
        assert_eq!(http.response_headers(), "");
        assert_eq!(http.error_message(), "");
    }

    #[test]
    fn test_invalid_location_is_an_error() {
        let (mut http, transport) = client(ScriptedTransport::default());
        assert!(matches!(
            http.exec("not a url", None, &HeaderMap::new(), &ExecOptions::default()),
            Err(Error::InvalidUrl(_))
        ));
        assert!(transport.sent.lock().unwrap().is_empty());
        assert!(!http.error_message().is_empty());
    }

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name("content-type"), "Content-Type");
        assert_eq!(canonical_name("soapaction"), "SOAPAction");
        assert_eq!(canonical_name("x-request-id"), "X-Request-Id");
    }
}
