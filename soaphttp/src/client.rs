//! SOAP client: ties the kernel filters to an HTTP client

use crate::error::{Error, Result};
use crate::http_client::{ExecOptions, SoapHttpClient};
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use soapkernel::{
    Attachment, Attachments, MimeFilter, SoapKernel, SoapRequest, SoapResponse, SoapVersion,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const SOAP_ACTION: HeaderName = HeaderName::from_static("soapaction");

/// SOAP client over a [`SoapHttpClient`]
///
/// Each call runs the kernel request filters, sends the envelope, then runs
/// the response filters. Attachments received with a response stay in the
/// kernel and leave with the next request unless taken.
pub struct SoapClient {
    http: Box<dyn SoapHttpClient>,
    kernel: SoapKernel,
    location: String,
    version: SoapVersion,
    exec_options: ExecOptions,
}

impl std::fmt::Debug for SoapClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoapClient")
            .field("location", &self.location)
            .field("version", &self.version)
            .field("kernel", &self.kernel)
            .finish_non_exhaustive()
    }
}

impl SoapClient {
    /// Creates a client with the SwA filter registered
    pub fn new(
        http: Box<dyn SoapHttpClient>,
        location: impl Into<String>,
        version: SoapVersion,
    ) -> Self {
        let mut kernel = SoapKernel::new();
        kernel.register_filter(Arc::new(MimeFilter::new()));
        Self::with_kernel(http, kernel, location, version)
    }

    /// Creates a client around an already configured kernel
    pub fn with_kernel(
        http: Box<dyn SoapHttpClient>,
        kernel: SoapKernel,
        location: impl Into<String>,
        version: SoapVersion,
    ) -> Self {
        Self {
            http,
            kernel,
            location: location.into(),
            version,
            exec_options: ExecOptions::default(),
        }
    }

    /// Overall timeout of each HTTP request
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.exec_options.timeout = timeout;
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn version(&self) -> SoapVersion {
        self.version
    }

    pub fn kernel(&self) -> &SoapKernel {
        &self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut SoapKernel {
        &mut self.kernel
    }

    pub fn http_client(&self) -> &dyn SoapHttpClient {
        self.http.as_ref()
    }

    /// Queues an attachment for the next call
    pub fn add_attachment(&mut self, attachment: Attachment) {
        self.kernel.add_attachment(attachment);
    }

    /// Removes an attachment received with the last response
    pub fn take_attachment(&mut self, content_id: &str) -> Option<Attachment> {
        self.kernel.take_attachment(content_id)
    }

    pub fn attachments(&self) -> &Attachments {
        self.kernel.attachments()
    }

    /// Calls `action` on the client's endpoint
    pub fn call(&mut self, action: &str, envelope: &str) -> Result<SoapResponse> {
        let location = self.location.clone();
        self.do_request(envelope, &location, action, self.version)
    }

    /// Sends one envelope and returns the filtered response
    ///
    /// HTTP error statuses (a SOAP fault comes back as a 500) still yield a
    /// response; `Err` means no response could be obtained.
    pub fn do_request(
        &mut self,
        envelope: &str,
        location: &str,
        action: &str,
        version: SoapVersion,
    ) -> Result<SoapResponse> {
        let mut request = SoapRequest::new(envelope, location, action, version);
        self.kernel.filter_request(&mut request)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(&request.content_type)?);
        if version == SoapVersion::Soap11 {
            headers.insert(SOAP_ACTION, HeaderValue::from_str(&format!("\"{}\"", action))?);
        }

        debug!(
            location,
            action,
            %version,
            bytes = request.content.len(),
            attachments = request.attachments.len(),
            "Sending SOAP request"
        );

        if self
            .http
            .exec(location, Some(request.content.as_slice()), &headers, &self.exec_options)
            .is_err()
        {
            let message = self.http.error_message();
            warn!(location, action, error = %message, "SOAP request failed");
            return Err(Error::Http(message));
        }

        let mut response = SoapResponse::new(
            self.http.response_body().to_vec(),
            self.http.response_content_type(),
            location,
            action,
            version,
        );
        self.kernel.filter_response(&mut response)?;

        debug!(
            status = self.http.response_status_code(),
            attachments = response.attachments.len(),
            "SOAP response received"
        );
        Ok(response)
    }

    /// Request line and headers of the last call
    pub fn last_request_headers(&self) -> String {
        self.http.request_headers()
    }

    /// Status line and headers of the last response
    pub fn last_response_headers(&self) -> String {
        self.http.response_headers()
    }

    pub fn last_status_code(&self) -> Option<u16> {
        self.http.response_status_code()
    }

    /// Error of the last call, `""` when it succeeded
    pub fn last_error(&self) -> String {
        self.http.error_message()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soapkernel::mime::{MultipartRelated, Part};
    use std::sync::Mutex;

    /// Échange enregistré par le faux client HTTP
    #[derive(Debug, Clone, Default)]
    struct Exchange {
        location: String,
        body: Vec<u8>,
        headers: HeaderMap,
    }

    /// Faux client HTTP : enregistre la requête et renvoie une réponse fixe
    struct FakeHttp {
        sent: Arc<Mutex<Vec<Exchange>>>,
        reply: Option<(u16, String, Vec<u8>)>,
    }

    impl SoapHttpClient for FakeHttp {
        fn exec(
            &mut self,
            location: &str,
            body: Option<&[u8]>,
            headers: &HeaderMap,
            _options: &ExecOptions,
        ) -> Result<()> {
            self.sent.lock().unwrap().push(Exchange {
                location: location.to_string(),
                body: body.unwrap_or_default().to_vec(),
                headers: headers.clone(),
            });
            match self.reply {
                Some(_) => Ok(()),
                None => Err(Error::other("connection refused")),
            }
        }

        fn error_message(&self) -> String {
            if self.reply.is_some() {
                String::new()
            } else {
                "connection refused".to_string()
            }
        }

        fn request_headers(&self) -> String {
            String::new()
        }

        fn response(&self) -> Vec<u8> {
            self.response_body().to_vec()
        }

        fn response_headers(&self) -> String {
            String::new()
        }

        fn response_status_code(&self) -> Option<u16> {
            self.reply.as_ref().map(|(status, _, _)| *status)
        }

        fn response_status_message(&self) -> String {
            String::new()
        }

        fn response_content_type(&self) -> String {
            self.reply.as_ref().map(|(_, ct, _)| ct.clone()).unwrap_or_default()
        }

        fn response_body(&self) -> &[u8] {
            self.reply.as_ref().map(|(_, _, body)| body.as_slice()).unwrap_or_default()
        }
    }

    fn client(reply: Option<(u16, &str, &[u8])>) -> (SoapClient, Arc<Mutex<Vec<Exchange>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let http = FakeHttp {
            sent: sent.clone(),
            reply: reply.map(|(s, ct, body)| (s, ct.to_string(), body.to_vec())),
        };
        (
            SoapClient::new(Box::new(http), "http://example.org/ws", SoapVersion::Soap11),
            sent,
        )
    }

    #[test]
    fn test_soap11_headers() {
        let (mut soap, sent) = client(Some((200, "text/xml", b"<r/>".as_slice())));

        let response = soap.call("urn:Ping", "<ping/>").unwrap();

        assert_eq!(response.content, b"<r/>");
        let sent = sent.lock().unwrap();
        assert_eq!(sent[0].location, "http://example.org/ws");
        assert_eq!(sent[0].body, b"<ping/>");
        assert_eq!(sent[0].headers[CONTENT_TYPE], "text/xml; charset=utf-8");
        assert_eq!(sent[0].headers["soapaction"], "\"urn:Ping\"");
    }

    #[test]
    fn test_soap12_action_goes_into_content_type() {
        let (mut soap, sent) = client(Some((200, "application/soap+xml", b"<r/>".as_slice())));

        soap.do_request("<ping/>", "http://example.org/ws12", "urn:Ping", SoapVersion::Soap12)
            .unwrap();

        let sent = sent.lock().unwrap();
        assert!(!sent[0].headers.contains_key("soapaction"));
        assert_eq!(
            sent[0].headers[CONTENT_TYPE],
            "application/soap+xml; charset=utf-8; action=\"urn:Ping\""
        );
    }

    #[test]
    fn test_http_failure_carries_error_message() {
        let (mut soap, _) = client(None);

        match soap.call("urn:Ping", "<ping/>") {
            Err(Error::Http(message)) => assert_eq!(message, "connection refused"),
            other => panic!("unexpected result: {:?}", other.map(|r| r.content.clone())),
        }
    }

    #[test]
    fn test_attachments_round_trip_through_kernel() {
        // Réponse multipart avec une pièce jointe
        let mut package = MultipartRelated::new("text/xml");
        package.push(Part::new("text/xml", "<r/>").content_id("root@srv"));
        package.push(Part::new("text/plain", "receipt").content_id("receipt@srv"));
        package.set_start("root@srv");
        let body = package.to_bytes();
        let content_type = package.content_type();

        let (mut soap, sent) = client(Some((200, content_type.as_str(), body.as_slice())));
        soap.add_attachment(Attachment::new("doc@client", "application/pdf", vec![1, 2, 3]));

        let response = soap.call("urn:Upload", "<upload/>").unwrap();

        assert_eq!(response.content, b"<r/>");
        assert!(soap.attachments().contains("receipt@srv"));
        assert!(!soap.attachments().contains("doc@client"));

        let sent = sent.lock().unwrap();
        let request_ct = sent[0].headers[CONTENT_TYPE].to_str().unwrap();
        assert!(request_ct.starts_with("multipart/related"));

        let receipt = soap.take_attachment("receipt@srv").unwrap();
        assert_eq!(receipt.content, b"receipt");
        assert!(soap.attachments().is_empty());
    }
}
