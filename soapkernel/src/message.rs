//! SOAP request and response messages
//!
//! The envelope is kept as opaque bytes: building and parsing the XML is
//! the job of the SOAP engine, not of this crate.

use crate::attachment::{Attachment, Attachments};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::str::FromStr;

/// Namespace of SOAP 1.1 envelopes
pub const SOAP_11_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Namespace of SOAP 1.2 envelopes
pub const SOAP_12_ENVELOPE_NS: &str = "http://www.w3.org/2003/05/soap-envelope";

/// SOAP protocol version
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SoapVersion {
    #[default]
    Soap11,
    Soap12,
}

impl SoapVersion {
    /// Bare MIME type of envelopes for this version
    pub fn mime_type(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => "text/xml",
            SoapVersion::Soap12 => "application/soap+xml",
        }
    }

    /// Content-Type header value of a plain (non multipart) envelope
    pub fn content_type(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => "text/xml; charset=utf-8",
            SoapVersion::Soap12 => "application/soap+xml; charset=utf-8",
        }
    }

    pub fn envelope_namespace(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => SOAP_11_ENVELOPE_NS,
            SoapVersion::Soap12 => SOAP_12_ENVELOPE_NS,
        }
    }
}

impl fmt::Display for SoapVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoapVersion::Soap11 => write!(f, "1.1"),
            SoapVersion::Soap12 => write!(f, "1.2"),
        }
    }
}

impl FromStr for SoapVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1.1" | "11" | "soap11" => Ok(SoapVersion::Soap11),
            "1.2" | "12" | "soap12" => Ok(SoapVersion::Soap12),
            other => Err(format!("Unknown SOAP version: {}", other)),
        }
    }
}

/// State shared by requests and responses
#[derive(Debug, Clone, Default)]
pub struct SoapMessage {
    /// Body sent or received over HTTP (envelope or multipart package)
    pub content: Vec<u8>,

    /// Content-Type header value matching `content`
    pub content_type: String,

    /// Endpoint URL
    pub location: String,

    /// SOAP action
    pub action: String,

    pub version: SoapVersion,

    /// MIME attachments of the message
    pub attachments: Attachments,
}

impl SoapMessage {
    /// Content as UTF-8 text, lossy for binary packages
    pub fn content_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }

    pub fn set_content(&mut self, content: impl Into<Vec<u8>>) {
        self.content = content.into();
    }

    /// Replaces all attachments of the message
    pub fn set_attachments(&mut self, attachments: Attachments) {
        self.attachments = attachments;
    }

    pub fn add_attachment(&mut self, attachment: Attachment) {
        self.attachments.insert(attachment);
    }

    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }
}

/// Outgoing SOAP request
#[derive(Debug, Clone, Default)]
pub struct SoapRequest {
    message: SoapMessage,
}

impl SoapRequest {
    /// Creates a request; the content type follows the SOAP version
    /// (SOAP 1.2 carries the action as a content type parameter)
    pub fn new(
        content: impl Into<Vec<u8>>,
        location: impl Into<String>,
        action: impl Into<String>,
        version: SoapVersion,
    ) -> Self {
        let action = action.into();
        let content_type = match version {
            SoapVersion::Soap11 => version.content_type().to_string(),
            SoapVersion::Soap12 if action.is_empty() => version.content_type().to_string(),
            SoapVersion::Soap12 => format!("{}; action=\"{}\"", version.content_type(), action),
        };

        Self {
            message: SoapMessage {
                content: content.into(),
                content_type,
                location: location.into(),
                action,
                version,
                attachments: Attachments::new(),
            },
        }
    }

    pub fn into_message(self) -> SoapMessage {
        self.message
    }
}

impl Deref for SoapRequest {
    type Target = SoapMessage;

    fn deref(&self) -> &Self::Target {
        &self.message
    }
}

impl DerefMut for SoapRequest {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.message
    }
}

/// Incoming SOAP response
#[derive(Debug, Clone, Default)]
pub struct SoapResponse {
    message: SoapMessage,
}

impl SoapResponse {
    pub fn new(
        content: impl Into<Vec<u8>>,
        content_type: impl Into<String>,
        location: impl Into<String>,
        action: impl Into<String>,
        version: SoapVersion,
    ) -> Self {
        Self {
            message: SoapMessage {
                content: content.into(),
                content_type: content_type.into(),
                location: location.into(),
                action: action.into(),
                version,
                attachments: Attachments::new(),
            },
        }
    }

    pub fn into_message(self) -> SoapMessage {
        self.message
    }
}

impl Deref for SoapResponse {
    type Target = SoapMessage;

    fn deref(&self) -> &Self::Target {
        &self.message
    }
}

impl DerefMut for SoapResponse {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_content_type_follows_version() {
        let req = SoapRequest::new("<e/>", "http://x", "urn:Get", SoapVersion::Soap11);
        assert_eq!(req.content_type, "text/xml; charset=utf-8");

        let req = SoapRequest::new("<e/>", "http://x", "urn:Get", SoapVersion::Soap12);
        assert_eq!(
            req.content_type,
            "application/soap+xml; charset=utf-8; action=\"urn:Get\""
        );

        let req = SoapRequest::new("<e/>", "http://x", "", SoapVersion::Soap12);
        assert_eq!(req.content_type, "application/soap+xml; charset=utf-8");
    }

    #[test]
    fn test_version_parsing() {
        assert_eq!("1.1".parse::<SoapVersion>(), Ok(SoapVersion::Soap11));
        assert_eq!("1.2".parse::<SoapVersion>(), Ok(SoapVersion::Soap12));
        assert!("2.0".parse::<SoapVersion>().is_err());
        assert_eq!(SoapVersion::Soap12.to_string(), "1.2");
    }
}
