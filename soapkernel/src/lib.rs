//! # soapkernel - SOAP messages, attachments and filter pipeline
//!
//! This crate holds the transport-independent side of a SOAP exchange:
//!
//! - [`SoapRequest`] / [`SoapResponse`]: envelope bytes plus HTTP metadata
//! - [`Attachment`]: MIME parts travelling with a message
//! - [`SoapKernel`]: request/response filter pipeline that hands the
//!   attachments of one exchange over to the next
//! - [`MimeFilter`]: SOAP with Attachments (`multipart/related`) packing
//!
//! The envelope itself is opaque here; building and reading the XML is left
//! to the SOAP engine.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use soapkernel::{Attachment, MimeFilter, SoapKernel, SoapRequest, SoapVersion};
//!
//! let mut kernel = SoapKernel::new();
//! kernel.register_filter(Arc::new(MimeFilter::new()));
//! kernel.add_attachment(Attachment::new("invoice@example.org", "application/pdf", vec![0u8; 16]));
//!
//! let mut request = SoapRequest::new(
//!     "<soap:Envelope/>",
//!     "https://example.org/ws",
//!     "urn:SendInvoice",
//!     SoapVersion::Soap11,
//! );
//! kernel.filter_request(&mut request).unwrap();
//!
//! assert!(request.content_type.starts_with("multipart/related"));
//! assert!(kernel.attachments().is_empty());
//! ```

pub mod attachment;
pub mod error;
pub mod filter;
pub mod kernel;
pub mod message;
pub mod mime;
pub mod mime_filter;

pub use attachment::{Attachment, Attachments};
pub use error::{Error, Result};
pub use filter::{SoapRequestFilter, SoapResponseFilter};
pub use kernel::SoapKernel;
pub use message::{SoapMessage, SoapRequest, SoapResponse, SoapVersion};
pub use mime_filter::MimeFilter;
