//! SOAP with Attachments filter
//!
//! Packs request attachments into a `multipart/related` body and unpacks
//! `multipart/related` responses into envelope + attachments.

use crate::attachment::{Attachment, generate_content_id, normalize_content_id};
use crate::error::Result;
use crate::filter::{SoapRequestFilter, SoapResponseFilter};
use crate::message::{SoapRequest, SoapResponse};
use crate::mime::{ContentType, MULTIPART_RELATED, MultipartRelated, Part};
use tracing::debug;

/// Transfer encoding of the envelope part
const ROOT_TRANSFER_ENCODING: &str = "8bit";

/// Content type given to parts that do not declare one
const DEFAULT_PART_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Default, Clone, Copy)]
pub struct MimeFilter;

impl MimeFilter {
    pub fn new() -> Self {
        Self
    }
}

impl SoapRequestFilter for MimeFilter {
    fn filter_request(&self, request: &mut SoapRequest) -> Result<()> {
        if !request.has_attachments() {
            return Ok(());
        }

        let root_id = generate_content_id();
        let mut package = MultipartRelated::new(request.version.mime_type());
        package.push(
            Part::new(request.content_type.clone(), request.content.clone())
                .transfer_encoding(ROOT_TRANSFER_ENCODING)
                .content_id(&root_id),
        );
        for attachment in &request.attachments {
            package.push(
                Part::new(attachment.content_type.clone(), attachment.content.clone())
                    .transfer_encoding(&attachment.content_transfer_encoding)
                    .content_id(&attachment.content_id),
            );
        }
        package.set_start(&root_id);

        debug!(
            parts = package.parts.len(),
            boundary = %package.boundary,
            "Packing SOAP request as multipart/related"
        );

        request.content = package.to_bytes();
        request.content_type = package.content_type();
        Ok(())
    }
}

impl SoapResponseFilter for MimeFilter {
    fn filter_response(&self, response: &mut SoapResponse) -> Result<()> {
        let content_type = ContentType::parse(&response.content_type);
        if !content_type.is(MULTIPART_RELATED) {
            return Ok(());
        }

        let package = MultipartRelated::parse(&response.content, &response.content_type)?;
        debug!(parts = package.parts.len(), "Unpacking multipart/related SOAP response");

        for part in package.non_root_parts() {
            let content_id = part
                .get_content_id()
                .unwrap_or_else(generate_content_id);
            let attachment = Attachment::new(
                normalize_content_id(&content_id),
                part.get_content_type().unwrap_or(DEFAULT_PART_CONTENT_TYPE),
                part.content.clone(),
            )
            .transfer_encoding(part.get_transfer_encoding());
            response.add_attachment(attachment);
        }

        if let Some(root) = package.root() {
            let root_type = root
                .get_content_type()
                .map(str::to_string)
                .unwrap_or_else(|| response.version.content_type().to_string());
            response.content = root.content.clone();
            response.content_type = root_type;
        }
        Ok(())
    }
}
