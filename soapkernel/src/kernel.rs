//! Client-side SOAP kernel: filter pipeline and attachment hand-over

use crate::attachment::{Attachment, Attachments};
use crate::error::Result;
use crate::filter::{SoapRequestFilter, SoapResponseFilter};
use crate::message::{SoapRequest, SoapResponse};
use std::sync::Arc;
use tracing::debug;

/// Runs the filter pipeline around each SOAP exchange
///
/// The kernel also carries attachments from one exchange to the next:
/// attachments added before a call are moved onto the outgoing request,
/// and the attachments of the incoming response are kept until the next
/// request (or until taken with [`SoapKernel::take_attachment`]).
#[derive(Default, Clone)]
pub struct SoapKernel {
    attachments: Attachments,
    request_filters: Vec<Arc<dyn SoapRequestFilter>>,
    response_filters: Vec<Arc<dyn SoapResponseFilter>>,
}

impl std::fmt::Debug for SoapKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoapKernel")
            .field("attachments", &self.attachments)
            .field("request_filters", &self.request_filters.len())
            .field("response_filters", &self.response_filters.len())
            .finish()
    }
}

impl SoapKernel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a filter acting on both requests and responses
    pub fn register_filter<F>(&mut self, filter: Arc<F>)
    where
        F: SoapRequestFilter + SoapResponseFilter + 'static,
    {
        self.register_request_filter(filter.clone());
        self.register_response_filter(filter);
    }

    /// Appends a request filter
    pub fn register_request_filter(&mut self, filter: Arc<dyn SoapRequestFilter>) {
        self.request_filters.push(filter);
    }

    /// Prepends a response filter, so responses unwind the request order
    pub fn register_response_filter(&mut self, filter: Arc<dyn SoapResponseFilter>) {
        self.response_filters.insert(0, filter);
    }

    /// Queues an attachment for the next request
    pub fn add_attachment(&mut self, attachment: Attachment) {
        self.attachments.insert(attachment);
    }

    /// Removes and returns a pending attachment
    pub fn take_attachment(&mut self, content_id: &str) -> Option<Attachment> {
        self.attachments.remove(content_id)
    }

    /// Pending attachments (queued for the next request, or received with
    /// the last response)
    pub fn attachments(&self) -> &Attachments {
        &self.attachments
    }

    /// Moves the pending attachments onto the request, then runs the
    /// request filters
    pub fn filter_request(&mut self, request: &mut SoapRequest) -> Result<()> {
        request.set_attachments(std::mem::take(&mut self.attachments));
        debug!(
            attachments = request.attachments.len(),
            filters = self.request_filters.len(),
            location = %request.location,
            "Filtering SOAP request"
        );

        for filter in &self.request_filters {
            filter.filter_request(request)?;
        }
        Ok(())
    }

    /// Runs the response filters, then keeps the response attachments for
    /// the next exchange
    pub fn filter_response(&mut self, response: &mut SoapResponse) -> Result<()> {
        for filter in &self.response_filters {
            filter.filter_response(response)?;
        }

        self.attachments = response.attachments.clone();
        debug!(
            attachments = self.attachments.len(),
            "SOAP response filtered"
        );
        Ok(())
    }
}
