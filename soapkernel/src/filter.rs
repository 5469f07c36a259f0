//! Filter traits of the SOAP processing pipeline

use crate::error::Result;
use crate::message::{SoapRequest, SoapResponse};

/// Filter applied to every outgoing request, in registration order
pub trait SoapRequestFilter: Send + Sync {
    fn filter_request(&self, request: &mut SoapRequest) -> Result<()>;
}

/// Filter applied to every incoming response, in reverse registration order
pub trait SoapResponseFilter: Send + Sync {
    fn filter_response(&self, response: &mut SoapResponse) -> Result<()>;
}
