//! Per-request dispatch context.
//!
//! One [`Exchange`] is created per inbound request and threaded through the
//! middleware chain and, on failure, the error pipeline. It owns the request
//! and the single write-once response slot, which is how the engine
//! guarantees exactly one response per request.

use tracing::warn;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// The in-flight state of one request's dispatch.
pub struct Exchange {
    request: Request,
    slot: ResponseSlot,
}

impl Exchange {
    pub(crate) fn new(request: Request) -> Self {
        Self { request, slot: ResponseSlot::new() }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Mutable access for the steps that legitimately write into the request:
    /// the body parser (parsed body) and the router (path parameters).
    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    /// Finalises the response for this request.
    ///
    /// The slot is write-once. A second call is a contract violation: it is
    /// recorded, the first response is kept, and the dispatcher aborts the
    /// request with a 500 once the offending step returns.
    pub fn respond(&mut self, response: impl IntoResponse) {
        self.slot.finalize(response.into_response());
    }

    /// Attaches a header ahead of whichever step eventually finalises the
    /// response. Ignored (with a warning) once the response is finalised.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.slot.set_header(name, value);
    }

    /// Whether some step has already finalised the response.
    pub fn responded(&self) -> bool {
        self.slot.is_finalized()
    }

    pub(crate) fn double_write(&self) -> bool {
        self.slot.double_write
    }

    pub(crate) fn take_response(&mut self) -> Option<Response> {
        self.slot.finalized.take()
    }
}

/// Write-once response storage plus headers accumulated before finalisation.
struct ResponseSlot {
    finalized: Option<Response>,
    pending_headers: Vec<(String, String)>,
    double_write: bool,
}

impl ResponseSlot {
    fn new() -> Self {
        Self { finalized: None, pending_headers: Vec::new(), double_write: false }
    }

    fn is_finalized(&self) -> bool {
        self.finalized.is_some()
    }

    fn finalize(&mut self, mut response: Response) {
        if self.finalized.is_some() {
            self.double_write = true;
            return;
        }
        response.prepend_headers(std::mem::take(&mut self.pending_headers));
        self.finalized = Some(response);
    }

    fn set_header(&mut self, name: &str, value: &str) {
        if self.finalized.is_some() {
            warn!(header = name, "header set after response was finalised, dropping");
            return;
        }
        self.pending_headers.push((name.to_owned(), value.to_owned()));
    }
}
