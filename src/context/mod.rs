//! # Context Module
//!
//! Request and response contexts for one exchange. The transport builds both
//! with [`exchange`], passes them through the dispatcher and waits on the
//! [`ResponseReceiver`] until a handler ends the response.
//!
//! The two contexts link to each other weakly: capability functions and
//! formatters can reach the peer while the exchange is in flight, but neither
//! keeps the other alive. Once the last handle to an un-ended response is
//! dropped, the receiver reports that no response will come.

mod format;
mod request;
mod response;

use std::sync::Arc;

use may::sync::mpsc;
use smallvec::SmallVec;

pub use format::{render_payload, status_formatter, FormatterTable, Payload, ResponseFormatter};
pub use request::{RequestContext, RequestId, RequestParts};
pub use response::{FinalResponse, ResponseContext, ResponseReceiver};

/// Headers stored inline up to this count.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Header list keyed by shared names.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Create the linked request/response pair for one inbound request.
#[must_use]
pub fn exchange(parts: RequestParts) -> (RequestContext, ResponseContext, ResponseReceiver) {
    let (tx, rx) = mpsc::channel();
    let request = RequestContext::from_parts(parts);
    let response = ResponseContext::new(tx);
    request.link_response(response.downgrade());
    response.link_request(request.downgrade());
    (request, response, ResponseReceiver { rx })
}
