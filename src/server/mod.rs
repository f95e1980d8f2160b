//! HTTP transport: adapts `may_minihttp` requests to the dispatcher and
//! writes ended responses back.

mod http_server;
mod request;
mod response;
mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{parse_method, parse_request};
pub use response::{interned_lines, status_reason, HEADER_INTERN_CAP, MAX_RESPONSE_HEADERS};
pub use service::AppService;
