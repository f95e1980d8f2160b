use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, Weak};

use may::sync::mpsc;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use super::format::{render_payload, FormatterTable, ResponseFormatter};
use super::request::{RequestContext, RequestInner};
use super::HeaderVec;
use crate::capability::{BoundCapabilities, CapabilityTarget};
use crate::error::ComponentError;

/// What the transport writes once a response has ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalResponse {
    pub status: u16,
    pub headers: HeaderVec,
    pub body: Vec<u8>,
}

impl FinalResponse {
    /// A bodiless response, used when nothing ended the real one.
    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: HeaderVec::new(),
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn body_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Receiving end of one exchange, held by the transport.
pub struct ResponseReceiver {
    pub(super) rx: mpsc::Receiver<FinalResponse>,
}

impl ResponseReceiver {
    /// Block until the response is ended.
    ///
    /// Returns `None` once every handle to an un-ended response has been
    /// dropped. A handle kept alive and never ended blocks forever.
    #[must_use]
    pub fn wait(self) -> Option<FinalResponse> {
        self.rx.recv().ok()
    }
}

struct ResponseState {
    status: u16,
    headers: HeaderVec,
    body: Vec<u8>,
    ended: bool,
}

pub(super) struct ResponseShared {
    state: Mutex<ResponseState>,
    done: Mutex<Option<mpsc::Sender<FinalResponse>>>,
    formatters: OnceCell<Arc<FormatterTable>>,
    capabilities: OnceCell<BoundCapabilities>,
    request: OnceCell<Weak<RequestInner>>,
}

/// The response side of one exchange.
///
/// Handlers write through it and must call [`ResponseContext::end`], directly
/// or through a formatter such as [`ResponseContext::ok`]. Nothing is sent
/// until then.
#[derive(Clone)]
pub struct ResponseContext {
    inner: Arc<ResponseShared>,
}

impl ResponseContext {
    pub(super) fn new(done: mpsc::Sender<FinalResponse>) -> Self {
        Self {
            inner: Arc::new(ResponseShared {
                state: Mutex::new(ResponseState {
                    status: 200,
                    headers: HeaderVec::new(),
                    body: Vec::new(),
                    ended: false,
                }),
                done: Mutex::new(Some(done)),
                formatters: OnceCell::new(),
                capabilities: OnceCell::new(),
                request: OnceCell::new(),
            }),
        }
    }

    pub(super) fn from_shared(inner: Arc<ResponseShared>) -> Self {
        Self { inner }
    }

    pub(super) fn downgrade(&self) -> Weak<ResponseShared> {
        Arc::downgrade(&self.inner)
    }

    pub(super) fn link_request(&self, request: Weak<RequestInner>) {
        if self.inner.request.set(request).is_err() {
            warn!("Response already linked to a request");
        }
    }

    /// The request paired with this response, while any handle to it is alive.
    #[must_use]
    pub fn request(&self) -> Option<RequestContext> {
        self.inner
            .request
            .get()
            .and_then(Weak::upgrade)
            .map(RequestContext::from_inner)
    }

    pub fn set_status(&self, status: u16) -> &Self {
        self.inner.state.lock().status = status;
        self
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.inner.state.lock().status
    }

    /// Set a header, replacing any value under the same case-insensitive name.
    pub fn set_header(&self, name: &str, value: &str) -> &Self {
        let mut state = self.inner.state.lock();
        if let Some(slot) = state
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            slot.1 = value.to_string();
        } else {
            state.headers.push((Arc::from(name), value.to_string()));
        }
        self
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<String> {
        self.inner
            .state
            .lock()
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }

    /// Append bytes to the body. Ignored once the response has ended.
    pub fn write(&self, bytes: impl AsRef<[u8]>) -> &Self {
        let mut state = self.inner.state.lock();
        if state.ended {
            warn!(status = state.status, "Write after response end ignored");
        } else {
            state.body.extend_from_slice(bytes.as_ref());
        }
        self
    }

    /// Finish the response and hand it to the transport.
    ///
    /// Returns `false` if it had already ended.
    pub fn end(&self) -> bool {
        let finished = {
            let mut state = self.inner.state.lock();
            if state.ended {
                debug!(status = state.status, "Response already ended");
                return false;
            }
            state.ended = true;
            FinalResponse {
                status: state.status,
                headers: state.headers.clone(),
                body: std::mem::take(&mut state.body),
            }
        };
        if let Some(done) = self.inner.done.lock().take() {
            if done.send(finished).is_err() {
                debug!("Transport stopped waiting for this response");
            }
        }
        true
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.inner.state.lock().ended
    }

    /// Render `data` with `status` and end the response.
    ///
    /// A content type is set from the payload unless one is already present.
    pub fn send(&self, status: u16, data: impl Into<Value>) {
        if self.is_ended() {
            warn!(status, "Response already ended, payload dropped");
            return;
        }
        let payload = render_payload(&data.into());
        self.set_status(status);
        if let Some(content_type) = payload.content_type {
            if self.header("content-type").is_none() {
                self.set_header("Content-Type", content_type);
            }
        }
        self.write(payload.body);
        self.end();
    }

    /// End with `status` and an empty body, unless the response already ended.
    pub(crate) fn terminate(&self, status: u16) -> bool {
        {
            let mut state = self.inner.state.lock();
            if state.ended {
                debug!(
                    status = state.status,
                    requested = status,
                    "Response already ended, termination skipped"
                );
                return false;
            }
            state.status = status;
            state.body.clear();
        }
        self.end()
    }

    pub fn ok(&self, data: impl Into<Value>) {
        self.format("ok", 200, data.into());
    }

    pub fn bad_request(&self, data: impl Into<Value>) {
        self.format("badRequest", 400, data.into());
    }

    pub fn not_found(&self, data: impl Into<Value>) {
        self.format("notFound", 404, data.into());
    }

    pub fn conflict(&self, data: impl Into<Value>) {
        self.format("conflict", 409, data.into());
    }

    pub fn server_error(&self, data: impl Into<Value>) {
        self.format("serverError", 500, data.into());
    }

    /// Invoke any bound formatter by name.
    pub fn respond(&self, name: &str, data: impl Into<Value>) -> Result<(), ComponentError> {
        let formatter = self
            .formatter(name)
            .ok_or_else(|| ComponentError::UnknownCapability {
                target: "formatter".to_string(),
                name: name.to_string(),
            })?;
        formatter(self, data.into());
        Ok(())
    }

    fn format(&self, name: &str, status: u16, data: Value) {
        match self.formatter(name) {
            Some(formatter) => formatter(self, data),
            None => self.send(status, data),
        }
    }

    fn formatter(&self, name: &str) -> Option<ResponseFormatter> {
        self.inner
            .formatters
            .get()
            .and_then(|table| table.get(name))
            .map(Arc::clone)
    }

    pub(crate) fn bind_formatters(&self, formatters: Arc<FormatterTable>) -> bool {
        self.inner.formatters.set(formatters).is_ok()
    }

    pub(crate) fn bind_capabilities(&self, capabilities: BoundCapabilities) -> bool {
        self.inner.capabilities.set(capabilities).is_ok()
    }

    #[must_use]
    pub fn has_capability(&self, name: &str) -> bool {
        self.inner
            .capabilities
            .get()
            .is_some_and(|bound| bound.table.contains(name))
    }

    /// Call a response capability by name.
    pub fn capability(&self, name: &str, args: Value) -> Result<Value, ComponentError> {
        let bound = self
            .inner
            .capabilities
            .get()
            .ok_or_else(|| ComponentError::UnknownCapability {
                target: CapabilityTarget::Response.to_string(),
                name: name.to_string(),
            })?;
        let request = self
            .request()
            .ok_or_else(|| ComponentError::failed("request already released"))?;
        bound.call(CapabilityTarget::Response, name, request, self.clone(), args)
    }
}

impl fmt::Debug for ResponseContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ResponseContext")
            .field("status", &state.status)
            .field("headers", &state.headers)
            .field("body_len", &state.body.len())
            .field("ended", &state.ended)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::super::{exchange, RequestParts};
    use super::*;
    use http::Method;
    use serde_json::json;

    fn pair() -> (RequestContext, ResponseContext, ResponseReceiver) {
        exchange(RequestParts::new(Method::GET, "/"))
    }

    #[test]
    fn test_ok_without_bound_formatters_uses_builtin() {
        let (_req, res, rx) = pair();
        res.ok(json!({"id": 1}));
        assert!(res.is_ended());
        let finished = rx.wait().expect("ended");
        assert_eq!(finished.status, 200);
        assert_eq!(finished.body_str(), r#"{"id":1}"#);
        assert_eq!(finished.header("content-type"), Some("application/json"));
    }

    #[test]
    fn test_statuses_of_builtin_formatters() {
        let cases: [(fn(&ResponseContext, Value), u16); 4] = [
            (|r, v| r.bad_request(v), 400),
            (|r, v| r.not_found(v), 404),
            (|r, v| r.conflict(v), 409),
            (|r, v| r.server_error(v), 500),
        ];
        for (call, status) in cases {
            let (_req, res, rx) = pair();
            call(&res, json!("msg"));
            let finished = rx.wait().expect("ended");
            assert_eq!(finished.status, status);
            assert_eq!(finished.body_str(), "msg");
        }
    }

    #[test]
    fn test_end_only_once() {
        let (_req, res, rx) = pair();
        res.set_status(201).write("a");
        assert!(res.end());
        assert!(!res.end());
        res.write("ignored");
        let finished = rx.wait().expect("ended");
        assert_eq!(finished.status, 201);
        assert_eq!(finished.body, b"a");
    }

    #[test]
    fn test_explicit_content_type_kept() {
        let (_req, res, rx) = pair();
        res.set_header("Content-Type", "text/html");
        res.ok("<p>x</p>");
        let finished = rx.wait().expect("ended");
        assert_eq!(finished.header("content-type"), Some("text/html"));
    }

    #[test]
    fn test_dropped_response_yields_none() {
        let (req, res, rx) = pair();
        drop(res);
        drop(req);
        assert!(rx.wait().is_none());
    }

    #[test]
    fn test_peers_linked_weakly() {
        let (req, res, _rx) = pair();
        assert_eq!(res.request().map(|r| r.id()), Some(req.id()));
        assert!(req.response().is_some());
        drop(res);
        assert!(req.response().is_none());
    }

    #[test]
    fn test_bound_formatter_overrides_builtin() {
        let (_req, res, rx) = pair();
        let mut table = FormatterTable::with_defaults();
        table.insert(
            "ok",
            Arc::new(|r: &ResponseContext, v: Value| r.send(202, json!({ "data": v }))),
        );
        assert!(res.bind_formatters(Arc::new(table)));
        res.ok("x");
        let finished = rx.wait().expect("ended");
        assert_eq!(finished.status, 202);
        assert_eq!(finished.body_str(), r#"{"data":"x"}"#);
    }

    #[test]
    fn test_respond_unknown_formatter() {
        let (_req, res, _rx) = pair();
        assert!(res.bind_formatters(Arc::new(FormatterTable::with_defaults())));
        assert!(res.respond("teapot", Value::Null).is_err());
        assert!(!res.is_ended());
    }

    #[test]
    fn test_terminate_skips_ended_response() {
        let (_req, res, rx) = pair();
        res.ok("done");
        assert!(!res.terminate(500));
        let finished = rx.wait().expect("ended");
        assert_eq!(finished.status, 200);
    }
}
