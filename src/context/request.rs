use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Weak};

use http::Method;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::warn;

use super::response::{ResponseContext, ResponseShared};
use super::HeaderVec;
use crate::capability::{BoundCapabilities, CapabilityTarget};
use crate::error::ComponentError;
use crate::router::ParamVec;

/// ULID request identifier, reused from `x-request-id` when the client sends a valid one.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct RequestId(ulid::Ulid);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    #[must_use]
    pub fn from_header_or_new(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or_default()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for RequestId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ulid::Ulid::from_string(s).map(RequestId)
    }
}

/// Raw request data handed to the dispatcher by a transport.
#[derive(Debug, Clone, Default)]
pub struct RequestParts {
    pub method: Method,
    /// Request target; anything after `?` becomes the query string.
    pub target: String,
    pub headers: HeaderVec,
    pub body: Vec<u8>,
}

impl RequestParts {
    #[must_use]
    pub fn new(method: Method, target: &str) -> Self {
        Self {
            method,
            target: target.to_string(),
            headers: HeaderVec::new(),
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .push((Arc::from(name.to_ascii_lowercase()), value.to_string()));
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

#[derive(Default)]
struct RouteParams {
    params: ParamVec,
    splats: Vec<String>,
}

pub(super) struct RequestInner {
    id: RequestId,
    method: Method,
    path: String,
    query: String,
    query_params: ParamVec,
    headers: HeaderVec,
    body: Vec<u8>,
    route: RwLock<RouteParams>,
    locals: Mutex<HashMap<String, Value>>,
    capabilities: OnceCell<BoundCapabilities>,
    response: OnceCell<Weak<ResponseShared>>,
}

/// The request side of one exchange.
///
/// Cheap to clone; every clone observes the same route params, locals and
/// bound capabilities.
#[derive(Clone)]
pub struct RequestContext {
    inner: Arc<RequestInner>,
}

impl RequestContext {
    pub(super) fn from_parts(parts: RequestParts) -> Self {
        let RequestParts {
            method,
            target,
            headers,
            body,
        } = parts;
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), query.to_string()),
            None => (target, String::new()),
        };
        let path = if path.is_empty() { "/".to_string() } else { path };
        let query_params: ParamVec = url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (Arc::from(k.as_ref()), v.into_owned()))
            .collect();
        let id = RequestId::from_header_or_new(
            headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("x-request-id"))
                .map(|(_, v)| v.as_str()),
        );

        Self {
            inner: Arc::new(RequestInner {
                id,
                method,
                path,
                query,
                query_params,
                headers,
                body,
                route: RwLock::new(RouteParams::default()),
                locals: Mutex::new(HashMap::new()),
                capabilities: OnceCell::new(),
                response: OnceCell::new(),
            }),
        }
    }

    pub(super) fn link_response(&self, response: Weak<ResponseShared>) {
        if self.inner.response.set(response).is_err() {
            warn!(request_id = %self.inner.id, "Request already linked to a response");
        }
    }

    pub(super) fn downgrade(&self) -> Weak<RequestInner> {
        Arc::downgrade(&self.inner)
    }

    pub(super) fn from_inner(inner: Arc<RequestInner>) -> Self {
        Self { inner }
    }

    #[must_use]
    pub fn id(&self) -> RequestId {
        self.inner.id
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    /// Path without the query string.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Raw query string, without the leading `?`.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.inner.query
    }

    /// First value of a decoded query parameter.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.inner
            .query_params
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn query_params(&self) -> &ParamVec {
        &self.inner.query_params
    }

    /// Header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderVec {
        &self.inner.headers
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.inner.body
    }

    /// The body parsed as JSON, if it is non-empty valid JSON.
    #[must_use]
    pub fn body_json(&self) -> Option<Value> {
        if self.inner.body.is_empty() {
            return None;
        }
        serde_json::from_slice(&self.inner.body).ok()
    }

    /// A route parameter captured by the matched pattern.
    ///
    /// When a pattern repeats a name, the last occurrence wins.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<String> {
        self.inner
            .route
            .read()
            .params
            .iter()
            .rev()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.clone())
    }

    #[must_use]
    pub fn params(&self) -> ParamVec {
        self.inner.route.read().params.clone()
    }

    /// Segments captured by `*` in the matched pattern.
    #[must_use]
    pub fn splats(&self) -> Vec<String> {
        self.inner.route.read().splats.clone()
    }

    pub(crate) fn set_route_params(&self, params: ParamVec, splats: Vec<String>) {
        let mut route = self.inner.route.write();
        route.params = params;
        route.splats = splats;
    }

    /// Per-request scratch values, typically set by middleware for handlers.
    #[must_use]
    pub fn local(&self, name: &str) -> Option<Value> {
        self.inner.locals.lock().get(name).cloned()
    }

    pub fn set_local(&self, name: &str, value: Value) -> Option<Value> {
        self.inner.locals.lock().insert(name.to_string(), value)
    }

    /// The response paired with this request, while any handle to it is alive.
    #[must_use]
    pub fn response(&self) -> Option<ResponseContext> {
        self.inner
            .response
            .get()
            .and_then(Weak::upgrade)
            .map(ResponseContext::from_shared)
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

    /// Call a request capability by name.
    pub fn capability(&self, name: &str, args: Value) -> Result<Value, ComponentError> {
        let bound = self
            .inner
            .capabilities
            .get()
            .ok_or_else(|| ComponentError::UnknownCapability {
                target: CapabilityTarget::Request.to_string(),
                name: name.to_string(),
            })?;
        let response = self
            .response()
            .ok_or_else(|| ComponentError::failed("response already released"))?;
        bound.call(CapabilityTarget::Request, name, self.clone(), response, args)
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("id", &self.inner.id)
            .field("method", &self.inner.method)
            .field("path", &self.inner.path)
            .field("query", &self.inner.query)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(parts: RequestParts) -> RequestContext {
        RequestContext::from_parts(parts)
    }

    #[test]
    fn test_target_split_into_path_and_query() {
        let req = request(RequestParts::new(Method::GET, "/pets?limit=10&name=a%20b"));
        assert_eq!(req.path(), "/pets");
        assert_eq!(req.query(), "limit=10&name=a%20b");
        assert_eq!(req.query_param("limit"), Some("10"));
        assert_eq!(req.query_param("name"), Some("a b"));
        assert_eq!(req.query_param("missing"), None);
    }

    #[test]
    fn test_empty_target_is_root() {
        let req = request(RequestParts::new(Method::GET, "?x=1"));
        assert_eq!(req.path(), "/");
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let req = request(RequestParts::new(Method::GET, "/").header("X-Token", "abc"));
        assert_eq!(req.header("x-token"), Some("abc"));
        assert_eq!(req.header("X-TOKEN"), Some("abc"));
    }

    #[test]
    fn test_request_id_reused_from_header() {
        let id = RequestId::new();
        let req = request(RequestParts::new(Method::GET, "/").header("x-request-id", &id.to_string()));
        assert_eq!(req.id(), id);

        let req = request(RequestParts::new(Method::GET, "/").header("x-request-id", "nope"));
        assert_ne!(req.id(), id);
    }

    #[test]
    fn test_body_json() {
        let req = request(RequestParts::new(Method::POST, "/").body(r#"{"a":1}"#));
        assert_eq!(req.body_json(), Some(serde_json::json!({"a": 1})));
        let req = request(RequestParts::new(Method::POST, "/").body("not json"));
        assert_eq!(req.body_json(), None);
        let req = request(RequestParts::new(Method::POST, "/"));
        assert_eq!(req.body_json(), None);
    }

    #[test]
    fn test_route_params_last_occurrence_wins() {
        let req = request(RequestParts::new(Method::GET, "/"));
        let mut params = ParamVec::new();
        params.push((Arc::from("id"), "org".to_string()));
        params.push((Arc::from("id"), "user".to_string()));
        req.set_route_params(params, vec!["a/b".to_string()]);
        assert_eq!(req.param("id"), Some("user".to_string()));
        assert_eq!(req.splats(), vec!["a/b".to_string()]);
    }

    #[test]
    fn test_locals_shared_between_clones() {
        let req = request(RequestParts::new(Method::GET, "/"));
        let clone = req.clone();
        assert_eq!(req.set_local("user", Value::from("ana")), None);
        assert_eq!(clone.local("user"), Some(Value::from("ana")));
    }
}
