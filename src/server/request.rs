use std::io::{self, Read};

use http::Method;
use may_minihttp::Request;
use tracing::debug;

use crate::context::RequestParts;

/// Convert a transport request into [`RequestParts`].
///
/// Header names are lower-cased; values that are not valid UTF-8 are
/// dropped. The body is read last since reading consumes the request.
pub fn parse_request(req: Request) -> io::Result<RequestParts> {
    let method = parse_method(req.method())?;
    let mut parts = RequestParts::new(method, req.path());

    for header in req.headers() {
        match std::str::from_utf8(header.value) {
            Ok(value) => parts = parts.header(header.name, value.trim()),
            Err(_) => debug!(header = %header.name, "Dropping non UTF-8 header value"),
        }
    }

    let mut body = Vec::new();
    req.body().read_to_end(&mut body)?;

    debug!(
        method = %parts.method,
        target = %parts.target,
        headers_count = parts.headers.len(),
        body_size_bytes = body.len(),
        "HTTP request parsed"
    );
    Ok(parts.body(body))
}

/// Parse a method token, rejecting anything `http` does not accept.
pub fn parse_method(raw: &str) -> io::Result<Method> {
    Method::from_bytes(raw.as_bytes()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid HTTP method {raw:?}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method() {
        assert_eq!(parse_method("GET").ok(), Some(Method::GET));
        assert_eq!(parse_method("PATCH").ok(), Some(Method::PATCH));
        let err = parse_method("BAD METHOD").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
