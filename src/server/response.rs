use dashmap::DashMap;
use may_minihttp::Response;
use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::context::FinalResponse;

/// Most distinct header lines the process-wide interner keeps.
pub const HEADER_INTERN_CAP: usize = 1024;

/// Header slots `may_minihttp` has per response.
pub const MAX_RESPONSE_HEADERS: usize = 16;

/// `may_minihttp` takes header lines as `&'static str`. Repeated lines such
/// as content types are leaked once into this map and reused. Growth stops at
/// [`HEADER_INTERN_CAP`]; concurrent inserts may overshoot it by at most one
/// line per racing thread.
static HEADER_LINES: Lazy<DashMap<String, &'static str>> = Lazy::new(DashMap::new);

pub fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// Interned `Name: value` line, or `None` once the interner is full and the
/// line is not already in it.
pub(crate) fn interned_line(line: &str) -> Option<&'static str> {
    if let Some(interned) = HEADER_LINES.get(line) {
        return Some(*interned);
    }
    if HEADER_LINES.len() >= HEADER_INTERN_CAP {
        return None;
    }
    Some(
        *HEADER_LINES
            .entry(line.to_string())
            .or_insert_with(|| Box::leak(line.to_string().into_boxed_str())),
    )
}

/// Number of interned header lines.
#[must_use]
pub fn interned_lines() -> usize {
    HEADER_LINES.len()
}

/// Header lines owned by one connection, for values the interner does not
/// keep. Lines stay alive until the next response on the connection starts.
#[derive(Default)]
pub(crate) struct HeaderScratch {
    lines: Vec<Box<str>>,
}

impl HeaderScratch {
    pub(crate) fn clear(&mut self) {
        self.lines.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lines.len()
    }

    /// # Safety
    ///
    /// The returned reference is valid only until the next [`clear`] or the
    /// drop of this scratch space.
    ///
    /// [`clear`]: HeaderScratch::clear
    #[allow(unsafe_code)]
    unsafe fn hold(&mut self, line: String) -> &'static str {
        let line = line.into_boxed_str();
        let ptr: *const str = &*line;
        self.lines.push(line);
        // SAFETY: the boxed str never moves while it sits in `lines`; the
        // caller bounds the use of the reference.
        unsafe { &*ptr }
    }

    /// # Safety
    ///
    /// See [`HeaderScratch::hold`].
    #[allow(unsafe_code)]
    unsafe fn line(&mut self, name: &str, value: &str) -> &'static str {
        let line = format!("{name}: {value}");
        match interned_line(&line) {
            Some(interned) => interned,
            None => {
                debug!(header = %name, "Header interner full, holding line per connection");
                // SAFETY: forwarded to the caller.
                unsafe { self.hold(line) }
            }
        }
    }
}

/// Write an ended response to the transport. The transport adds
/// `Content-Length` itself, so a stored one is skipped. Headers beyond the
/// transport's slots are dropped with a warning.
///
/// # Safety
///
/// `res` must be encoded before `scratch` is cleared or dropped.
/// `may_minihttp` encodes each response as soon as `call` returns, so a
/// scratch owned by the per-connection service and cleared at the start of
/// the next `call` satisfies this.
#[allow(unsafe_code)]
pub(crate) unsafe fn write_final(
    res: &mut Response,
    reply: FinalResponse,
    scratch: &mut HeaderScratch,
) {
    res.status_code(usize::from(reply.status), status_reason(reply.status));
    let mut written = 0;
    for (name, value) in &reply.headers {
        if name.eq_ignore_ascii_case("content-length") {
            continue;
        }
        if written == MAX_RESPONSE_HEADERS {
            warn!(header = %name, limit = MAX_RESPONSE_HEADERS, "Too many response headers, dropping");
            continue;
        }
        // SAFETY: forwarded to the caller.
        res.header(unsafe { scratch.line(name, value) });
        written += 1;
    }
    res.body_vec(reply.body);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_reason() {
        assert_eq!(status_reason(200), "OK");
        assert_eq!(status_reason(404), "Not Found");
        assert_eq!(status_reason(409), "Conflict");
        assert_eq!(status_reason(599), "Unknown");
    }

    #[test]
    fn test_header_lines_are_interned() {
        let a = interned_line("Content-Type: text/css").expect("room");
        let b = interned_line("Content-Type: text/css").expect("room");
        assert_eq!(a, "Content-Type: text/css");
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    #[allow(unsafe_code)]
    fn test_distinct_values_never_grow_interner_past_cap() {
        // Shared with `test_header_lines_are_interned`; interned before filling.
        assert!(interned_line("Content-Type: text/css").is_some());
        let mut scratch = HeaderScratch::default();
        for i in 0..HEADER_INTERN_CAP + 200 {
            let value = format!("01ARZ3NDEKTSV4RRFFQ69G{i:04}");
            // SAFETY: the line is compared before the scratch is cleared.
            let line = unsafe { scratch.line("X-Request-Id", &value) };
            assert_eq!(line, format!("X-Request-Id: {value}"));
            assert!(interned_lines() <= HEADER_INTERN_CAP);
        }
        assert_eq!(interned_lines(), HEADER_INTERN_CAP);
        assert!(scratch.len() >= 200);
        scratch.clear();
        assert_eq!(scratch.len(), 0);

        // Lines interned before the cap was reached keep being shared.
        let shared = interned_line("Content-Type: text/css").expect("interned before the cap");
        assert_eq!(shared, "Content-Type: text/css");
    }
}
