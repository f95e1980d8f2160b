use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::response::ResponseContext;

/// A named response formatter: sets the status, writes the payload and ends
/// the response.
pub type ResponseFormatter = Arc<dyn Fn(&ResponseContext, Value) + Send + Sync>;

/// Name → formatter table attached to every response at pipeline start.
#[derive(Clone)]
pub struct FormatterTable {
    formatters: HashMap<String, ResponseFormatter>,
}

impl FormatterTable {
    /// The five built-in formatters.
    pub const DEFAULTS: [(&'static str, u16); 5] = [
        ("ok", 200),
        ("badRequest", 400),
        ("notFound", 404),
        ("conflict", 409),
        ("serverError", 500),
    ];

    #[must_use]
    pub fn empty() -> Self {
        Self {
            formatters: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_defaults() -> Self {
        let mut table = Self::empty();
        for (name, status) in Self::DEFAULTS {
            table.insert(name, status_formatter(status));
        }
        table
    }

    /// Insert or replace a formatter. Returns `true` if the name was new.
    pub fn insert(&mut self, name: &str, formatter: ResponseFormatter) -> bool {
        self.formatters
            .insert(name.trim().to_string(), formatter)
            .is_none()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ResponseFormatter> {
        self.formatters.get(name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.formatters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for FormatterTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for FormatterTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatterTable")
            .field("formatters", &self.names())
            .finish()
    }
}

/// A formatter that sends its payload with a fixed status.
#[must_use]
pub fn status_formatter(status: u16) -> ResponseFormatter {
    Arc::new(move |response: &ResponseContext, data: Value| response.send(status, data))
}

/// Rendered body plus the content type it implies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub content_type: Option<&'static str>,
    pub body: Vec<u8>,
}

/// Strings are written verbatim, "empty" values (null, false, 0 and the
/// empty string) produce an empty body, anything else is serialized as JSON.
#[must_use]
pub fn render_payload(data: &Value) -> Payload {
    match data {
        Value::String(s) if !s.is_empty() => Payload {
            content_type: Some("text/plain; charset=utf-8"),
            body: s.as_bytes().to_vec(),
        },
        _ if is_empty_payload(data) => Payload {
            content_type: None,
            body: Vec::new(),
        },
        other => Payload {
            content_type: Some("application/json"),
            // Serializing a `Value` cannot fail.
            body: serde_json::to_vec(other).unwrap_or_default(),
        },
    }
}

fn is_empty_payload(data: &Value) -> bool {
    match data {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f == 0.0),
        _ => false,
    }
}
