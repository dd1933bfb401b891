//! Cache key derivation.

use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

/// Identity of a cached query: endpoint name plus canonical arguments.
///
/// Rendered as `endpoint(canonical-json)`. Object keys are sorted
/// recursively and `null` fields are dropped, so two argument values that
/// differ only in construction order (or in explicitly-`None` options) map to
/// the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Arc<str>);

impl CacheKey {
    /// Key for `endpoint` called with already-serialized `args`.
    #[must_use]
    pub fn new(endpoint: &str, args: &Value) -> Self {
        let mut rendered = String::with_capacity(endpoint.len() + 16);
        rendered.push_str(endpoint);
        rendered.push('(');
        if !args.is_null() {
            write_canonical(args, &mut rendered);
        }
        rendered.push(')');
        Self(rendered.into())
    }

    /// Key for `endpoint` called with `args`.
    ///
    /// # Errors
    ///
    /// Returns an error if `args` cannot be serialized to JSON.
    pub fn for_args<A: Serialize + ?Sized>(
        endpoint: &str,
        args: &A,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(endpoint, &serde_json::to_value(args)?))
    }

    /// The endpoint part of the key.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.0.split_once('(').map_or(self.as_str(), |(name, _)| name)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<_> = map.iter().filter(|(_, v)| !v.is_null()).collect();
            fields.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));

            out.push('{');
            for (i, (name, field)) in fields.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(name, out);
                out.push(':');
                write_canonical(field, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::String(s) => write_string(s, out),
        scalar => {
            let _ = write!(out, "{scalar}");
        }
    }
}

fn write_string(s: &str, out: &mut String) {
    // Display for a JSON string value produces the quoted, escaped form.
    let _ = write!(out, "{}", Value::String(s.to_string()));
}
