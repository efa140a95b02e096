//! Body and header sanitization for traffic records
//!
//! Text is truncated first and masked second, so a sensitive value that
//! straddles the cut is masked in whatever prefix survives.
//!
//! ```
//! use trafficlens_extras::sanitization::Sanitizer;
//!
//! let sanitizer = Sanitizer::new(["token"]);
//! let masked = sanitizer.sanitize(r#"{"token": "abc", "x": 1}"#, 5000);
//! assert_eq!(masked, r#"{"token": "***MASKED***", "x": 1}"#);
//! ```

use http::HeaderMap;
use regex::Regex;
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Appended to text cut at the length cap.
pub const TRUNCATION_MARKER: &str = "...[truncated]";

/// Replaces masked header values and JSON string values.
pub const MASK: &str = "***MASKED***";

/// Cut `text` to at most `max_chars` characters, appending
/// [`TRUNCATION_MARKER`] when anything was removed.
pub fn truncate(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => Cow::Owned(format!("{}{}", &text[..cut], TRUNCATION_MARKER)),
        None => Cow::Borrowed(text),
    }
}

/// Whether `text` looks like human-readable content.
///
/// Text qualifies when fewer than 10% of its characters are control
/// characters other than `\n`, `\r` and `\t`. Empty text qualifies.
pub fn is_likely_text(text: &str) -> bool {
    let mut total = 0usize;
    let mut non_printable = 0usize;
    for c in text.chars() {
        total += 1;
        if (c as u32) < 32 && !matches!(c, '\n' | '\r' | '\t') {
            non_printable += 1;
        }
    }

    if total == 0 {
        return true;
    }
    (non_printable as f64 / total as f64) < 0.1
}

/// Precompiled masking rules for a set of sensitive field names.
///
/// Body masking targets JSON-style `"field": "value"` pairs whose key equals
/// a configured name (case-insensitive). Header masking replaces the value of
/// every header whose lowercased name contains a configured name.
#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    fields: Vec<String>,
    patterns: Vec<Regex>,
}

impl Sanitizer {
    /// Compile masking rules for `fields`.
    pub fn new(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut sanitizer = Self::default();
        for field in fields {
            let field = field.into().to_lowercase();
            if field.is_empty() || sanitizer.fields.contains(&field) {
                continue;
            }

            let pattern = format!(r#"(?i)("{}"\s*:\s*)"[^"]*""#, regex::escape(&field));
            match Regex::new(&pattern) {
                Ok(regex) => sanitizer.patterns.push(regex),
                Err(err) => {
                    tracing::warn!(field = %field, error = %err, "sensitive field pattern rejected");
                    continue;
                }
            }
            sanitizer.fields.push(field);
        }
        sanitizer
    }

    /// The configured field names, lowercased.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Replace the values of sensitive JSON string fields with [`MASK`].
    pub fn mask<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let replacement = format!("${{1}}\"{}\"", MASK);
        let mut out = Cow::Borrowed(text);
        for pattern in &self.patterns {
            let replaced = match pattern.replace_all(&out, replacement.as_str()) {
                Cow::Borrowed(_) => None,
                Cow::Owned(replaced) => Some(replaced),
            };
            if let Some(replaced) = replaced {
                out = Cow::Owned(replaced);
            }
        }
        out
    }

    /// Truncate to `max_chars`, then mask.
    pub fn sanitize(&self, text: &str, max_chars: usize) -> String {
        let truncated = truncate(text, max_chars);
        self.mask(&truncated).into_owned()
    }

    /// Whether `name` equals a configured field (case-insensitive).
    pub fn is_sensitive_field(&self, name: &str) -> bool {
        self.fields.iter().any(|field| field.eq_ignore_ascii_case(name))
    }

    /// Whether a header with this name has its value masked.
    pub fn is_sensitive_header(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.fields.iter().any(|field| name.contains(field.as_str()))
    }

    /// Render headers as a name to value map with sensitive values masked.
    ///
    /// Repeated headers are joined with `", "`. Non-UTF-8 values are decoded
    /// lossily.
    pub fn sanitize_headers(&self, headers: &HeaderMap) -> BTreeMap<String, String> {
        let mut out: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in headers {
            let name = name.as_str();
            let value = if self.is_sensitive_header(name) {
                Cow::Borrowed(MASK)
            } else {
                String::from_utf8_lossy(value.as_bytes())
            };

            match out.get_mut(name) {
                Some(existing) if existing != MASK => {
                    existing.push_str(", ");
                    existing.push_str(&value);
                }
                Some(_) => {}
                None => {
                    out.insert(name.to_string(), value.into_owned());
                }
            }
        }
        out
    }
}
