//! `application/x-www-form-urlencoded` query strings.
//!
//! Parsing decodes `+` and percent escapes; building encodes everything but
//! ASCII alphanumerics and `-_.`, with spaces written as `+`. A query that is
//! parsed and rebuilt therefore has a single canonical spelling.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Bytes escaped in query keys and values. Space is handled separately.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b' ');

/// Decoded key/value pairs in their original order.
pub type Pairs = Vec<(String, String)>;

/// Parse a query string (without the leading `?`). Empty segments are skipped;
/// a segment without `=` has an empty value.
#[must_use]
pub fn parse(query: &str) -> Pairs {
    query
        .split('&')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let (key, value) = segment.split_once('=').unwrap_or((segment, ""));
            (decode(key), decode(value))
        })
        .collect()
}

/// Build a query string from pairs.
pub fn build<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut out = String::new();
    for (key, value) in pairs {
        if !out.is_empty() {
            out.push('&');
        }
        out.push_str(&encode(key.as_ref()));
        out.push('=');
        out.push_str(&encode(value.as_ref()));
    }
    out
}

/// Remove every pair named `name`, returning the value of the last one.
pub fn take(pairs: &mut Pairs, name: &str) -> Option<String> {
    let last = pairs
        .iter()
        .rev()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.clone());
    pairs.retain(|(key, _)| key != name);
    last
}

fn decode(component: &str) -> String {
    let spaced = component.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

fn encode(component: &str) -> String {
    utf8_percent_encode(component, COMPONENT)
        .to_string()
        .replace(' ', "+")
}
