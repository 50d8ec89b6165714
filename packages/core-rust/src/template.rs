//! URL templating: prefix resolution, `:name` parameter substitution and
//! URI-component encoding.

use std::collections::HashMap;
use std::sync::LazyLock;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

/// Prefix-type used when an operation names none.
pub const DEFAULT_PREFIX_TYPE: &str = "default";

/// Everything except `A-Z a-z 0-9 - _ . ! ~ * ' ( )` is escaped.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

static ABSOLUTE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+://").expect("absolute URL pattern is valid"));

/// Returns `true` when `url` starts with a `scheme://` marker.
#[must_use]
pub fn is_absolute_url(url: &str) -> bool {
    ABSOLUTE_URL.is_match(url)
}

/// Percent-encodes a single URI component.
#[must_use]
pub fn encode_uri_component(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT).to_string()
}

/// Looks up the prefix for an operation's `prefixType`, falling back to the
/// `default` entry and then to the empty string.
#[must_use]
pub fn url_prefix<'a>(details: Option<&Value>, prefixes: &'a HashMap<String, String>) -> &'a str {
    let prefix_type = details
        .and_then(|details| details.get("prefixType"))
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_PREFIX_TYPE);
    prefixes.get(prefix_type).map_or("", String::as_str)
}

/// Prepends `prefix` unless `url` is already absolute.
#[must_use]
pub fn apply_prefix(prefix: &str, url: &str) -> String {
    if is_absolute_url(url) {
        url.to_string()
    } else {
        format!("{prefix}{url}")
    }
}

/// Stringifies a JSON value the way a URL or form field would print it.
///
/// Arrays join their elements with `,`, `null` inside arrays prints as the
/// empty string, and objects print as `[object Object]`.
#[must_use]
pub fn js_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(js_string).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Encodes a parameter value for inclusion in a URL.
///
/// `null`, missing and object values cannot be represented and become the
/// empty string with a warning; everything else is stringified and encoded.
#[must_use]
pub fn smart_encode_param(name: &str, value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => {
            warn!(param = name, "null value for URL parameter, substituting empty string");
            String::new()
        }
        Some(Value::Object(_)) => {
            warn!(param = name, "object value cannot be URI-encoded, substituting empty string");
            String::new()
        }
        Some(other) => encode_uri_component(&js_string(other)),
    }
}

/// Replaces the first `:name` token for every entry in `params`.
///
/// A token only matches when the character after the name cannot continue an
/// identifier, so `:id` leaves `:identifier` alone. Tokens with no matching
/// param are kept verbatim.
#[must_use]
pub fn replace_params(template: &str, params: Option<&Map<String, Value>>) -> String {
    let Some(params) = params else {
        return template.to_string();
    };
    let mut url = template.to_string();
    for (name, value) in params {
        if let Some(start) = find_token(&url, name) {
            let encoded = smart_encode_param(name, Some(value));
            url.replace_range(start..start + name.len() + 1, &encoded);
        }
    }
    url
}

fn find_token(haystack: &str, name: &str) -> Option<usize> {
    let token = format!(":{name}");
    haystack.match_indices(&token).map(|(index, _)| index).find(|index| {
        haystack[index + token.len()..]
            .chars()
            .next()
            .is_none_or(|next| !(next.is_ascii_alphanumeric() || next == '_'))
    })
}

/// Resolves an operation URL at compile time: prefix first, then the global
/// params.
#[must_use]
pub fn method_url(details: Option<&Value>, prefix: &str, params: Option<&Map<String, Value>>) -> String {
    let url = details
        .and_then(|details| details.get("url"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    replace_params(&apply_prefix(prefix, url), params)
}
