//! Content-type defaulting and payload transformation.

use serde_json::{Map, Value};

use crate::template::{encode_uri_component, js_string, smart_encode_param};

pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const ENCTYPE_HEADER: &str = "enctype";

pub const JSON_CONTENT_TYPE: &str = "application/json;charset=UTF-8";
pub const URL_ENCODED_CONTENT_TYPE: &str = "application/x-www-form-urlencoded;charset=utf-8";
pub const FORM_DATA_CONTENT_TYPE: &str = "multipart/form-data";

/// A request body ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Serialized text: JSON or a url-encoded query string.
    Text(String),
    /// Multipart form fields, in payload order.
    Form(Vec<(String, String)>),
    /// Payload passed through untouched for an unrecognised content type.
    Raw(Value),
}

impl Body {
    /// JSON rendering used inside request signatures.
    ///
    /// Form bodies have no inspectable content and render as `{}`.
    #[must_use]
    pub fn signature_json(&self) -> String {
        match self {
            Self::Text(text) => Value::String(text.clone()).to_string(),
            Self::Form(_) => "{}".to_string(),
            Self::Raw(value) => value.to_string(),
        }
    }
}

fn truthy_str<'a>(headers: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    headers
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

/// The effective content type: `Content-Type`, else `enctype`.
#[must_use]
pub fn content_type(headers: &Map<String, Value>) -> Option<&str> {
    truthy_str(headers, CONTENT_TYPE_HEADER).or_else(|| truthy_str(headers, ENCTYPE_HEADER))
}

/// Copies `headers`, adding the JSON content type for PUT and POST when
/// neither `Content-Type` nor `enctype` is set.
#[must_use]
pub fn with_default_content_type(method: &str, headers: Option<&Map<String, Value>>) -> Map<String, Value> {
    let mut headers = headers.cloned().unwrap_or_default();
    if matches!(method, "PUT" | "POST") && content_type(&headers).is_none() {
        headers.insert(
            CONTENT_TYPE_HEADER.to_string(),
            Value::String(JSON_CONTENT_TYPE.to_string()),
        );
    }
    headers
}

/// Renders an object as `key=value&...`, with spaces as `+`.
#[must_use]
pub fn to_query_string(data: &Map<String, Value>) -> String {
    data.iter()
        .map(|(key, value)| format!("{}={}", encode_uri_component(key), smart_encode_param(key, Some(value))))
        .collect::<Vec<_>>()
        .join("&")
        .replace("%20", "+")
}

fn to_form_fields(data: &Map<String, Value>) -> Vec<(String, String)> {
    data.iter()
        .map(|(key, value)| (key.clone(), js_string(value)))
        .collect()
}

/// Transforms a call payload according to the (defaulted) headers.
///
/// `None` and `null` payloads produce no body. Form encodings only apply to
/// object payloads; anything else is passed through.
#[must_use]
pub fn transform_payload(headers: &Map<String, Value>, payload: Option<&Value>) -> Option<Body> {
    let payload = payload.filter(|payload| !payload.is_null())?;
    let body = match (content_type(headers), payload) {
        (Some(URL_ENCODED_CONTENT_TYPE), Value::Object(data)) => Body::Text(to_query_string(data)),
        (Some(JSON_CONTENT_TYPE), payload) => Body::Text(payload.to_string()),
        (Some(FORM_DATA_CONTENT_TYPE), Value::Object(data)) => Body::Form(to_form_fields(data)),
        (_, payload) => Body::Raw(payload.clone()),
    };
    Some(body)
}
