use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Arguments for a single invocation of a compiled operation.
///
/// Every field is optional; an operation invoked with `RequestObject::default()`
/// falls back to whatever it resolved at compile time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestObject {
    /// Values for `:name` tokens in URLs and SQL text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
    /// Request body, transformed according to the operation's content type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Headers merged over the operation's default headers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Map<String, Value>>,
    /// Replaces the operation's templated URL for this call only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri_override: Option<String>,
}

impl RequestObject {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params
            .get_or_insert_with(Map::new)
            .insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = Some(params);
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Map::new)
            .insert(name.into(), Value::String(value.into()));
        self
    }

    #[must_use]
    pub fn with_uri_override(mut self, uri: impl Into<String>) -> Self {
        self.uri_override = Some(uri.into());
        self
    }

    /// The override URI, ignoring empty strings.
    #[must_use]
    pub fn uri_override(&self) -> Option<&str> {
        self.uri_override.as_deref().filter(|uri| !uri.is_empty())
    }
}

impl fmt::Display for RequestObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{self:?}"),
        }
    }
}

/// Settings shared by every operation of one compiled tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalSettings {
    /// Prefix-type name -> base URL. The `default` entry applies when an
    /// operation names no `prefixType`.
    #[serde(default)]
    pub prefixes: HashMap<String, String>,
    /// Default parameter values, used when a call site omits its own.
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl GlobalSettings {
    #[must_use]
    pub fn with_prefix(mut self, prefix_type: impl Into<String>, url: impl Into<String>) -> Self {
        self.prefixes.insert(prefix_type.into(), url.into());
        self
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Global params as an optional map, `None` when empty.
    #[must_use]
    pub fn params(&self) -> Option<&Map<String, Value>> {
        (!self.params.is_empty()).then_some(&self.params)
    }
}

/// HTTP methods accepted by network transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
}

impl Method {
    /// Parses an exact, upper-case method name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "GET" => Some(Self::Get),
            "PUT" => Some(Self::Put),
            "POST" => Some(Self::Post),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_object_deserializes_camel_case() {
        let request: RequestObject = serde_json::from_value(json!({
            "params": {"id": "7"},
            "payload": {"name": "A"},
            "headers": {"X-Trace": "abc"},
            "uriOverride": "/other/:id"
        }))
        .unwrap();

        assert_eq!(request.params.unwrap()["id"], json!("7"));
        assert_eq!(request.payload, Some(json!({"name": "A"})));
        assert_eq!(request.uri_override.as_deref(), Some("/other/:id"));
    }

    #[test]
    fn empty_uri_override_is_ignored() {
        let request = RequestObject::new().with_uri_override("");
        assert!(request.uri_override().is_none());
    }

    #[test]
    fn builder_methods_accumulate() {
        let request = RequestObject::new()
            .with_param("a", 1)
            .with_param("b", "two")
            .with_header("Accept", "text/plain");
        let params = request.params.unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(request.headers.unwrap()["Accept"], json!("text/plain"));
    }

    #[test]
    fn global_settings_defaults_are_empty() {
        let settings: GlobalSettings = serde_json::from_value(json!({})).unwrap();
        assert!(settings.prefixes.is_empty());
        assert!(settings.params().is_none());
    }

    #[test]
    fn method_parses_only_exact_names() {
        assert_eq!(Method::from_name("POST"), Some(Method::Post));
        assert_eq!(Method::from_name("post"), None);
        assert_eq!(Method::from_name("PATCH"), None);
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }
}
