//! Mock-override lookup.
//!
//! A mocked node may declare up to three overrides. Lookup order is
//! signature, then URL, then the flat default, then `{}`. Every hit is
//! returned as a clone so callers can mutate results without touching the
//! definition.

use serde_json::{Map, Value};

use crate::definition::{is_truthy, DEFAULT_MOCK_KEY, SIGNATURE_MOCK_KEY, URL_MOCK_KEY};
use crate::request::FinalRequest;

/// The mock overrides declared on one node. Falsy entries (`null`, `false`,
/// zero, `""`) count as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockOverrides {
    pub default: Option<Value>,
    pub by_url: Option<Map<String, Value>>,
    pub by_signature: Option<Map<String, Value>>,
}

fn object_entry(node: &Map<String, Value>, key: &str) -> Option<Map<String, Value>> {
    node.get(key).and_then(Value::as_object).cloned()
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|value| is_truthy(value))
}

impl MockOverrides {
    #[must_use]
    pub fn from_node(node: &Map<String, Value>) -> Self {
        Self {
            default: present(node.get(DEFAULT_MOCK_KEY)).cloned(),
            by_url: object_entry(node, URL_MOCK_KEY),
            by_signature: object_entry(node, SIGNATURE_MOCK_KEY),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.default.is_none() && self.by_url.is_none() && self.by_signature.is_none()
    }

    /// The flat default response, or `{}`.
    #[must_use]
    pub fn default_response(&self) -> Value {
        self.default
            .clone()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    /// Resolves the response for a concrete request.
    #[must_use]
    pub fn resolve(&self, request: &FinalRequest) -> Value {
        let by_signature = self
            .by_signature
            .as_ref()
            .and_then(|mocks| present(mocks.get(&request.signature())));
        let by_url = || {
            self.by_url
                .as_ref()
                .and_then(|mocks| present(mocks.get(&request.url)))
        };
        by_signature
            .or_else(by_url)
            .cloned()
            .unwrap_or_else(|| self.default_response())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn node(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn request(url: &str) -> FinalRequest {
        FinalRequest {
            url: url.to_string(),
            method: "GET".to_string(),
            headers: Map::new(),
            payload: None,
        }
    }

    #[test]
    fn signature_wins_over_url_and_default() {
        let mocks = MockOverrides::from_node(&node(json!({
            "mockResponse": "default",
            "smartMockResponse": {"/a": "url"},
            "superMockResponse": {r#"URI["/a"]Payload[null]Headers[{}]"#: "signature"}
        })));
        assert_eq!(mocks.resolve(&request("/a")), json!("signature"));
    }

    #[test]
    fn url_wins_over_default() {
        let mocks = MockOverrides::from_node(&node(json!({
            "mockResponse": "default",
            "smartMockResponse": {"/a": "url"}
        })));
        assert_eq!(mocks.resolve(&request("/a")), json!("url"));
        assert_eq!(mocks.resolve(&request("/b")), json!("default"));
    }

    #[test]
    fn no_match_and_no_default_is_empty_object() {
        let mocks = MockOverrides::from_node(&node(json!({"smartMockResponse": {"/a": 1}})));
        assert_eq!(mocks.resolve(&request("/z")), json!({}));
    }

    #[test]
    fn null_entries_fall_through() {
        let mocks = MockOverrides::from_node(&node(json!({
            "mockResponse": "default",
            "smartMockResponse": {"/a": null}
        })));
        assert_eq!(mocks.resolve(&request("/a")), json!("default"));
    }

    #[test]
    fn falsy_entries_fall_through() {
        let mocks = MockOverrides::from_node(&node(json!({
            "mockResponse": "default",
            "smartMockResponse": {"/a": 0, "/b": ""},
            "superMockResponse": {r#"URI["/a"]Payload[null]Headers[{}]"#: false}
        })));
        assert_eq!(mocks.resolve(&request("/a")), json!("default"));
        assert_eq!(mocks.resolve(&request("/b")), json!("default"));

        let mocks = MockOverrides::from_node(&node(json!({"mockResponse": false})));
        assert_eq!(mocks.default_response(), json!({}));
    }

    #[test]
    fn resolved_values_are_independent_copies() {
        let mocks = MockOverrides::from_node(&node(json!({"mockResponse": {"count": 1}})));
        let mut first = mocks.resolve(&request("/a"));
        first["count"] = json!(99);
        assert_eq!(mocks.resolve(&request("/a")), json!({"count": 1}));
    }

    #[test]
    fn emptiness_ignores_falsy_defaults() {
        assert!(MockOverrides::from_node(&node(json!({"mockResponse": null}))).is_empty());
        assert!(MockOverrides::from_node(&node(json!({"mockResponse": 0}))).is_empty());
        assert!(!MockOverrides::from_node(&node(json!({"mockResponse": []}))).is_empty());
    }
}
