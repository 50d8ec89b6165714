//! Definition document vocabulary and node classification.
//!
//! A definition document is a JSON object tree. Keys listed here are reserved:
//! they configure the node they appear on and are never traversed as child
//! nodes.

use serde_json::{Map, Value};

/// Transport-specific operation settings (URL, method, SQL text, ...).
pub const OPERATION_KEY: &str = "operationDetails";

/// Name of the transport module handling a node; inherited by children.
pub const MODULE_KEY: &str = "asyncModule";

/// Flat mock response returned regardless of the request.
pub const DEFAULT_MOCK_KEY: &str = "mockResponse";

/// Mock responses keyed by the fully resolved URL.
pub const URL_MOCK_KEY: &str = "smartMockResponse";

/// Mock responses keyed by the URL + payload + headers signature.
pub const SIGNATURE_MOCK_KEY: &str = "superMockResponse";

pub const MOCK_KEYS: [&str; 3] = [DEFAULT_MOCK_KEY, URL_MOCK_KEY, SIGNATURE_MOCK_KEY];

/// Returns `true` for keys that hold settings rather than child nodes.
#[must_use]
pub fn is_reserved_key(key: &str) -> bool {
    key == OPERATION_KEY || MOCK_KEYS.contains(&key)
}

/// Returns `true` when `value` under `key` may be an operation or a container.
#[must_use]
pub fn is_candidate(key: &str, value: &Value) -> bool {
    value.is_object() && !is_reserved_key(key)
}

/// Returns the node's own module name, ignoring empty or non-string values.
#[must_use]
pub fn module_name(node: &Map<String, Value>) -> Option<&str> {
    node.get(MODULE_KEY)
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
}

/// Returns the node's own `operationDetails`, ignoring `null`.
#[must_use]
pub fn operation_details(node: &Map<String, Value>) -> Option<&Value> {
    node.get(OPERATION_KEY).filter(|details| !details.is_null())
}

/// Returns `false` for `null`, `false`, numeric zero and the empty string. Objects and arrays are always truthy, even when empty.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n.abs() > 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Returns `true` when any of the three mock-override keys is present.
#[must_use]
pub fn contains_mock_response(node: &Map<String, Value>) -> bool {
    MOCK_KEYS.iter().any(|key| node.contains_key(*key))
}

/// How the compiler treats a candidate node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Compiled to a real transport call.
    Operation,
    /// Compiled to a mock response function; never reaches the transport.
    Mock,
    /// Organisational nesting, traversed recursively.
    Container,
}

/// A definition node paired with its effective (own or inherited) module.
#[derive(Debug, Clone, Copy)]
pub struct NodeView<'a> {
    node: &'a Map<String, Value>,
    module: Option<&'a str>,
}

impl<'a> NodeView<'a> {
    /// Resolves the effective module: the node's own name wins, otherwise the
    /// parent's effective module is inherited.
    #[must_use]
    pub fn new(node: &'a Map<String, Value>, inherited_module: Option<&'a str>) -> Self {
        Self {
            node,
            module: module_name(node).or(inherited_module),
        }
    }

    #[must_use]
    pub fn node(&self) -> &'a Map<String, Value> {
        self.node
    }

    #[must_use]
    pub fn module(&self) -> Option<&'a str> {
        self.module
    }

    #[must_use]
    pub fn details(&self) -> Option<&'a Value> {
        operation_details(self.node)
    }

    /// Leaves carry either a module plus details, or a default mock response.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        let has_default_mock = self
            .node
            .get(DEFAULT_MOCK_KEY)
            .is_some_and(is_truthy);
        (self.module.is_some() && self.details().is_some()) || has_default_mock
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        if !self.is_leaf() {
            NodeKind::Container
        } else if contains_mock_response(self.node) {
            NodeKind::Mock
        } else {
            NodeKind::Operation
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn reserved_keys_are_not_candidates() {
        assert!(!is_candidate(OPERATION_KEY, &json!({"url": "/a"})));
        assert!(!is_candidate(URL_MOCK_KEY, &json!({"/a": {}})));
        assert!(!is_candidate(SIGNATURE_MOCK_KEY, &json!({})));
        assert!(is_candidate("users", &json!({})));
    }

    #[test]
    fn non_objects_are_not_candidates() {
        assert!(!is_candidate("name", &json!("http")));
        assert!(!is_candidate("list", &json!([1, 2])));
        assert!(!is_candidate("nothing", &Value::Null));
    }

    #[test]
    fn module_and_details_make_an_operation() {
        let node = object(json!({"asyncModule": "http", "operationDetails": {"url": "/a"}}));
        assert_eq!(NodeView::new(&node, None).kind(), NodeKind::Operation);
    }

    #[test]
    fn inherited_module_with_details_makes_an_operation() {
        let node = object(json!({"operationDetails": {"url": "/a"}}));
        let view = NodeView::new(&node, Some("http"));
        assert_eq!(view.module(), Some("http"));
        assert_eq!(view.kind(), NodeKind::Operation);
    }

    #[test]
    fn own_module_overrides_inherited() {
        let node = object(json!({"asyncModule": "file"}));
        assert_eq!(NodeView::new(&node, Some("http")).module(), Some("file"));
    }

    #[test]
    fn module_without_details_is_a_container() {
        let node = object(json!({"asyncModule": "http", "child": {}}));
        assert_eq!(NodeView::new(&node, None).kind(), NodeKind::Container);
    }

    #[test]
    fn default_mock_alone_makes_a_mock_leaf() {
        let node = object(json!({"mockResponse": "foo"}));
        assert_eq!(NodeView::new(&node, None).kind(), NodeKind::Mock);
    }

    #[test]
    fn any_mock_key_wins_over_details() {
        let node = object(json!({
            "asyncModule": "http",
            "operationDetails": {"url": "/a"},
            "smartMockResponse": {"/a": {"ok": true}}
        }));
        assert_eq!(NodeView::new(&node, None).kind(), NodeKind::Mock);
    }

    #[test]
    fn url_mock_without_module_or_default_is_a_container() {
        let node = object(json!({"smartMockResponse": {"/a": {}}}));
        assert_eq!(NodeView::new(&node, None).kind(), NodeKind::Container);
    }

    #[test]
    fn falsy_default_mock_does_not_make_a_leaf() {
        for mock in [json!(0), json!(""), json!(false), Value::Null] {
            let node = object(json!({"mockResponse": mock}));
            assert_eq!(NodeView::new(&node, None).kind(), NodeKind::Container, "{mock}");
        }
        let node = object(json!({"mockResponse": []}));
        assert_eq!(NodeView::new(&node, None).kind(), NodeKind::Mock);
    }

    #[test]
    fn truthiness() {
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!("0")));
        assert!(is_truthy(&json!(-1)));
        assert!(is_truthy(&json!({})));
    }

    #[test]
    fn null_details_and_empty_module_are_ignored() {
        let node = object(json!({"asyncModule": "", "operationDetails": null}));
        let view = NodeView::new(&node, None);
        assert!(view.module().is_none());
        assert!(view.details().is_none());
        assert_eq!(view.kind(), NodeKind::Container);
    }
}
