//! Compile-time request templates and the per-call final request.

use serde_json::{Map, Value};

use crate::payload::{transform_payload, with_default_content_type, Body};
use crate::template::{apply_prefix, method_url, replace_params, url_prefix};
use crate::types::{GlobalSettings, RequestObject};

/// Operation settings resolved once, when the definition is compiled.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestTemplate {
    /// Prefixed URL with global params already substituted.
    pub url: String,
    /// Prefix re-applied to relative URI overrides.
    pub prefix: String,
    /// Method as written in the definition; empty when absent.
    pub method: String,
    /// The operation's own default headers.
    pub headers: Option<Map<String, Value>>,
}

impl RequestTemplate {
    #[must_use]
    pub fn from_details(details: Option<&Value>, settings: &GlobalSettings) -> Self {
        let prefix = url_prefix(details, &settings.prefixes).to_string();
        let url = method_url(details, &prefix, settings.params());
        let method = details
            .and_then(|details| details.get("method"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let headers = details
            .and_then(|details| details.get("headers"))
            .and_then(Value::as_object)
            .cloned();
        Self {
            url,
            prefix,
            method,
            headers,
        }
    }

    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Builds the concrete request for one call.
    ///
    /// A relative `uri_override` gets the prefix re-applied. Call params are
    /// substituted into whichever URL is used, call headers are merged over
    /// the defaulted operation headers, and the payload is transformed using
    /// the defaulted operation headers.
    #[must_use]
    pub fn finalize(&self, request: Option<&RequestObject>) -> FinalRequest {
        let uri = match request.and_then(RequestObject::uri_override) {
            Some(uri_override) => apply_prefix(&self.prefix, uri_override),
            None => self.url.clone(),
        };
        let url = replace_params(&uri, request.and_then(|request| request.params.as_ref()));

        let defaulted = with_default_content_type(&self.method, self.headers.as_ref());
        let payload = transform_payload(&defaulted, request.and_then(|request| request.payload.as_ref()));

        let mut headers = defaulted;
        if let Some(dynamic) = request.and_then(|request| request.headers.as_ref()) {
            for (name, value) in dynamic {
                headers.insert(name.clone(), value.clone());
            }
        }

        FinalRequest {
            url,
            method: self.method.clone(),
            headers,
            payload,
        }
    }
}

/// The fully resolved request for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalRequest {
    pub url: String,
    pub method: String,
    pub headers: Map<String, Value>,
    pub payload: Option<Body>,
}

impl FinalRequest {
    /// The key used for signature-based mock lookup:
    /// `URI[<json url>]Payload[<json payload>]Headers[<json headers>]`.
    #[must_use]
    pub fn signature(&self) -> String {
        let payload = self
            .payload
            .as_ref()
            .map_or_else(|| "null".to_string(), Body::signature_json);
        format!(
            "URI[{}]Payload[{}]Headers[{}]",
            Value::String(self.url.clone()),
            payload,
            Value::Object(self.headers.clone()),
        )
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::payload::{CONTENT_TYPE_HEADER, JSON_CONTENT_TYPE};

    fn settings() -> GlobalSettings {
        GlobalSettings::default()
            .with_prefix("default", "https://api.example.com")
            .with_param("tenant", "acme")
    }

    #[test]
    fn template_resolves_prefix_and_global_params() {
        let details = json!({"url": "/:tenant/users/:id", "method": "GET"});
        let template = RequestTemplate::from_details(Some(&details), &settings());
        assert_eq!(template.url, "https://api.example.com/acme/users/:id");
        assert_eq!(template.method, "GET");
    }

    #[test]
    fn finalize_substitutes_call_params() {
        let details = json!({"url": "/users/:id", "method": "GET"});
        let template = RequestTemplate::from_details(Some(&details), &settings());
        let request = RequestObject::new().with_param("id", 42);
        let final_request = template.finalize(Some(&request));
        assert_eq!(final_request.url, "https://api.example.com/users/42");
        assert!(final_request.headers.is_empty());
        assert!(final_request.payload.is_none());
    }

    #[test]
    fn relative_override_gets_prefix() {
        let details = json!({"url": "/users/:id", "method": "GET"});
        let template = RequestTemplate::from_details(Some(&details), &settings());
        let request = RequestObject::new()
            .with_uri_override("/people/:id")
            .with_param("id", 1);
        assert_eq!(
            template.finalize(Some(&request)).url,
            "https://api.example.com/people/1"
        );
    }

    #[test]
    fn absolute_override_is_used_as_is() {
        let details = json!({"url": "/users", "method": "GET"});
        let template = RequestTemplate::from_details(Some(&details), &settings());
        let request = RequestObject::new().with_uri_override("http://other/x");
        assert_eq!(template.finalize(Some(&request)).url, "http://other/x");
    }

    #[test]
    fn call_headers_override_operation_headers() {
        let details = json!({
            "url": "/users",
            "method": "POST",
            "headers": {"X-A": "op", "X-B": "op"}
        });
        let template = RequestTemplate::from_details(Some(&details), &settings());
        let request = RequestObject::new()
            .with_header("X-B", "call")
            .with_payload(json!({"name": "A"}));
        let final_request = template.finalize(Some(&request));

        assert_eq!(final_request.headers["X-A"], json!("op"));
        assert_eq!(final_request.headers["X-B"], json!("call"));
        assert_eq!(final_request.headers[CONTENT_TYPE_HEADER], json!(JSON_CONTENT_TYPE));
        assert_eq!(final_request.payload, Some(Body::Text(r#"{"name":"A"}"#.to_string())));
    }

    #[test]
    fn payload_uses_operation_headers_not_call_headers() {
        let details = json!({"url": "/users", "method": "POST"});
        let template = RequestTemplate::from_details(Some(&details), &settings());
        let request = RequestObject::new()
            .with_header("Content-Type", "text/plain")
            .with_payload(json!({"a": 1}));
        let final_request = template.finalize(Some(&request));
        assert_eq!(final_request.payload, Some(Body::Text(r#"{"a":1}"#.to_string())));
        assert_eq!(final_request.headers[CONTENT_TYPE_HEADER], json!("text/plain"));
    }

    #[test]
    fn signature_matches_documented_shape() {
        let settings = GlobalSettings::default();
        let details = json!({
            "url": "sub.site.com:8080/path/:id",
            "method": "GET",
            "headers": {"Content-Type": "multipart/form-data"}
        });
        let template = RequestTemplate::from_details(Some(&details), &settings);
        let request = RequestObject::new().with_param("id", 7);
        assert_eq!(
            template.finalize(Some(&request)).signature(),
            r#"URI["sub.site.com:8080/path/7"]Payload[null]Headers[{"Content-Type":"multipart/form-data"}]"#
        );
    }

    #[test]
    fn missing_details_give_an_empty_template() {
        let template = RequestTemplate::from_details(None, &GlobalSettings::default());
        assert_eq!(template.url, "");
        assert_eq!(template.method, "");
        assert!(template.headers.is_none());
    }
}
