//! HTTP transport with fetch-style semantics.
//!
//! Statuses in `[200, 400)` resolve with the body parsed as JSON, or with the
//! raw text when it is not JSON. Any other status is a failure carrying the
//! status and body.

use std::sync::Arc;

use futures_util::future::{self, FutureExt};
use request_builder_core::definition::operation_details;
use request_builder_core::payload::{CONTENT_TYPE_HEADER, ENCTYPE_HEADER};
use request_builder_core::template::js_string;
use request_builder_core::{Body, FinalRequest, Method, MockOverrides, RequestObject, RequestTemplate};
use reqwest::multipart::Form;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::config::HttpConfig;
use crate::error::OperationError;
use crate::module::{failing_fn, AsyncFn, AsyncModule, ModuleContext};

pub struct HttpModule {
    client: reqwest::Client,
}

impl HttpModule {
    pub const NAME: &'static str = "http";

    #[must_use]
    pub fn new(config: &HttpConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "failed to build configured HTTP client, using defaults");
                reqwest::Client::new()
            });
        Self { client }
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl AsyncModule for HttpModule {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn async_fn(
        &self,
        details: &Value,
        _parent_details: Option<&Value>,
        ctx: &ModuleContext,
    ) -> Option<AsyncFn> {
        let template = RequestTemplate::from_details(Some(details), ctx.settings());
        let has_url = details
            .get("url")
            .and_then(Value::as_str)
            .is_some_and(|url| !url.is_empty());
        let template = if template.method.is_empty() && has_url {
            template.with_method(Method::Get.as_str())
        } else {
            template
        };

        let Some(method) = Method::from_name(&template.method) else {
            let method = if template.method.is_empty() {
                "undefined".to_string()
            } else {
                template.method
            };
            return Some(failing_fn(OperationError::InvalidMethod { method }));
        };

        let client = self.client.clone();
        let template = Arc::new(template);
        Some(Arc::new(move |request: RequestObject| {
            let final_request = template.finalize(Some(&request));
            send(client.clone(), method, final_request).boxed()
        }))
    }

    fn mock_response_fn(&self, node: &Map<String, Value>, ctx: &ModuleContext) -> Option<AsyncFn> {
        let template = Arc::new(RequestTemplate::from_details(
            operation_details(node),
            ctx.settings(),
        ));
        let mocks = Arc::new(MockOverrides::from_node(node));
        Some(Arc::new(move |request: RequestObject| {
            let final_request = template.finalize(Some(&request));
            let response = mocks.resolve(&final_request);
            info!(
                url = %final_request.url,
                request = ?final_request,
                response = %response,
                "mock response"
            );
            future::ready(Ok(response)).boxed()
        }))
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Put => reqwest::Method::PUT,
        Method::Post => reqwest::Method::POST,
        Method::Delete => reqwest::Method::DELETE,
    }
}

async fn send(client: reqwest::Client, method: Method, request: FinalRequest) -> Result<Value, OperationError> {
    let FinalRequest {
        url,
        headers,
        payload,
        ..
    } = request;
    let is_form = matches!(payload, Some(Body::Form(_)));

    let mut builder = client.request(to_reqwest(method), &url);
    for (name, value) in &headers {
        // multipart bodies carry their own boundary-bearing content type
        if is_form
            && (name.eq_ignore_ascii_case(CONTENT_TYPE_HEADER) || name.eq_ignore_ascii_case(ENCTYPE_HEADER))
        {
            continue;
        }
        builder = builder.header(name.as_str(), js_string(value));
    }
    builder = match payload {
        None => builder,
        Some(Body::Text(text)) => builder.body(text),
        Some(Body::Form(fields)) => {
            let form = fields
                .into_iter()
                .fold(Form::new(), |form, (name, value)| form.text(name, value));
            builder.multipart(form)
        }
        Some(Body::Raw(Value::String(text))) => builder.body(text),
        Some(Body::Raw(value)) => builder.body(value.to_string()),
    };

    let response = builder.send().await.map_err(|err| {
        error!(url = %url, error = %err, "unable to make HTTP request");
        OperationError::transport(HttpModule::NAME, &err)
    })?;

    let status = response.status();
    let text = response.text().await.map_err(|err| {
        error!(url = %url, error = %err, "unable to read HTTP response body");
        OperationError::transport(HttpModule::NAME, &err)
    })?;

    if (200..400).contains(&status.as_u16()) {
        Ok(parse_body(&url, text))
    } else {
        Err(OperationError::Status {
            url,
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body: text,
        })
    }
}

fn parse_body(url: &str, text: String) -> Value {
    match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(_) => {
            info!(url, "response is not JSON, returning the raw text");
            Value::String(text)
        }
    }
}
