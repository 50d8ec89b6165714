//! Entry points: compile a definition document into a [`CompiledTree`].

use serde_json::Value;
use tracing::info;

use crate::compiler::{compile, CompiledTree};
use crate::config::BuilderConfig;
use crate::pending::PendingRequests;
use crate::registry::ModuleCatalog;

/// Compiles definitions against a fixed module catalog.
///
/// Every [`build`](Self::build) gets its own module registry, so two trees
/// never share module instances or pooled connections. Pending operations
/// are tracked per tree unless a shared tracker is supplied with
/// [`with_pending`](Self::with_pending).
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    catalog: ModuleCatalog,
    pending: Option<PendingRequests>,
}

impl RequestBuilder {
    #[must_use]
    pub fn new(catalog: ModuleCatalog) -> Self {
        Self {
            catalog,
            pending: None,
        }
    }

    /// Shares one pending-operation tracker between every tree this builder
    /// produces; waiting on any of them then waits on all.
    #[must_use]
    pub fn with_pending(mut self, pending: PendingRequests) -> Self {
        self.pending = Some(pending);
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn build(&self, definition: &Value, config: BuilderConfig) -> CompiledTree {
        info!(
            prefixes = config.prefixes.len(),
            params = config.params.len(),
            "building request tree"
        );
        let pending = self.pending.clone().unwrap_or_default();
        compile(definition, config.into_settings(), &self.catalog, pending)
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new(ModuleCatalog::standard())
    }
}

/// Compiles `definition` with the standard module catalog.
#[must_use]
pub fn create_async_request_builder(definition: &Value, config: BuilderConfig) -> CompiledTree {
    RequestBuilder::default().build(definition, config)
}

#[cfg(test)]
mod tests {
    use request_builder_core::RequestObject;
    use serde_json::json;

    use super::*;
    use crate::lifecycle::LifecycleState;

    #[tokio::test]
    async fn standard_builder_compiles_mocks() {
        let tree = create_async_request_builder(
            &json!({
                "users": {
                    "asyncModule": "http",
                    "get": {
                        "operationDetails": {"url": "/users/:id", "method": "GET"},
                        "mockResponse": {"name": "Ada"}
                    }
                }
            }),
            BuilderConfig::default(),
        );

        let result = tree
            .invoke("users.get", RequestObject::new().with_param("id", 1))
            .await
            .unwrap();
        assert_eq!(result, json!({"name": "Ada"}));
        assert_eq!(tree.loaded_modules(), vec!["http".to_string()]);

        tree.close_async_module_connections().await.unwrap();
        assert_eq!(tree.lifecycle_state(), LifecycleState::Closed);
    }

    #[tokio::test]
    async fn global_params_reach_mocks() {
        let tree = create_async_request_builder(
            &json!({
                "item": {
                    "asyncModule": "http",
                    "operationDetails": {"url": "/items/:id", "method": "GET"},
                    "smartMockResponse": {"https://shop.test/items/42": {"sku": 42}}
                }
            }),
            BuilderConfig::default()
                .with_prefix("default", "https://shop.test")
                .with_param("id", 42),
        );

        let result = tree.invoke("item", RequestObject::new()).await.unwrap();
        assert_eq!(result, json!({"sku": 42}));
    }

    #[tokio::test]
    async fn shared_tracker_spans_trees() {
        let pending = PendingRequests::new();
        let builder = RequestBuilder::new(ModuleCatalog::standard()).with_pending(pending.clone());
        let definition = json!({"ping": {"mockResponse": {"ok": true}}});
        let first = builder.build(&definition, BuilderConfig::default());
        let second = builder.build(&definition, BuilderConfig::default());

        let call = first.operation("ping").unwrap().invoke(RequestObject::new());
        assert_eq!(pending.len(), 1);
        assert_eq!(second.pending_count(), 1);

        assert_eq!(call.await.unwrap(), json!({"ok": true}));
        assert!(pending.is_empty());
    }

    #[test]
    fn default_builder_uses_standard_catalog() {
        let builder = RequestBuilder::default();
        assert!(builder.catalog().contains("http"));
        assert!(builder.catalog().contains("file"));
        assert!(builder.catalog().contains("aggregator"));
    }
}
