use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use futures_util::future::{self, BoxFuture, FutureExt};
use request_builder_core::{GlobalSettings, RequestObject};
use serde_json::{Map, Value};

use crate::compiler::Namespace;
use crate::error::OperationError;

// ---------------------------------------------------------------------------
// AsyncFn
// ---------------------------------------------------------------------------

/// The future every operation invocation returns.
pub type OperationFuture = BoxFuture<'static, Result<Value, OperationError>>;

/// An invocable operation body: one request in, one future out.
pub type AsyncFn = Arc<dyn Fn(RequestObject) -> OperationFuture + Send + Sync>;

/// Boxes an async closure into an [`AsyncFn`].
pub fn async_fn<F, Fut>(f: F) -> AsyncFn
where
    F: Fn(RequestObject) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, OperationError>> + Send + 'static,
{
    Arc::new(move |request: RequestObject| f(request).boxed())
}

/// An [`AsyncFn`] that fails every call with `error`.
#[must_use]
pub fn failing_fn(error: OperationError) -> AsyncFn {
    Arc::new(move |_request: RequestObject| future::ready(Err::<Value, _>(error.clone())).boxed())
}

// ---------------------------------------------------------------------------
// ResourceHandle
// ---------------------------------------------------------------------------

/// Late-bound, weak reference to the root of the tree being compiled.
///
/// Modules receive the handle while the tree is still being built; it is bound
/// once compilation finishes and resolves to `None` after the tree is dropped.
#[derive(Clone, Default)]
pub struct ResourceHandle {
    root: Arc<OnceLock<Weak<Namespace>>>,
}

impl ResourceHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the handle. Later calls are ignored.
    pub(crate) fn bind(&self, root: &Arc<Namespace>) {
        let _ = self.root.set(Arc::downgrade(root));
    }

    #[must_use]
    pub fn root(&self) -> Option<Arc<Namespace>> {
        self.root.get().and_then(Weak::upgrade)
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("bound", &self.root.get().is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ModuleContext
// ---------------------------------------------------------------------------

/// Context handed to modules while a tree is compiled.
#[derive(Debug, Clone)]
pub struct ModuleContext {
    settings: Arc<GlobalSettings>,
    resources: ResourceHandle,
}

impl ModuleContext {
    #[must_use]
    pub fn new(settings: Arc<GlobalSettings>, resources: ResourceHandle) -> Self {
        Self {
            settings,
            resources,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &GlobalSettings {
        &self.settings
    }

    #[must_use]
    pub fn resources(&self) -> &ResourceHandle {
        &self.resources
    }
}

// ---------------------------------------------------------------------------
// AsyncModule trait
// ---------------------------------------------------------------------------

/// A transport module: turns operation details into invocable functions.
///
/// Modules are loaded at most once per compiled tree and closed once, after
/// the tree's pending operations have drained.
#[async_trait]
pub trait AsyncModule: Send + Sync {
    /// The name definitions use under `asyncModule`.
    fn name(&self) -> &str;

    /// Builds the real operation for `details`. `parent_details` are the
    /// enclosing container's own `operationDetails`, if any.
    ///
    /// Returning `None` makes every call of the operation fail with
    /// [`OperationError::ModuleUnavailable`].
    fn async_fn(
        &self,
        details: &Value,
        parent_details: Option<&Value>,
        ctx: &ModuleContext,
    ) -> Option<AsyncFn>;

    /// Builds a request-aware mock for a node carrying mock overrides.
    /// Modules without one get the flat default mock.
    fn mock_response_fn(&self, _node: &Map<String, Value>, _ctx: &ModuleContext) -> Option<AsyncFn> {
        None
    }

    /// Releases pooled resources.
    async fn close_connections(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
