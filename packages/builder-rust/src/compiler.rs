//! Definition compiler.
//!
//! Walks a definition document and produces a tree of the same shape in which
//! every operation node is replaced by an invocable [`Operation`]. The input
//! is only borrowed; the inherited module name and the enclosing container's
//! details are threaded through the recursion explicitly.

use std::fmt;
use std::sync::Arc;

use futures_util::future::{self, FutureExt};
use request_builder_core::definition::{is_candidate, module_name, operation_details};
use request_builder_core::{GlobalSettings, MockOverrides, NodeKind, NodeView, RequestObject};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::OperationError;
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::module::{failing_fn, AsyncFn, AsyncModule, ModuleContext, OperationFuture, ResourceHandle};
use crate::pending::PendingRequests;
use crate::registry::{ModuleCatalog, ModuleRegistry};

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// A compiled operation node.
#[derive(Clone)]
pub struct Operation {
    path: String,
    module: Option<String>,
    mock: bool,
    call: AsyncFn,
}

impl Operation {
    /// Invokes the operation. The returned future is independent of `self`.
    pub fn invoke(&self, request: RequestObject) -> OperationFuture {
        (self.call)(request)
    }

    /// Dotted path of the node in the definition document.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Effective module name, own or inherited.
    #[must_use]
    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    /// `true` when the node carries mock overrides.
    #[must_use]
    pub fn is_mock(&self) -> bool {
        self.mock
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("path", &self.path)
            .field("module", &self.module)
            .field("mock", &self.mock)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Compiled nodes
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum CompiledNode {
    Operation(Operation),
    Namespace(Namespace),
    /// Any non-node value, including reserved keys, kept as written.
    Value(Value),
}

impl CompiledNode {
    #[must_use]
    pub fn as_operation(&self) -> Option<&Operation> {
        match self {
            Self::Operation(operation) => Some(operation),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_namespace(&self) -> Option<&Namespace> {
        match self {
            Self::Namespace(namespace) => Some(namespace),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }
}

/// A container node: its entries in definition order.
#[derive(Debug, Default)]
pub struct Namespace {
    module: Option<String>,
    entries: Vec<(String, CompiledNode)>,
}

impl Namespace {
    /// The container's own `asyncModule`, if it names one.
    #[must_use]
    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&CompiledNode> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, node)| node)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &CompiledNode)> {
        self.entries.iter().map(|(name, node)| (name.as_str(), node))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves a dotted path such as `users.get`.
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<&CompiledNode> {
        let mut segments = path.split('.');
        let mut node = self.get(segments.next()?)?;
        for segment in segments {
            node = node.as_namespace()?.get(segment)?;
        }
        Some(node)
    }

    #[must_use]
    pub fn operation(&self, path: &str) -> Option<&Operation> {
        self.lookup(path).and_then(CompiledNode::as_operation)
    }

    /// Every operation below this namespace, depth first.
    #[must_use]
    pub fn operations(&self) -> Vec<&Operation> {
        let mut found = Vec::new();
        self.collect_operations(&mut found);
        found
    }

    fn collect_operations<'a>(&'a self, found: &mut Vec<&'a Operation>) {
        for (_, node) in &self.entries {
            match node {
                CompiledNode::Operation(operation) => found.push(operation),
                CompiledNode::Namespace(namespace) => namespace.collect_operations(found),
                CompiledNode::Value(_) => {}
            }
        }
    }
}

// ---------------------------------------------------------------------------
// CompiledTree
// ---------------------------------------------------------------------------

/// The result of compiling one definition document.
#[derive(Debug)]
pub struct CompiledTree {
    root: Arc<Namespace>,
    lifecycle: Lifecycle,
}

impl CompiledTree {
    #[must_use]
    pub fn root(&self) -> &Namespace {
        &self.root
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&CompiledNode> {
        self.root.lookup(path)
    }

    #[must_use]
    pub fn operation(&self, path: &str) -> Option<&Operation> {
        self.root.operation(path)
    }

    /// Invokes the operation at `path`.
    ///
    /// # Errors
    ///
    /// Fails with [`OperationError::UnknownOperation`] when `path` does not
    /// name an operation, otherwise with the operation's own failure.
    pub async fn invoke(&self, path: &str, request: RequestObject) -> Result<Value, OperationError> {
        let operation = self
            .operation(path)
            .ok_or_else(|| OperationError::UnknownOperation { id: path.to_string() })?;
        operation.invoke(request).await
    }

    /// Waits for the operations pending at the time of the call.
    ///
    /// # Errors
    ///
    /// Returns the first failure among the awaited operations.
    pub async fn wait_for_pending_requests(&self) -> Result<(), OperationError> {
        self.lifecycle.drain().await
    }

    /// Drains pending operations, then closes every loaded module.
    ///
    /// # Errors
    ///
    /// Returns one error listing every module whose close failed.
    pub async fn close_async_module_connections(&self) -> anyhow::Result<()> {
        self.lifecycle.shutdown().await
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.lifecycle.pending().len()
    }

    #[must_use]
    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Names of the modules loaded while compiling, in load order.
    #[must_use]
    pub fn loaded_modules(&self) -> Vec<String> {
        self.lifecycle.registry().loaded_names()
    }
}

// ---------------------------------------------------------------------------
// Compiler
// ---------------------------------------------------------------------------

/// Compiles `definition` with a fresh module registry drawn from `catalog`.
///
/// A definition that is not a JSON object compiles to an empty tree.
#[must_use]
pub fn compile(
    definition: &Value,
    settings: GlobalSettings,
    catalog: &ModuleCatalog,
    pending: PendingRequests,
) -> CompiledTree {
    let registry = Arc::new(ModuleRegistry::new(catalog.clone()));
    let resources = ResourceHandle::new();

    let root = {
        let compiler = Compiler {
            registry: &registry,
            pending: &pending,
            ctx: ModuleContext::new(Arc::new(settings), resources.clone()),
        };
        match definition {
            Value::Object(node) => {
                compiler.compile_namespace(node, module_name(node), operation_details(node), "")
            }
            other => {
                warn!(kind = json_kind(other), "definition is not an object, compiling an empty tree");
                Namespace::default()
            }
        }
    };
    let root = Arc::new(root);
    resources.bind(&root);
    debug!(
        operations = root.operations().len(),
        modules = registry.len(),
        "definition compiled"
    );

    CompiledTree {
        root,
        lifecycle: Lifecycle::new(pending, registry),
    }
}

struct Compiler<'a> {
    registry: &'a ModuleRegistry,
    pending: &'a PendingRequests,
    ctx: ModuleContext,
}

impl Compiler<'_> {
    fn compile_namespace(
        &self,
        node: &Map<String, Value>,
        inherited_module: Option<&str>,
        own_details: Option<&Value>,
        path: &str,
    ) -> Namespace {
        let entries = node
            .iter()
            .map(|(key, value)| {
                let compiled = match value {
                    Value::Object(child) if is_candidate(key, value) => {
                        let child_path = join_path(path, key);
                        let view = NodeView::new(child, inherited_module);
                        match view.kind() {
                            NodeKind::Container => CompiledNode::Namespace(self.compile_namespace(
                                child,
                                view.module(),
                                view.details(),
                                &child_path,
                            )),
                            kind => CompiledNode::Operation(self.compile_leaf(
                                &view,
                                kind,
                                own_details,
                                child_path,
                            )),
                        }
                    }
                    other => CompiledNode::Value(other.clone()),
                };
                (key.clone(), compiled)
            })
            .collect();

        Namespace {
            module: module_name(node).map(str::to_string),
            entries,
        }
    }

    fn compile_leaf(
        &self,
        view: &NodeView<'_>,
        kind: NodeKind,
        parent_details: Option<&Value>,
        path: String,
    ) -> Operation {
        let module_name = view.module();
        let module = module_name.and_then(|name| self.registry.load(name));
        let mock = kind == NodeKind::Mock;

        let call = if mock {
            let call = module
                .as_ref()
                .and_then(|module| module.mock_response_fn(view.node(), &self.ctx))
                .unwrap_or_else(|| default_mock_fn(module.as_deref(), view.node()));
            self.tracked(call)
        } else {
            let call = module.as_ref().and_then(|module| {
                view.details()
                    .and_then(|details| module.async_fn(details, parent_details, &self.ctx))
            });
            match call {
                Some(call) => self.tracked(call),
                None => failing_fn(OperationError::ModuleUnavailable {
                    module: module.as_ref().map(|module| module.name().to_string()),
                }),
            }
        };

        Operation {
            path,
            module: module_name.map(str::to_string),
            mock,
            call,
        }
    }

    fn tracked(&self, call: AsyncFn) -> AsyncFn {
        let pending = self.pending.clone();
        Arc::new(move |request: RequestObject| pending.track(call(request)))
    }
}

/// The flat mock used when the module offers no request-aware one: ignores
/// the request and returns a copy of `mockResponse`, or `{}`.
fn default_mock_fn(module: Option<&dyn AsyncModule>, node: &Map<String, Value>) -> AsyncFn {
    let module_name = module.map_or_else(|| "undefined".to_string(), |module| module.name().to_string());
    let response = MockOverrides::from_node(node).default_response();
    Arc::new(move |request: RequestObject| {
        info!(module = %module_name, request = %request, response = %response, "mock response");
        future::ready(Ok(response.clone())).boxed()
    })
}

fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
