//! Fan-out transport: invokes other operations of the same compiled tree with
//! one request and merges their object results.

use std::sync::{Arc, OnceLock};

use futures_util::future::{try_join_all, FutureExt};
use request_builder_core::RequestObject;
use serde_json::{Map, Value};

use crate::compiler::Operation;
use crate::error::OperationError;
use crate::module::{failing_fn, AsyncFn, AsyncModule, ModuleContext, ResourceHandle};

#[derive(Debug, Default)]
pub struct AggregatorModule;

impl AggregatorModule {
    pub const NAME: &'static str = "aggregator";

    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl AsyncModule for AggregatorModule {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn async_fn(
        &self,
        details: &Value,
        _parent_details: Option<&Value>,
        ctx: &ModuleContext,
    ) -> Option<AsyncFn> {
        let Some(ids) = operation_ids(details) else {
            return Some(failing_fn(OperationError::invalid_definition(
                "aggregator operation requires an `operationIds` array of strings",
            )));
        };
        let targets = Arc::new(Targets {
            ids,
            resources: ctx.resources().clone(),
            resolved: OnceLock::new(),
        });

        Some(Arc::new(move |request: RequestObject| {
            let targets = Arc::clone(&targets);
            async move {
                let operations = targets.resolve()?;
                let calls = operations
                    .iter()
                    .map(|operation| operation.invoke(request.clone()));
                merge(try_join_all(calls).await?)
            }
            .boxed()
        }))
    }
}

fn operation_ids(details: &Value) -> Option<Vec<String>> {
    details
        .get("operationIds")?
        .as_array()?
        .iter()
        .map(|id| id.as_str().map(str::to_string))
        .collect()
}

/// Operation ids and, once the first call has found them all, the resolved
/// operations.
struct Targets {
    ids: Vec<String>,
    resources: ResourceHandle,
    resolved: OnceLock<Vec<Operation>>,
}

impl Targets {
    fn resolve(&self) -> Result<&[Operation], OperationError> {
        if let Some(resolved) = self.resolved.get() {
            return Ok(resolved);
        }
        let root = self.resources.root().ok_or_else(|| {
            OperationError::transport(AggregatorModule::NAME, "compiled tree is no longer available")
        })?;
        let operations = self
            .ids
            .iter()
            .map(|id| {
                root.operation(id)
                    .cloned()
                    .ok_or_else(|| OperationError::UnknownOperation { id: id.clone() })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.resolved.get_or_init(|| operations))
    }
}

/// Merges object results left to right; later keys win. Non-object results
/// are skipped, and at least one object is required.
fn merge(results: Vec<Value>) -> Result<Value, OperationError> {
    if !results.iter().any(Value::is_object) {
        return Err(OperationError::Aggregate);
    }
    let merged = results
        .into_iter()
        .filter_map(|result| match result {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .fold(Map::new(), |mut merged, map| {
            merged.extend(map);
            merged
        });
    Ok(Value::Object(merged))
}
