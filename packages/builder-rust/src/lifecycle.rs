//! Drain and shutdown sequencing for a compiled tree.
//!
//! Uses `ArcSwap` for lock-free state transitions, so the state can be read
//! while a drain is in progress.

use std::sync::Arc;

use anyhow::anyhow;
use arc_swap::ArcSwap;
use futures_util::future::join_all;
use tracing::{debug, error, info};

use crate::error::OperationError;
use crate::pending::PendingRequests;
use crate::registry::ModuleRegistry;

/// Lifecycle state of a compiled tree.
///
/// State machine: Open -> Draining -> Closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Operations may be invoked; modules hold their resources.
    Open,
    /// Shutdown started; waiting for pending operations.
    Draining,
    /// Every loaded module has been asked to close its connections.
    Closed,
}

/// Owns the pending registry and loaded modules of one compiled tree and
/// sequences their shutdown.
#[derive(Debug)]
pub struct Lifecycle {
    state: Arc<ArcSwap<LifecycleState>>,
    pending: PendingRequests,
    registry: Arc<ModuleRegistry>,
}

impl Lifecycle {
    #[must_use]
    pub fn new(pending: PendingRequests, registry: Arc<ModuleRegistry>) -> Self {
        Self {
            state: Arc::new(ArcSwap::from_pointee(LifecycleState::Open)),
            pending,
            registry,
        }
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        **self.state.load()
    }

    #[must_use]
    pub fn pending(&self) -> &PendingRequests {
        &self.pending
    }

    #[must_use]
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Waits for the operations pending at the time of the call.
    ///
    /// # Errors
    ///
    /// Returns the first failure among the awaited operations.
    pub async fn drain(&self) -> Result<(), OperationError> {
        self.pending.wait_all().await
    }

    /// Drains, then closes every loaded module concurrently.
    ///
    /// The drain outcome is ignored and a failing close never prevents the
    /// others from running. Once closed, further calls do nothing.
    ///
    /// # Errors
    ///
    /// Returns one error listing every module whose close failed.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        if self.state() == LifecycleState::Closed {
            debug!("module connections already closed");
            return Ok(());
        }
        self.state.store(Arc::new(LifecycleState::Draining));
        if let Err(err) = self.drain().await {
            debug!(error = %err, "pending operation failed during shutdown drain");
        }

        let modules = self.registry.loaded_modules();
        let outcomes = join_all(modules.iter().map(|module| async move {
            (module.name().to_string(), module.close_connections().await)
        }))
        .await;
        self.state.store(Arc::new(LifecycleState::Closed));

        let failures: Vec<String> = outcomes
            .into_iter()
            .filter_map(|(name, outcome)| {
                outcome.err().map(|err| {
                    error!(module = %name, error = %err, "failed to close module connections");
                    format!("{name}: {err:#}")
                })
            })
            .collect();

        if failures.is_empty() {
            info!(modules = modules.len(), "module connections closed");
            Ok(())
        } else {
            Err(anyhow!(
                "failed to close {} module(s): {}",
                failures.len(),
                failures.join("; ")
            ))
        }
    }
}
