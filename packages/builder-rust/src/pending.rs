//! In-flight operation tracking.
//!
//! Every invocation of a compiled operation is registered under a fresh id
//! and spawned onto the current tokio runtime, so it runs whether or not the
//! caller awaits it. The entry is removed once it settles. A drain awaits the
//! operations registered at the moment it starts.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures_util::future::{join_all, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::debug;

use crate::error::OperationError;
use crate::module::OperationFuture;

type SharedOperation = Shared<OperationFuture>;

#[derive(Default)]
struct Inner {
    last_id: AtomicU64,
    entries: Mutex<BTreeMap<u64, SharedOperation>>,
}

/// Registry of in-flight operations, keyed by a strictly increasing id.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct PendingRequests {
    inner: Arc<Inner>,
}

impl PendingRequests {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `operation`, starts it, and returns a future that resolves
    /// to the same outcome. Dropping the returned future does not cancel the
    /// operation.
    ///
    /// Outside a tokio runtime nothing can be spawned; the operation then
    /// runs when the returned future or a drain first polls it.
    pub fn track(&self, operation: OperationFuture) -> OperationFuture {
        let id = self.inner.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        let registry: Weak<Inner> = Arc::downgrade(&self.inner);
        let settled = async move {
            let result = operation.await;
            if let Some(inner) = registry.upgrade() {
                inner.entries.lock().remove(&id);
                debug!(id, "pending operation settled");
            }
            result
        }
        .boxed()
        .shared();

        // registered before spawning so a fast settle always finds its entry
        self.inner.entries.lock().insert(id, settled.clone());
        match Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(settled.clone());
                debug!(id, "pending operation started");
            }
            Err(_) => debug!(id, "pending operation registered without a runtime"),
        }
        settled.boxed()
    }

    /// Number of registered, unsettled operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.lock().is_empty()
    }

    /// The id handed to the most recent registration; `0` before any.
    #[must_use]
    pub fn last_id(&self) -> u64 {
        self.inner.last_id.load(Ordering::SeqCst)
    }

    /// Ids of the registered operations, ascending.
    #[must_use]
    pub fn ids(&self) -> Vec<u64> {
        self.inner.entries.lock().keys().copied().collect()
    }

    /// Waits for every operation registered at the time of the call.
    ///
    /// Operations registered afterwards are not awaited.
    ///
    /// # Errors
    ///
    /// Returns the failure of the lowest-id failed operation, once all of the
    /// snapshot has settled.
    pub async fn wait_all(&self) -> Result<(), OperationError> {
        let snapshot: Vec<SharedOperation> = self.inner.entries.lock().values().cloned().collect();
        debug!(count = snapshot.len(), "draining pending operations");
        join_all(snapshot)
            .await
            .into_iter()
            .find_map(Result::err)
            .map_or(Ok(()), Err)
    }
}

impl fmt::Debug for PendingRequests {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequests")
            .field("pending", &self.len())
            .field("last_id", &self.last_id())
            .finish()
    }
}
