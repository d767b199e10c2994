//! Reconciliation of Solr resources.
//!
//! - [`Synchronizer`]: drives the subordinate objects of one Solr resource
//!   towards their desired state ([`Synchronizer::sync`]) or removes them
//!   ([`Synchronizer::teardown`])
//! - [`Operator`]: the watch/dispatch loop feeding [`Event`]s to the
//!   synchronizer until shutdown
//!
//! # Usage
//!
//! ```ignore
//! use solr_operator::controller::{Operator, Synchronizer, watch_solrs};
//! use solr_operator::store::KubeStore;
//!
//! let synchronizer = Synchronizer::new(Arc::new(KubeStore::new(client.clone())), call_timeout);
//! let operator = Operator::new(synchronizer, None, Duration::from_secs(600));
//! let shutdown = operator.shutdown_token();
//! operator.run(watch_solrs(client, None)).await;
//! ```

mod dispatch;
mod sync;
mod teardown;

pub use dispatch::{Event, EventTracker, Operator, watch_solrs};
pub use sync::{DiscoverySync, ServiceAddress, SyncReport};

use crate::crd::Solr;
use crate::error::{OperatorError, OperatorResult};
use crate::store::ObjectStore;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Default bound on a single store call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interval between full resyncs.
pub const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(600);

/// Applies and removes the subordinate objects of Solr resources.
///
/// Holds no state between calls; every reconciliation recomputes the desired
/// objects and compares against the store.
pub struct Synchronizer<S> {
    store: Arc<S>,
    call_timeout: Duration,
}

impl<S> Clone for Synchronizer<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            call_timeout: self.call_timeout,
        }
    }
}

impl<S: ObjectStore> Synchronizer<S> {
    /// Create a synchronizer bounding each store call by `call_timeout`.
    pub fn new(store: Arc<S>, call_timeout: Duration) -> Self {
        Self {
            store,
            call_timeout,
        }
    }

    /// List Solr resources in `namespace`, or everywhere when `None`.
    pub async fn list_solrs(&self, namespace: Option<&str>) -> OperatorResult<Vec<Solr>> {
        self.bounded(
            "list",
            "Solr",
            namespace.unwrap_or("*"),
            self.store.list::<Solr>(namespace),
        )
        .await
    }

    /// Await `call`, turning an overrun of the call timeout into
    /// [`OperatorError::Timeout`].
    async fn bounded<T>(
        &self,
        operation: &'static str,
        kind: &str,
        name: &str,
        call: impl Future<Output = OperatorResult<T>>,
    ) -> OperatorResult<T> {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(OperatorError::Timeout {
                operation,
                kind: kind.to_string(),
                name: name.to_string(),
            }),
        }
    }
}
