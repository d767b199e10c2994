//! Watch loop turning Solr notifications into sync and teardown calls.

use super::Synchronizer;
use crate::crd::Solr;
use crate::error::OperatorResult;
use crate::store::ObjectStore;
use futures::{Stream, StreamExt};
use kube::runtime::WatchStreamExt;
use kube::runtime::watcher::{self, Config, watcher};
use kube::{Api, Client, ResourceExt};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A change to a Solr resource, as seen by the operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// First sighting of the resource.
    Added(Solr),
    /// The resource changed, or a resync replayed it.
    Updated(Solr),
    /// The resource is gone.
    Deleted(Solr),
}

impl Event {
    /// The resource the event is about.
    pub fn solr(&self) -> &Solr {
        match self {
            Event::Added(solr) | Event::Updated(solr) | Event::Deleted(solr) => solr,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Event::Added(_) => "added",
            Event::Updated(_) => "updated",
            Event::Deleted(_) => "deleted",
        }
    }
}

type ObjectRef = (String, String);

fn object_ref(solr: &Solr) -> ObjectRef {
    (solr.namespace().unwrap_or_default(), solr.name_any())
}

/// Classifies raw watch notifications into [`Event`]s.
///
/// Remembers every resource it has seen, so it can tell first sightings from
/// updates and report resources that disappeared while the watch re-listed.
#[derive(Debug, Default)]
pub struct EventTracker {
    known: BTreeMap<ObjectRef, Solr>,
    relist: Option<BTreeSet<ObjectRef>>,
}

impl EventTracker {
    /// Create a tracker that knows no resources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of resources currently known.
    pub fn len(&self) -> usize {
        self.known.len()
    }

    /// Whether no resources are known.
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Fold one watch notification into the tracker.
    pub fn track(&mut self, event: watcher::Event<Solr>) -> Vec<Event> {
        match event {
            watcher::Event::Init => {
                self.relist = Some(BTreeSet::new());
                Vec::new()
            }
            watcher::Event::InitApply(solr) => {
                if let Some(seen) = self.relist.as_mut() {
                    seen.insert(object_ref(&solr));
                }
                vec![self.observe(solr)]
            }
            watcher::Event::Apply(solr) => vec![self.observe(solr)],
            watcher::Event::InitDone => {
                let Some(seen) = self.relist.take() else {
                    return Vec::new();
                };
                let vanished: Vec<ObjectRef> = self
                    .known
                    .keys()
                    .filter(|key| !seen.contains(*key))
                    .cloned()
                    .collect();
                vanished
                    .into_iter()
                    .filter_map(|key| self.known.remove(&key))
                    .map(Event::Deleted)
                    .collect()
            }
            watcher::Event::Delete(solr) => {
                self.known.remove(&object_ref(&solr));
                vec![Event::Deleted(solr)]
            }
        }
    }

    fn observe(&mut self, solr: Solr) -> Event {
        match self.known.insert(object_ref(&solr), solr.clone()) {
            None => Event::Added(solr),
            Some(_) => Event::Updated(solr),
        }
    }
}

/// Watch Solr resources in `namespace`, or in every namespace when `None`.
///
/// Watch errors are retried with the default backoff and still surface in the
/// stream so they can be logged.
pub fn watch_solrs(
    client: Client,
    namespace: Option<String>,
) -> impl Stream<Item = Result<watcher::Event<Solr>, watcher::Error>> + Send {
    let api: Api<Solr> = match namespace.as_deref() {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    };
    watcher(api, Config::default()).default_backoff()
}

/// Feeds Solr events to a [`Synchronizer`] until shut down.
pub struct Operator<S> {
    synchronizer: Synchronizer<S>,
    namespace: Option<String>,
    resync_period: Duration,
    shutdown: CancellationToken,
}

impl<S: ObjectStore> Operator<S> {
    /// Create an operator scoped to `namespace` (all namespaces when `None`)
    /// that resyncs every `resync_period`.
    pub fn new(
        synchronizer: Synchronizer<S>,
        namespace: Option<String>,
        resync_period: Duration,
    ) -> Self {
        Self {
            synchronizer,
            namespace,
            resync_period,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops [`Operator::run`] when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Route one event: Added and Updated sync, Deleted tears down.
    pub async fn dispatch(&self, event: &Event) -> OperatorResult<()> {
        match event {
            Event::Added(solr) | Event::Updated(solr) => {
                let report = self.synchronizer.sync(solr).await?;
                debug!(
                    namespace = ?solr.namespace(),
                    name = %solr.name_any(),
                    host = %report.address.host,
                    port = report.address.port,
                    discovery = ?report.discovery,
                    "Synced"
                );
                Ok(())
            }
            Event::Deleted(solr) => self.synchronizer.teardown(solr).await,
        }
    }

    async fn handle(&self, event: Event) {
        let solr = event.solr();
        debug!(
            event = event.label(),
            namespace = ?solr.namespace(),
            name = %solr.name_any(),
            "Dispatching"
        );
        if let Err(e) = self.dispatch(&event).await {
            error!(
                event = event.label(),
                namespace = ?solr.namespace(),
                name = %solr.name_any(),
                transient = e.is_transient(),
                error = %e,
                "Reconciliation failed"
            );
        }
    }

    /// List every Solr resource in scope and dispatch each as updated.
    pub async fn resync(&self) {
        let solrs = match self.synchronizer.list_solrs(self.namespace.as_deref()).await {
            Ok(solrs) => solrs,
            Err(e) => {
                error!(error = %e, "Resync listing failed");
                return;
            }
        };
        info!(count = solrs.len(), "Resyncing Solr resources");
        for solr in solrs {
            if self.shutdown.is_cancelled() {
                info!("Shutdown requested, abandoning resync");
                break;
            }
            self.handle(Event::Updated(solr)).await;
        }
    }

    /// Process `events` until the stream ends or the shutdown token fires.
    ///
    /// Events are handled one at a time. A resync runs every resync period,
    /// starting one period after the call.
    pub async fn run<St, E>(&self, events: St)
    where
        St: Stream<Item = Result<watcher::Event<Solr>, E>>,
        E: fmt::Display,
    {
        let mut events = std::pin::pin!(events);
        let mut tracker = EventTracker::new();
        let mut resync =
            tokio::time::interval_at(Instant::now() + self.resync_period, self.resync_period);
        resync.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            namespace = self.namespace.as_deref().unwrap_or("<all>"),
            resync_secs = self.resync_period.as_secs(),
            "Watching Solr resources"
        );

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                _ = resync.tick() => self.resync().await,
                next = events.next() => match next {
                    Some(Ok(event)) => {
                        for event in tracker.track(event) {
                            if self.shutdown.is_cancelled() {
                                break;
                            }
                            self.handle(event).await;
                        }
                    }
                    Some(Err(e)) => warn!(error = %e, "Solr watch error"),
                    None => {
                        warn!("Solr watch stream ended");
                        break;
                    }
                },
            }
        }
    }
}
