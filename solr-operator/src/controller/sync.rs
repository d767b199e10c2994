//! Create-or-update of the objects behind a Solr resource.

use super::Synchronizer;
use crate::crd::Solr;
use crate::error::{OperatorError, OperatorResult};
use crate::resources::{self, DiscoveryPatch, SOLR_CORE, SOLR_PORT};
use crate::store::{CreateOutcome, ManagedResource, ObjectStore};
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use kube::ResourceExt;
use tracing::{debug, info};

/// Address the store assigned to a Solr service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAddress {
    /// Cluster-internal IP.
    pub host: String,
    /// Service port.
    pub port: i32,
}

/// What happened to the discovery ConfigMap during a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoverySync {
    /// The Solr resource names no discovery ConfigMap.
    Skipped,
    /// The ConfigMap already held the current connection details.
    Unchanged,
    /// The connection details were written.
    Patched,
}

/// Outcome of a successful [`Synchronizer::sync`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Address of the Solr service.
    pub address: ServiceAddress,
    /// Discovery ConfigMap handling.
    pub discovery: DiscoverySync,
}

impl<S: ObjectStore> Synchronizer<S> {
    /// Bring every subordinate object of `solr` to its desired state.
    ///
    /// Objects are applied claim first (the deployment mounts it), then the
    /// deployment, then the service, whose assigned address finally goes into
    /// the discovery ConfigMap. The first failure ends the pass.
    pub async fn sync(&self, solr: &Solr) -> OperatorResult<SyncReport> {
        let desired = resources::translate(solr)?;

        self.sync_one(&desired.persistent_volume_claim).await?;
        self.sync_one(&desired.deployment).await?;
        let address = self.sync_service(&desired.service).await?;

        let discovery = match solr.spec.discovery_target() {
            Some(target) => {
                let patch = DiscoveryPatch::new(
                    &solr.name_any(),
                    SOLR_CORE,
                    &address.host,
                    &address.port.to_string(),
                );
                self.sync_discovery(&desired.namespace, target, &patch).await?
            }
            None => DiscoverySync::Skipped,
        };

        Ok(SyncReport { address, discovery })
    }

    /// Create `desired`, or update it in place when it already exists.
    pub async fn sync_one<K: ManagedResource>(&self, desired: &K) -> OperatorResult<K> {
        let kind = K::kind(&());
        let name = desired.name_any();
        let namespace = desired.namespace().unwrap_or_default();

        match self
            .bounded("create", &kind, &name, self.store.create(desired))
            .await?
        {
            CreateOutcome::Created(created) => {
                info!(kind = %kind, namespace = %namespace, name = %name, "Created");
                Ok(created)
            }
            CreateOutcome::AlreadyExists => {
                debug!(kind = %kind, namespace = %namespace, name = %name, "Already exists, updating");
                self.bounded("replace", &kind, &name, self.store.replace(desired))
                    .await
            }
        }
    }

    /// Sync the service, then read back the address the store assigned.
    pub async fn sync_service(&self, desired: &Service) -> OperatorResult<ServiceAddress> {
        self.sync_one(desired).await?;

        let name = desired.name_any();
        let namespace = desired.namespace().unwrap_or_default();
        let observed = self
            .bounded(
                "get",
                "Service",
                &name,
                self.store.get::<Service>(&namespace, &name),
            )
            .await?
            .ok_or_else(|| OperatorError::NotFound {
                kind: "Service".to_string(),
                name: name.clone(),
                namespace: namespace.clone(),
            })?;

        let spec = observed.spec.unwrap_or_default();
        let host = spec
            .cluster_ip
            .filter(|ip| !ip.is_empty() && ip != "None")
            .ok_or_else(|| {
                OperatorError::Unavailable(format!(
                    "Service {namespace}/{name} has no cluster IP yet"
                ))
            })?;
        let port = spec
            .ports
            .as_deref()
            .and_then(|ports| ports.first())
            .map(|p| p.port)
            .unwrap_or(SOLR_PORT);

        Ok(ServiceAddress { host, port })
    }

    /// Merge `patch` into the existing discovery ConfigMap `target`.
    ///
    /// The ConfigMap is provisioned outside the operator; a missing one is a
    /// [`OperatorError::DiscoveryTargetMissing`] and is never created here.
    pub async fn sync_discovery(
        &self,
        namespace: &str,
        target: &str,
        patch: &DiscoveryPatch,
    ) -> OperatorResult<DiscoverySync> {
        let missing = || OperatorError::DiscoveryTargetMissing {
            namespace: namespace.to_string(),
            name: target.to_string(),
        };

        let current = self
            .bounded(
                "get",
                "ConfigMap",
                target,
                self.store.get::<ConfigMap>(namespace, target),
            )
            .await?
            .ok_or_else(missing)?;

        if patch.is_applied(current.data.as_ref()) {
            debug!(namespace = %namespace, config_map = %target, "Discovery entries up to date");
            return Ok(DiscoverySync::Unchanged);
        }

        let written = self
            .bounded(
                "patch",
                "ConfigMap",
                target,
                self.store
                    .merge_patch::<ConfigMap>(namespace, target, &patch.to_merge_patch()),
            )
            .await;

        match written {
            Ok(_) => {
                info!(
                    namespace = %namespace,
                    config_map = %target,
                    keys = ?patch.entries().keys().collect::<Vec<_>>(),
                    "Published discovery entries"
                );
                Ok(DiscoverySync::Patched)
            }
            Err(OperatorError::NotFound { .. }) => Err(missing()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_support::solr;
    use crate::testing::{MockStore, Verb};
    use k8s_openapi::api::apps::v1::Deployment;
    use k8s_openapi::api::core::v1::PersistentVolumeClaim;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    fn synchronizer(store: MockStore) -> (Arc<MockStore>, Synchronizer<MockStore>) {
        let store = Arc::new(store);
        let sync = Synchronizer::new(Arc::clone(&store), Duration::from_secs(5));
        (store, sync)
    }

    fn discovery_map(data: &[(&str, &str)]) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some("discovery".to_string()),
                namespace: Some("bar".to_string()),
                ..Default::default()
            },
            data: Some(
                data.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<BTreeMap<_, _>>(),
            ),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn applies_in_dependency_order() {
        let (store, sync) = synchronizer(MockStore::new());
        sync.sync(&solr("foo", "bar", "small")).await.unwrap();

        let writes: Vec<String> = store.writes().into_iter().map(|c| c.kind).collect();
        assert_eq!(writes, ["PersistentVolumeClaim", "Deployment", "Service"]);
    }

    #[tokio::test]
    async fn service_address_is_read_back() {
        let (store, sync) = synchronizer(MockStore::new());
        let report = sync.sync(&solr("foo", "bar", "small")).await.unwrap();

        let svc: Service = store.object("bar", "solr-foo").unwrap();
        assert_eq!(
            Some(report.address.host.as_str()),
            svc.spec.unwrap().cluster_ip.as_deref()
        );
        assert_eq!(report.address.port, 8983);
        assert_eq!(report.discovery, DiscoverySync::Skipped);

        let last = store.calls().pop().unwrap();
        assert!(last.is(Verb::Get, "Service"));
    }

    #[tokio::test]
    async fn unknown_size_touches_nothing() {
        let (store, sync) = synchronizer(MockStore::new());
        let err = sync.sync(&solr("foo", "bar", "huge")).await.unwrap_err();

        assert!(matches!(err, OperatorError::UnknownSizeClass(_)));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn existing_claim_takes_update_path() {
        let input = solr("foo", "bar", "small");
        let existing = resources::translate(&input).unwrap().persistent_volume_claim;
        let (store, sync) = synchronizer(MockStore::new().with_object(existing));

        sync.sync(&input).await.unwrap();

        let claim_calls: Vec<Verb> = store
            .calls()
            .into_iter()
            .filter(|c| c.kind == "PersistentVolumeClaim")
            .map(|c| c.verb)
            .collect();
        assert_eq!(claim_calls, [Verb::Create, Verb::Replace]);
        assert!(store.contains::<Deployment>("bar", "solr-foo"));
    }

    #[tokio::test]
    async fn update_keeps_assigned_address() {
        let (store, sync) = synchronizer(MockStore::new());
        let first = sync.sync(&solr("foo", "bar", "small")).await.unwrap();

        let mut resized = solr("foo", "bar", "large");
        resized.spec.version = "6.6".to_string();
        let second = sync.sync(&resized).await.unwrap();

        assert_eq!(first.address, second.address);
        let deployment: Deployment = store.object("bar", "solr-foo").unwrap();
        let image = deployment.spec.unwrap().template.spec.unwrap().containers[0]
            .image
            .clone();
        assert_eq!(image.as_deref(), Some("previousnext/solr:6.6"));
    }

    #[tokio::test]
    async fn create_failure_aborts_pass() {
        let store = MockStore::new();
        store.fail_on(Verb::Create, "Deployment");
        let (store, sync) = synchronizer(store);

        let err = sync.sync(&solr("foo", "bar", "small")).await.unwrap_err();
        assert!(err.is_transient());
        assert!(store.contains::<PersistentVolumeClaim>("bar", "solr-foo"));
        assert!(!store.contains::<Service>("bar", "solr-foo"));
    }

    #[tokio::test]
    async fn discovery_patch_is_additive() {
        let (store, sync) = synchronizer(
            MockStore::new().with_object(discovery_map(&[("database.host", "db")])),
        );
        let mut input = solr("foo", "bar", "small");
        input.spec.config_map = Some("discovery".to_string());

        let report = sync.sync(&input).await.unwrap();
        assert_eq!(report.discovery, DiscoverySync::Patched);

        let cm: ConfigMap = store.object("bar", "discovery").unwrap();
        let data = cm.data.unwrap();
        assert_eq!(data["database.host"], "db");
        assert_eq!(data["solr.foo.core1.host"], report.address.host);
        assert_eq!(data["solr.foo.core1.port"], "8983");
        assert_eq!(data["solr.foo.core1.core"], "core1");
        assert_eq!(data.len(), 4);
    }

    #[tokio::test]
    async fn missing_discovery_target_is_a_precondition_error() {
        let (store, sync) = synchronizer(MockStore::new());
        let mut input = solr("foo", "bar", "small");
        input.spec.config_map = Some("discovery".to_string());

        let err = sync.sync(&input).await.unwrap_err();
        assert!(matches!(
            err,
            OperatorError::DiscoveryTargetMissing { ref name, .. } if name == "discovery"
        ));
        assert!(!store.contains::<ConfigMap>("bar", "discovery"));
        assert!(store.contains::<Service>("bar", "solr-foo"));
    }

    #[tokio::test]
    async fn up_to_date_discovery_is_not_rewritten() {
        let (store, sync) = synchronizer(MockStore::new().with_object(discovery_map(&[])));
        let mut input = solr("foo", "bar", "small");
        input.spec.config_map = Some("discovery".to_string());

        sync.sync(&input).await.unwrap();
        store.clear_calls();

        let report = sync.sync(&input).await.unwrap();
        assert_eq!(report.discovery, DiscoverySync::Unchanged);
        assert!(!store.calls().iter().any(|c| c.is(Verb::Patch, "ConfigMap")));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_store_call_times_out() {
        let store = MockStore::new();
        store.delay_on(Verb::Create, "PersistentVolumeClaim", Duration::from_secs(60));
        let (_store, sync) = synchronizer(store);

        let err = sync.sync(&solr("foo", "bar", "small")).await.unwrap_err();
        match err {
            OperatorError::Timeout {
                operation,
                kind,
                name,
            } => {
                assert_eq!(operation, "create");
                assert_eq!(kind, "PersistentVolumeClaim");
                assert_eq!(name, "solr-foo");
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
