//! In-memory object store for tests.
//!
//! [`MockStore`] keeps objects as JSON, assigns resource versions and service
//! addresses the way the API server would, records every call, and can be told
//! to fail or stall specific calls.
//!
//! # Example
//!
//! ```
//! use k8s_openapi::api::core::v1::ConfigMap;
//! use solr_operator::testing::{MockStore, Verb};
//!
//! let store = MockStore::new().with_object(ConfigMap {
//!     metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
//!         name: Some("discovery".into()),
//!         namespace: Some("bar".into()),
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! });
//! store.fail_on(Verb::Delete, "Service");
//!
//! assert!(store.contains::<ConfigMap>("bar", "discovery"));
//! assert!(store.calls().is_empty());
//! ```

use crate::error::{OperatorError, OperatorResult};
use crate::store::{CreateOutcome, ManagedResource, ObjectStore};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Store verbs, as recorded in the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// [`ObjectStore::create`]
    Create,
    /// [`ObjectStore::get`]
    Get,
    /// [`ObjectStore::replace`]
    Replace,
    /// [`ObjectStore::merge_patch`]
    Patch,
    /// [`ObjectStore::delete`]
    Delete,
    /// [`ObjectStore::list`]
    List,
}

impl Verb {
    /// Whether the verb can change stored state.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Verb::Create | Verb::Replace | Verb::Patch | Verb::Delete
        )
    }
}

/// One recorded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    /// Verb issued.
    pub verb: Verb,
    /// Object kind, e.g. `Service`.
    pub kind: String,
    /// Namespace, `None` for cluster-wide lists.
    pub namespace: Option<String>,
    /// Object name, `None` for lists.
    pub name: Option<String>,
}

impl StoreCall {
    /// Whether this call matches `verb` on `kind`.
    pub fn is(&self, verb: Verb, kind: &str) -> bool {
        self.verb == verb && self.kind == kind
    }
}

/// Identity of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ObjectKey {
    /// Object kind.
    pub kind: String,
    /// Object namespace.
    pub namespace: String,
    /// Object name.
    pub name: String,
}

#[derive(Default)]
struct MockState {
    objects: BTreeMap<ObjectKey, Value>,
    calls: Vec<StoreCall>,
    failures: Vec<(Verb, String)>,
    delays: Vec<(Verb, String, Duration)>,
    resource_version: u64,
    cluster_ips: u32,
}

impl MockState {
    fn next_resource_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }

    fn next_cluster_ip(&mut self) -> String {
        self.cluster_ips += 1;
        format!("10.96.{}.{}", self.cluster_ips / 250, self.cluster_ips % 250 + 1)
    }

    /// Fill in what the API server assigns on create.
    fn admit(&mut self, kind: &str, value: &mut Value) {
        let rv = self.next_resource_version();
        value["metadata"]["resourceVersion"] = Value::String(rv);

        if kind == "Service" {
            let spec = &mut value["spec"];
            let allocated = spec
                .get("clusterIP")
                .and_then(Value::as_str)
                .is_some_and(|ip| !ip.is_empty());
            if !allocated {
                spec["clusterIP"] = Value::String(self.next_cluster_ip());
            }
        }
    }

    /// Store `updated` under `key`, bumping the resource version only when
    /// the content actually changed.
    fn commit(&mut self, key: ObjectKey, mut updated: Value) -> Value {
        if self.objects.get(&key) != Some(&updated) {
            updated["metadata"]["resourceVersion"] = Value::String(self.next_resource_version());
        }
        self.objects.insert(key, updated.clone());
        updated
    }
}

/// In-memory [`ObjectStore`].
#[derive(Default)]
pub struct MockStore {
    state: RwLock<MockState>,
}

impl MockStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object, as if it had been created by someone else.
    pub fn with_object<K: ManagedResource>(self, obj: K) -> Self {
        self.insert(obj);
        self
    }

    /// Seed an object without recording a call.
    pub fn insert<K: ManagedResource>(&self, obj: K) {
        let key = key_of(&obj).expect("seeded objects need a name and namespace");
        let mut value = serde_json::to_value(&obj).expect("seeded objects must serialize");
        let mut state = self.state.write();
        state.admit(&key.kind, &mut value);
        state.objects.insert(key, value);
    }

    /// Make every `verb` call on `kind` fail with a transient error.
    pub fn fail_on(&self, verb: Verb, kind: &str) {
        self.state.write().failures.push((verb, kind.to_string()));
    }

    /// Make every `verb` call on `kind` take `delay` before answering.
    pub fn delay_on(&self, verb: Verb, kind: &str, delay: Duration) {
        self.state
            .write()
            .delays
            .push((verb, kind.to_string(), delay));
    }

    /// Remove all injected failures and delays.
    pub fn heal(&self) {
        let mut state = self.state.write();
        state.failures.clear();
        state.delays.clear();
    }

    /// Stored object, if present.
    pub fn object<K: ManagedResource>(&self, namespace: &str, name: &str) -> Option<K> {
        let key = key_for::<K>(namespace, name);
        self.state
            .read()
            .objects
            .get(&key)
            .map(|v| serde_json::from_value(v.clone()).expect("stored objects must deserialize"))
    }

    /// Whether an object is stored.
    pub fn contains<K: ManagedResource>(&self, namespace: &str, name: &str) -> bool {
        self.state
            .read()
            .objects
            .contains_key(&key_for::<K>(namespace, name))
    }

    /// Raw copy of every stored object.
    pub fn snapshot(&self) -> BTreeMap<ObjectKey, Value> {
        self.state.read().objects.clone()
    }

    /// Every call issued so far, oldest first.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.read().calls.clone()
    }

    /// Calls that could have changed stored state.
    pub fn writes(&self) -> Vec<StoreCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.verb.is_write())
            .collect()
    }

    /// Forget the call log.
    pub fn clear_calls(&self) {
        self.state.write().calls.clear();
    }

    /// Record a call and apply any injected delay or failure.
    async fn enter(
        &self,
        verb: Verb,
        kind: &str,
        namespace: Option<&str>,
        name: Option<&str>,
    ) -> OperatorResult<()> {
        let (delay, fail) = {
            let mut state = self.state.write();
            state.calls.push(StoreCall {
                verb,
                kind: kind.to_string(),
                namespace: namespace.map(str::to_string),
                name: name.map(str::to_string),
            });
            let delay = state
                .delays
                .iter()
                .find(|(v, k, _)| *v == verb && k == kind)
                .map(|(_, _, d)| *d);
            let fail = state.failures.iter().any(|(v, k)| *v == verb && k == kind);
            (delay, fail)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(OperatorError::Unavailable(format!(
                "injected {verb:?} failure for {kind}"
            )));
        }
        Ok(())
    }
}

fn key_for<K: ManagedResource>(namespace: &str, name: &str) -> ObjectKey {
    ObjectKey {
        kind: K::kind(&()).to_string(),
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

fn key_of<K: ManagedResource>(obj: &K) -> OperatorResult<ObjectKey> {
    let meta = obj.meta();
    match (&meta.namespace, &meta.name) {
        (Some(namespace), Some(name)) => Ok(key_for::<K>(namespace, name)),
        _ => Err(OperatorError::InvalidConfig(format!(
            "{} must have a name and namespace",
            K::kind(&())
        ))),
    }
}

fn not_found(key: &ObjectKey) -> OperatorError {
    OperatorError::NotFound {
        kind: key.kind.clone(),
        name: key.name.clone(),
        namespace: key.namespace.clone(),
    }
}

/// Overlay `desired` onto `target`: objects merge key by key, anything else
/// is replaced. Fields only present in `target` survive.
fn overlay(target: &mut Value, desired: &Value) {
    match (target, desired) {
        (Value::Object(target), Value::Object(desired)) => {
            for (key, value) in desired {
                overlay(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target, desired) => *target = desired.clone(),
    }
}

/// RFC 7386 JSON merge patch.
fn apply_merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Default::default());
    }
    if let Value::Object(target) = target {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(key);
            } else {
                apply_merge_patch(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

#[async_trait]
impl ObjectStore for MockStore {
    async fn create<K: ManagedResource>(&self, obj: &K) -> OperatorResult<CreateOutcome<K>> {
        let key = key_of(obj)?;
        self.enter(Verb::Create, &key.kind, Some(&key.namespace), Some(&key.name))
            .await?;

        let mut state = self.state.write();
        if state.objects.contains_key(&key) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        let mut value = serde_json::to_value(obj)?;
        state.admit(&key.kind, &mut value);
        state.objects.insert(key, value.clone());
        Ok(CreateOutcome::Created(serde_json::from_value(value)?))
    }

    async fn get<K: ManagedResource>(
        &self,
        namespace: &str,
        name: &str,
    ) -> OperatorResult<Option<K>> {
        let key = key_for::<K>(namespace, name);
        self.enter(Verb::Get, &key.kind, Some(namespace), Some(name))
            .await?;

        let value = self.state.read().objects.get(&key).cloned();
        Ok(value.map(serde_json::from_value).transpose()?)
    }

    async fn replace<K: ManagedResource>(&self, obj: &K) -> OperatorResult<K> {
        let key = key_of(obj)?;
        self.enter(Verb::Replace, &key.kind, Some(&key.namespace), Some(&key.name))
            .await?;

        let desired = serde_json::to_value(obj)?;
        let mut state = self.state.write();
        let updated = match state.objects.get(&key) {
            Some(existing) => {
                let mut merged = existing.clone();
                overlay(&mut merged, &desired);
                merged
            }
            None => {
                let mut value = desired;
                state.admit(&key.kind, &mut value);
                value
            }
        };
        let stored = state.commit(key, updated);
        Ok(serde_json::from_value(stored)?)
    }

    async fn merge_patch<K: ManagedResource>(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> OperatorResult<K> {
        let key = key_for::<K>(namespace, name);
        self.enter(Verb::Patch, &key.kind, Some(namespace), Some(name))
            .await?;

        let mut state = self.state.write();
        let mut updated = state
            .objects
            .get(&key)
            .cloned()
            .ok_or_else(|| not_found(&key))?;
        apply_merge_patch(&mut updated, patch);
        let stored = state.commit(key, updated);
        Ok(serde_json::from_value(stored)?)
    }

    async fn delete<K: ManagedResource>(&self, namespace: &str, name: &str) -> OperatorResult<()> {
        let key = key_for::<K>(namespace, name);
        self.enter(Verb::Delete, &key.kind, Some(namespace), Some(name))
            .await?;

        match self.state.write().objects.remove(&key) {
            Some(_) => Ok(()),
            None => Err(not_found(&key)),
        }
    }

    async fn list<K: ManagedResource>(&self, namespace: Option<&str>) -> OperatorResult<Vec<K>> {
        let kind = K::kind(&()).to_string();
        self.enter(Verb::List, &kind, namespace, None).await?;

        let values: Vec<Value> = self
            .state
            .read()
            .objects
            .iter()
            .filter(|(key, _)| key.kind == kind)
            .filter(|(key, _)| namespace.is_none_or(|ns| key.namespace == ns))
            .map(|(_, value)| value.clone())
            .collect();

        values
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(OperatorError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{ConfigMap, Service, ServiceSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn meta(namespace: &str, name: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        }
    }

    fn config_map(data: &[(&str, &str)]) -> ConfigMap {
        ConfigMap {
            metadata: meta("bar", "discovery"),
            data: Some(
                data.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_reports_existing_objects() {
        let store = MockStore::new();
        let cm = config_map(&[("a", "1")]);

        assert!(matches!(
            store.create(&cm).await.unwrap(),
            CreateOutcome::Created(_)
        ));
        assert_eq!(
            store.create(&cm).await.unwrap(),
            CreateOutcome::AlreadyExists
        );
        assert_eq!(store.calls().len(), 2);
    }

    #[tokio::test]
    async fn services_get_an_address() {
        let store = MockStore::new();
        let svc = Service {
            metadata: meta("bar", "solr-foo"),
            spec: Some(ServiceSpec::default()),
            ..Default::default()
        };
        store.create(&svc).await.unwrap();

        let stored: Service = store.object("bar", "solr-foo").unwrap();
        let ip = stored.spec.unwrap().cluster_ip.unwrap();
        assert!(ip.starts_with("10.96."));
    }

    #[tokio::test]
    async fn unchanged_replace_keeps_resource_version() {
        let store = MockStore::new().with_object(config_map(&[("a", "1")]));
        let before = store.snapshot();

        store.replace(&config_map(&[("a", "1")])).await.unwrap();
        assert_eq!(store.snapshot(), before);

        store.replace(&config_map(&[("a", "2")])).await.unwrap();
        assert_ne!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn merge_patch_removes_null_keys() {
        let store = MockStore::new().with_object(config_map(&[("a", "1"), ("b", "2")]));
        let patched: ConfigMap = store
            .merge_patch(
                "bar",
                "discovery",
                &serde_json::json!({"data": {"a": null, "c": "3"}}),
            )
            .await
            .unwrap();

        let data = patched.data.unwrap();
        assert_eq!(data.get("a"), None);
        assert_eq!(data["b"], "2");
        assert_eq!(data["c"], "3");
    }

    #[tokio::test]
    async fn injected_failures_are_recorded() {
        let store = MockStore::new().with_object(config_map(&[]));
        store.fail_on(Verb::Delete, "ConfigMap");

        let err = store
            .delete::<ConfigMap>("bar", "discovery")
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(store.contains::<ConfigMap>("bar", "discovery"));
        assert!(store.calls()[0].is(Verb::Delete, "ConfigMap"));

        store.heal();
        store.delete::<ConfigMap>("bar", "discovery").await.unwrap();
        assert!(!store.contains::<ConfigMap>("bar", "discovery"));
    }

    #[tokio::test]
    async fn list_filters_by_namespace() {
        let store = MockStore::new().with_object(config_map(&[]));
        let mut other = config_map(&[]);
        other.metadata.namespace = Some("elsewhere".to_string());
        store.insert(other);

        assert_eq!(store.list::<ConfigMap>(None).await.unwrap().len(), 2);
        assert_eq!(store.list::<ConfigMap>(Some("bar")).await.unwrap().len(), 1);
        assert!(store.list::<Service>(None).await.unwrap().is_empty());
    }
}
