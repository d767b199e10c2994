//! Access to the Kubernetes API server as an object store.
//!
//! The controller only needs a handful of verbs on namespaced objects. They
//! are collected in [`ObjectStore`] so the reconciliation logic can run
//! against the real API server ([`KubeStore`]) or an in-memory store in tests
//! ([`crate::testing::MockStore`]).

use crate::crd::FIELD_MANAGER;
use crate::error::{OperatorError, OperatorResult, is_already_exists, is_not_found};
use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;

/// Namespaced object types the store can hold.
pub trait ManagedResource:
    Resource<Scope = NamespaceResourceScope, DynamicType = ()>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> ManagedResource for K where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Result of a create attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome<K> {
    /// The object was created; holds the stored object.
    Created(K),
    /// An object with the same name already exists; nothing was written.
    AlreadyExists,
}

/// Verbs the operator issues against the object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create `obj` in its own namespace.
    async fn create<K: ManagedResource>(&self, obj: &K) -> OperatorResult<CreateOutcome<K>>;

    /// Fetch an object, `None` if it does not exist.
    async fn get<K: ManagedResource>(&self, namespace: &str, name: &str)
    -> OperatorResult<Option<K>>;

    /// Make the stored object match `obj`, leaving fields assigned by the
    /// server (addresses, bound volumes) in place.
    async fn replace<K: ManagedResource>(&self, obj: &K) -> OperatorResult<K>;

    /// Apply a JSON merge patch to an existing object.
    async fn merge_patch<K: ManagedResource>(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> OperatorResult<K>;

    /// Delete an object. Missing objects yield [`OperatorError::NotFound`].
    async fn delete<K: ManagedResource>(&self, namespace: &str, name: &str) -> OperatorResult<()>;

    /// List objects in `namespace`, or in every namespace when `None`.
    async fn list<K: ManagedResource>(&self, namespace: Option<&str>) -> OperatorResult<Vec<K>>;
}

/// [`ObjectStore`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    /// Create a store using `client`.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K: ManagedResource>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn object_key<K: ManagedResource>(obj: &K) -> OperatorResult<(String, String)> {
    let meta = obj.meta();
    match (meta.namespace.clone(), meta.name.clone()) {
        (Some(namespace), Some(name)) => Ok((namespace, name)),
        _ => Err(OperatorError::InvalidConfig(format!(
            "{} must have a name and namespace",
            K::kind(&())
        ))),
    }
}

fn not_found<K: ManagedResource>(namespace: &str, name: &str) -> OperatorError {
    OperatorError::NotFound {
        kind: K::kind(&()).to_string(),
        name: name.to_string(),
        namespace: namespace.to_string(),
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn create<K: ManagedResource>(&self, obj: &K) -> OperatorResult<CreateOutcome<K>> {
        let (namespace, _) = object_key(obj)?;
        match self.api::<K>(&namespace).create(&PostParams::default(), obj).await {
            Ok(created) => Ok(CreateOutcome::Created(created)),
            Err(e) if is_already_exists(&e) => Ok(CreateOutcome::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    async fn get<K: ManagedResource>(
        &self,
        namespace: &str,
        name: &str,
    ) -> OperatorResult<Option<K>> {
        Ok(self.api::<K>(namespace).get_opt(name).await?)
    }

    async fn replace<K: ManagedResource>(&self, obj: &K) -> OperatorResult<K> {
        let (namespace, name) = object_key(obj)?;
        // Fields filled in by the API server are left alone by the apply.
        let applied = self
            .api::<K>(&namespace)
            .patch(
                &name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(obj),
            )
            .await?;
        Ok(applied)
    }

    async fn merge_patch<K: ManagedResource>(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> OperatorResult<K> {
        match self
            .api::<K>(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(patch))
            .await
        {
            Ok(patched) => Ok(patched),
            Err(e) if is_not_found(&e) => Err(not_found::<K>(namespace, name)),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete<K: ManagedResource>(&self, namespace: &str, name: &str) -> OperatorResult<()> {
        match self
            .api::<K>(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Err(not_found::<K>(namespace, name)),
            Err(e) => Err(e.into()),
        }
    }

    async fn list<K: ManagedResource>(&self, namespace: Option<&str>) -> OperatorResult<Vec<K>> {
        let api: Api<K> = match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        Ok(api.list(&ListParams::default()).await?.items)
    }
}
