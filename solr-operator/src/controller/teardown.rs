//! Removal of the objects behind a deleted Solr resource.

use super::Synchronizer;
use crate::crd::Solr;
use crate::error::{OperatorError, OperatorResult};
use crate::resources::{namespace_of, subordinate_name};
use crate::store::{ManagedResource, ObjectStore};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Service};
use tracing::{debug, info};

impl<S: ObjectStore> Synchronizer<S> {
    /// Delete the claim, service and deployment of `solr`, in that order.
    ///
    /// The first failed delete stops the sequence; earlier deletes are not
    /// undone and the next event retries. Objects that are already gone
    /// count as deleted.
    ///
    /// Discovery entries written by [`Synchronizer::sync`] are left in the
    /// ConfigMap. Consumers may still see the address of a removed core.
    pub async fn teardown(&self, solr: &Solr) -> OperatorResult<()> {
        let namespace = namespace_of(solr)?;
        let name = subordinate_name(solr);

        self.delete_one::<PersistentVolumeClaim>(&namespace, &name).await?;
        self.delete_one::<Service>(&namespace, &name).await?;
        self.delete_one::<Deployment>(&namespace, &name).await?;

        info!(namespace = %namespace, name = %name, "Solr resources removed");
        Ok(())
    }

    async fn delete_one<K: ManagedResource>(
        &self,
        namespace: &str,
        name: &str,
    ) -> OperatorResult<()> {
        let kind = K::kind(&());
        match self
            .bounded("delete", &kind, name, self.store.delete::<K>(namespace, name))
            .await
        {
            Ok(()) => {
                info!(kind = %kind, namespace = %namespace, name = %name, "Deleted");
                Ok(())
            }
            Err(OperatorError::NotFound { .. }) => {
                debug!(kind = %kind, namespace = %namespace, name = %name, "Already deleted");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
