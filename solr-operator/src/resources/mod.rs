//! Builders for the Kubernetes objects that back a Solr resource.
//!
//! Everything in this module is pure: the same [`Solr`] always produces the
//! same objects, which is what keeps repeated synchronization a no-op.

mod deployment;
mod discovery;
mod pvc;
mod service;

pub use deployment::build_deployment;
pub use discovery::DiscoveryPatch;
pub use pvc::build_persistent_volume_claim;
pub use service::build_service;

use crate::crd::Solr;
use crate::error::{OperatorError, OperatorResult};
use crate::sizing;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Service};
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Port Solr listens on.
pub const SOLR_PORT: i32 = 8983;
/// Core created inside every Solr pod.
pub const SOLR_CORE: &str = "core1";
/// Data directory mounted from the claim.
pub const DATA_PATH: &str = "/opt/solr/data";
/// Image repository for both the init and the main container.
pub const IMAGE_REPOSITORY: &str = "previousnext/solr";
/// User and group the Solr process runs as.
pub const SOLR_USER: &str = "solr:solr";
/// Storage class operators must provision for Solr claims.
pub const STORAGE_CLASS: &str = "solr";
/// Capacity requested by every claim.
pub const STORAGE_CAPACITY: &str = "10Gi";

/// Name shared by all subordinate objects of a Solr resource.
pub fn subordinate_name(solr: &Solr) -> String {
    format!("solr-{}", solr.name_any())
}

/// Namespace of a Solr resource. Solr is namespaced, so a missing
/// namespace means the object did not come from the API server.
pub fn namespace_of(solr: &Solr) -> OperatorResult<String> {
    solr.namespace()
        .ok_or_else(|| OperatorError::InvalidConfig("Solr must be namespaced".into()))
}

/// Labels applied to every subordinate object.
pub fn labels(solr: &Solr) -> BTreeMap<String, String> {
    let mut labels = selector_labels(solr);
    labels.insert(
        "app.kubernetes.io/managed-by".to_string(),
        "solr-operator".to_string(),
    );
    labels
}

/// Labels the service uses to select Solr pods.
pub fn selector_labels(solr: &Solr) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app.kubernetes.io/name".to_string(), "solr".to_string()),
        ("app.kubernetes.io/instance".to_string(), solr.name_any()),
    ])
}

/// The primary objects generated for one Solr resource.
#[derive(Debug, Clone, PartialEq)]
pub struct SolrResources {
    /// Namespace all three objects live in.
    pub namespace: String,
    /// Storage for the index.
    pub persistent_volume_claim: PersistentVolumeClaim,
    /// The Solr workload.
    pub deployment: Deployment,
    /// Cluster-internal endpoint.
    pub service: Service,
}

/// Translate a Solr resource into its claim, deployment and service.
///
/// Fails before producing anything when the size class is unknown.
pub fn translate(solr: &Solr) -> OperatorResult<SolrResources> {
    let namespace = namespace_of(solr)?;
    let profile = sizing::resolve(&solr.spec.size)?;

    Ok(SolrResources {
        persistent_volume_claim: build_persistent_volume_claim(solr, &namespace),
        deployment: build_deployment(solr, &namespace, &profile),
        service: build_service(solr, &namespace),
        namespace,
    })
}


#[cfg(test)]
mod tests {
    use super::test_support::solr;
    use super::*;

    #[test]
    fn all_objects_share_name_and_namespace() {
        for (name, namespace) in [("foo", "bar"), ("catalog", "shop"), ("a-b-c", "default")] {
            let resources = translate(&solr(name, namespace, "medium")).unwrap();
            assert_eq!(resources.namespace, namespace);
            let expected = format!("solr-{name}");

            for (kind, meta) in [
                ("claim", &resources.persistent_volume_claim.metadata),
                ("deployment", &resources.deployment.metadata),
                ("service", &resources.service.metadata),
            ] {
                assert_eq!(meta.name.as_deref(), Some(expected.as_str()), "{kind}");
                assert_eq!(meta.namespace.as_deref(), Some(namespace), "{kind}");
            }
        }
    }

    #[test]
    fn translate_is_deterministic() {
        let input = solr("foo", "bar", "large");
        let first = serde_json::to_vec(&translate(&input).unwrap().deployment).unwrap();
        let second = serde_json::to_vec(&translate(&input.clone()).unwrap().deployment).unwrap();
        assert_eq!(first, second);
        assert_eq!(translate(&input).unwrap(), translate(&input).unwrap());
    }

    #[test]
    fn explicit_baseline_version_matches_default() {
        let defaulted = solr("foo", "bar", "small");
        let mut pinned = defaulted.clone();
        pinned.spec.version = crate::crd::BASELINE_VERSION.to_string();

        assert_eq!(
            translate(&defaulted).unwrap().deployment,
            translate(&pinned).unwrap().deployment
        );
    }

    #[test]
    fn unknown_size_fails_translation() {
        let err = translate(&solr("foo", "bar", "gigantic")).unwrap_err();
        assert!(matches!(err, OperatorError::UnknownSizeClass(ref s) if s == "gigantic"));
    }

    #[test]
    fn missing_namespace_is_invalid() {
        let mut input = solr("foo", "bar", "small");
        input.metadata.namespace = None;
        assert!(matches!(
            translate(&input),
            Err(OperatorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn translate_does_not_mutate_input() {
        let input = solr("foo", "bar", "small");
        let before = input.clone();
        translate(&input).unwrap();
        assert_eq!(input.spec, before.spec);
        assert!(input.spec.version.is_empty());
    }
}
