//! PersistentVolumeClaim holding the Solr index.

use super::{STORAGE_CAPACITY, STORAGE_CLASS, labels, subordinate_name};
use crate::crd::Solr;
use k8s_openapi::api::core::v1::{
    PersistentVolumeClaim, PersistentVolumeClaimSpec, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

/// Annotation selecting the storage class; operators provision it up front.
const STORAGE_CLASS_ANNOTATION: &str = "volume.beta.kubernetes.io/storage-class";

/// Build the PersistentVolumeClaim for a Solr resource.
pub fn build_persistent_volume_claim(solr: &Solr, namespace: &str) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(subordinate_name(solr)),
            namespace: Some(namespace.to_string()),
            labels: Some(labels(solr)),
            annotations: Some(BTreeMap::from([(
                STORAGE_CLASS_ANNOTATION.to_string(),
                STORAGE_CLASS.to_string(),
            )])),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteMany".to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(STORAGE_CAPACITY.to_string()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_support::solr;

    #[test]
    fn read_write_many_fixed_capacity() {
        let pvc = build_persistent_volume_claim(&solr("foo", "bar", "large"), "bar");
        let spec = pvc.spec.as_ref().unwrap();

        assert_eq!(pvc.metadata.name.as_deref(), Some("solr-foo"));
        assert_eq!(pvc.metadata.namespace.as_deref(), Some("bar"));
        assert_eq!(spec.access_modes.as_deref().unwrap(), ["ReadWriteMany"]);

        let requests = spec
            .resources
            .as_ref()
            .and_then(|r| r.requests.as_ref())
            .unwrap();
        assert_eq!(requests["storage"], Quantity("10Gi".to_string()));
    }

    #[test]
    fn carries_storage_class_annotation() {
        let pvc = build_persistent_volume_claim(&solr("foo", "bar", "small"), "bar");
        let annotations = pvc.metadata.annotations.as_ref().unwrap();

        assert_eq!(
            annotations.get(STORAGE_CLASS_ANNOTATION).map(String::as_str),
            Some("solr")
        );
        assert_eq!(pvc.spec.as_ref().unwrap().storage_class_name, None);
    }

    #[test]
    fn capacity_does_not_depend_on_size() {
        let small = build_persistent_volume_claim(&solr("foo", "bar", "small"), "bar");
        let large = build_persistent_volume_claim(&solr("foo", "bar", "large"), "bar");
        assert_eq!(small.spec, large.spec);
    }
}
