//! Cluster-internal Service in front of the Solr pod.

use super::{SOLR_PORT, labels, selector_labels, subordinate_name};
use crate::crd::Solr;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

/// Build the ClusterIP Service for a Solr resource.
pub fn build_service(solr: &Solr, namespace: &str) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(subordinate_name(solr)),
            namespace: Some(namespace.to_string()),
            labels: Some(labels(solr)),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(selector_labels(solr)),
            ports: Some(vec![ServicePort {
                name: Some("solr".to_string()),
                port: SOLR_PORT,
                target_port: Some(IntOrString::Int(SOLR_PORT)),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}
