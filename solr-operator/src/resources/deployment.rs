//! Deployment running a single Solr core.

use super::{
    DATA_PATH, IMAGE_REPOSITORY, SOLR_CORE, SOLR_PORT, SOLR_USER, labels, selector_labels,
    subordinate_name,
};
use crate::crd::Solr;
use crate::sizing::ResourceProfile;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, PersistentVolumeClaimVolumeSource, PodSpec,
    PodTemplateSpec, Probe, ResourceRequirements, TCPSocketAction, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

const DATA_VOLUME: &str = "data";
const REVISION_HISTORY_LIMIT: i32 = 2;
/// Loading a large index can take minutes; probes start after this.
const PROBE_INITIAL_DELAY_SECONDS: i32 = 300;
const PROBE_TIMEOUT_SECONDS: i32 = 10;

/// Build the Deployment for a Solr resource.
pub fn build_deployment(solr: &Solr, namespace: &str, profile: &ResourceProfile) -> Deployment {
    let name = subordinate_name(solr);
    let version = solr.spec.effective_version();

    Deployment {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels(solr)),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            revision_history_limit: Some(REVISION_HISTORY_LIMIT),
            selector: LabelSelector {
                match_labels: Some(selector_labels(solr)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels(solr)),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    init_containers: Some(vec![permissions_container()]),
                    containers: vec![solr_container(version, profile)],
                    volumes: Some(vec![Volume {
                        name: DATA_VOLUME.to_string(),
                        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                            claim_name: name,
                            read_only: None,
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Solr runs as an unprivileged user, so the volume must be handed over
/// before the main container starts.
fn permissions_container() -> Container {
    Container {
        name: "permissions".to_string(),
        image: Some(format!("{IMAGE_REPOSITORY}:init")),
        image_pull_policy: Some("Always".to_string()),
        command: Some(
            ["chown", "-R", SOLR_USER, DATA_PATH]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        ),
        volume_mounts: Some(vec![data_mount()]),
        ..Default::default()
    }
}

fn solr_container(version: &str, profile: &ResourceProfile) -> Container {
    let quantities = |cpu: Quantity| {
        BTreeMap::from([
            ("cpu".to_string(), cpu),
            ("memory".to_string(), profile.memory()),
        ])
    };

    Container {
        name: "solr".to_string(),
        image: Some(format!("{IMAGE_REPOSITORY}:{version}")),
        image_pull_policy: Some("Always".to_string()),
        ports: Some(vec![ContainerPort {
            name: Some("solr".to_string()),
            container_port: SOLR_PORT,
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        env: Some(vec![
            EnvVar {
                name: "SOLR_HEAP".to_string(),
                value: Some(profile.heap.to_string()),
                value_from: None,
            },
            EnvVar {
                name: "SOLR_CORE".to_string(),
                value: Some(SOLR_CORE.to_string()),
                value_from: None,
            },
        ]),
        liveness_probe: Some(tcp_probe()),
        readiness_probe: Some(tcp_probe()),
        resources: Some(ResourceRequirements {
            requests: Some(quantities(profile.cpu_request())),
            limits: Some(quantities(profile.cpu_limit())),
            ..Default::default()
        }),
        volume_mounts: Some(vec![data_mount()]),
        ..Default::default()
    }
}

fn tcp_probe() -> Probe {
    Probe {
        tcp_socket: Some(TCPSocketAction {
            port: IntOrString::Int(SOLR_PORT),
            host: None,
        }),
        initial_delay_seconds: Some(PROBE_INITIAL_DELAY_SECONDS),
        timeout_seconds: Some(PROBE_TIMEOUT_SECONDS),
        ..Default::default()
    }
}

fn data_mount() -> VolumeMount {
    VolumeMount {
        name: DATA_VOLUME.to_string(),
        mount_path: DATA_PATH.to_string(),
        ..Default::default()
    }
}
