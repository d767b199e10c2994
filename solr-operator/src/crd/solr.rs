//! Solr Custom Resource Definition.
//!
//! Defines a single-core Solr deployment in Kubernetes.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Solr release used when a resource does not pin a version.
pub const BASELINE_VERSION: &str = "5.x";

/// Solr is the Schema for the solrs API.
///
/// A Solr resource describes one Solr core. The operator creates a
/// PersistentVolumeClaim, Deployment and Service named `solr-<name>` for it and,
/// when `configMap` is set, publishes the service address into that ConfigMap.
#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "solr.k8s.io",
    version = "v1",
    kind = "Solr",
    plural = "solrs",
    shortname = "solr",
    namespaced,
    derive = "PartialEq",
    printcolumn = r#"{"name":"Size", "type":"string", "jsonPath":".spec.size"}"#,
    printcolumn = r#"{"name":"Version", "type":"string", "jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"ConfigMap", "type":"string", "jsonPath":".spec.configMap"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SolrSpec {
    /// Size class: small, medium or large.
    #[serde(default = "default_size")]
    pub size: String,

    /// Solr image tag. Empty means the baseline release.
    #[serde(default)]
    pub version: String,

    /// Name of a ConfigMap in the same namespace that receives the
    /// connection details of this core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map: Option<String>,
}

fn default_size() -> String {
    "small".to_string()
}

impl SolrSpec {
    /// Version to deploy, falling back to [`BASELINE_VERSION`].
    pub fn effective_version(&self) -> &str {
        let version = self.version.trim();
        if version.is_empty() {
            BASELINE_VERSION
        } else {
            version
        }
    }

    /// Discovery ConfigMap name, if one is configured.
    pub fn discovery_target(&self) -> Option<&str> {
        self.config_map
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

impl Default for SolrSpec {
    fn default() -> Self {
        Self {
            size: default_size(),
            version: String::new(),
            config_map: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_defaults_to_baseline() {
        let spec = SolrSpec::default();
        assert_eq!(spec.effective_version(), BASELINE_VERSION);

        let spec = SolrSpec {
            version: "6.6".to_string(),
            ..Default::default()
        };
        assert_eq!(spec.effective_version(), "6.6");
    }

    #[test]
    fn blank_config_map_is_no_target() {
        let spec = SolrSpec {
            config_map: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(spec.discovery_target(), None);

        let spec = SolrSpec {
            config_map: Some("discovery".to_string()),
            ..Default::default()
        };
        assert_eq!(spec.discovery_target(), Some("discovery"));
    }

    #[test]
    fn spec_deserializes_with_defaults() {
        let spec: SolrSpec = serde_json::from_str(r#"{"configMap":"apps"}"#)
            .expect("Failed to parse SolrSpec from JSON");
        assert_eq!(spec.size, "small");
        assert_eq!(spec.version, "");
        assert_eq!(spec.config_map.as_deref(), Some("apps"));
    }

    #[test]
    fn spec_serialization_uses_camel_case() {
        let spec = SolrSpec {
            size: "large".to_string(),
            version: "7.x".to_string(),
            config_map: Some("apps".to_string()),
        };

        let json = serde_json::to_string(&spec).expect("Failed to serialize SolrSpec to JSON");
        assert!(json.contains("\"configMap\":\"apps\""));
        assert!(json.contains("\"size\":\"large\""));
    }
}
