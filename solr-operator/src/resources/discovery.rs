//! Connection details published into a shared discovery ConfigMap.

use std::collections::BTreeMap;

/// The keys a Solr core contributes to a discovery ConfigMap.
///
/// Keys are prefixed with `solr.<name>.<core>` so several cores can share
/// one ConfigMap without clobbering each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryPatch {
    entries: BTreeMap<String, String>,
}

impl DiscoveryPatch {
    /// Build the patch for Solr resource `name` reachable at `host:port`.
    pub fn new(name: &str, core: &str, host: &str, port: &str) -> Self {
        let base = format!("solr.{name}.{core}");
        let entries = BTreeMap::from([
            (format!("{base}.host"), host.to_string()),
            (format!("{base}.port"), port.to_string()),
            (format!("{base}.core"), core.to_string()),
        ]);
        Self { entries }
    }

    /// Key/value pairs of the patch.
    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    /// Whether `data` already holds every key with the patched value.
    pub fn is_applied(&self, data: Option<&BTreeMap<String, String>>) -> bool {
        let Some(data) = data else {
            return false;
        };
        self.entries
            .iter()
            .all(|(key, value)| data.get(key) == Some(value))
    }

    /// JSON merge patch that writes only the patched keys.
    pub fn to_merge_patch(&self) -> serde_json::Value {
        serde_json::json!({ "data": self.entries })
    }
}
