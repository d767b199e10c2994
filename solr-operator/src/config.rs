//! Command-line and environment configuration of the operator process.

use crate::controller::{DEFAULT_CALL_TIMEOUT, DEFAULT_RESYNC_INTERVAL};
use crate::telemetry::LogFormat;
use clap::Parser;
use std::time::Duration;

/// Solr operator: keeps Solr cores running for Solr custom resources.
#[derive(Debug, Clone, Parser)]
#[command(name = "solr-operator")]
#[command(author, version, about, long_about = None)]
pub struct OperatorConfig {
    /// Namespace to watch. Empty watches every namespace.
    #[arg(long, env = "K8S_NAMESPACE", default_value = "")]
    pub namespace: String,

    /// Kubernetes API server URL. Defaults to in-cluster or kubeconfig settings.
    #[arg(long = "kubernetes", env = "K8S_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Seconds between full resyncs of every Solr resource.
    #[arg(
        long,
        env = "SOLR_OPERATOR_RESYNC_SECS",
        default_value_t = DEFAULT_RESYNC_INTERVAL.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub resync_interval_secs: u64,

    /// Seconds a single API call may take before it is abandoned.
    #[arg(
        long,
        env = "SOLR_OPERATOR_CALL_TIMEOUT_SECS",
        default_value_t = DEFAULT_CALL_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub call_timeout_secs: u64,

    /// Do not install or update the Solr CRD at startup.
    #[arg(long)]
    pub skip_crd_install: bool,

    /// Log output format.
    #[arg(long, env = "SOLR_OPERATOR_LOG_FORMAT", value_enum, default_value_t)]
    pub log_format: LogFormat,

    /// Print the Solr CRD as YAML and exit.
    #[arg(long)]
    pub print_crd: bool,
}

impl OperatorConfig {
    /// Namespace to watch, `None` for all namespaces.
    pub fn namespace_scope(&self) -> Option<&str> {
        let namespace = self.namespace.trim();
        (!namespace.is_empty()).then_some(namespace)
    }

    /// Interval between full resyncs.
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    /// Bound on a single API call.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}
