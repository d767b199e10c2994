//! Custom Resource Definitions for the Solr Kubernetes operator.
//!
//! - [`Solr`]: a single-core Solr deployment

mod install;
mod solr;

pub use install::{FIELD_MANAGER, crd_yaml, install_crd};
pub use solr::{BASELINE_VERSION, Solr, SolrSpec};
