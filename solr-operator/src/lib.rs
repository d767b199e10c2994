//! Solr Kubernetes Operator
//!
//! This crate provides a Kubernetes operator that runs single-core Solr
//! instances described by `Solr` custom resources.
//!
//! For each resource the operator keeps three objects named `solr-<name>` in
//! the resource's namespace:
//!
//! - a **PersistentVolumeClaim** holding the index data
//! - a **Deployment** running one Solr pod sized by the resource's size class
//! - a **Service** exposing Solr on port 8983
//!
//! When the resource names a ConfigMap, the service address is published into
//! it under `solr.<name>.core1.{host,port,core}`.
//!
//! # Example
//!
//! ```yaml
//! apiVersion: solr.k8s.io/v1
//! kind: Solr
//! metadata:
//!   name: foo
//!   namespace: bar
//! spec:
//!   size: small
//!   version: "6.6"
//!   configMap: discovery
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod resources;
pub mod sizing;
pub mod store;
pub mod telemetry;
pub mod testing;

pub use crd::{Solr, SolrSpec};
pub use error::{OperatorError, OperatorResult};
