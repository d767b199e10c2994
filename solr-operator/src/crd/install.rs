//! Installation of the Solr CustomResourceDefinition.

use super::Solr;
use crate::error::{OperatorError, OperatorResult};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Patch, PatchParams};
use kube::runtime::wait::{await_condition, conditions};
use kube::{Api, Client, CustomResourceExt, ResourceExt};
use std::time::Duration;

/// Field manager used for every server-side apply issued by the operator.
pub const FIELD_MANAGER: &str = "solr-operator";

/// How long to wait for the API server to accept the CRD.
const ESTABLISH_TIMEOUT: Duration = Duration::from_secs(30);

/// Apply the Solr CRD and wait until it is established.
pub async fn install_crd(client: Client) -> OperatorResult<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client);
    let crd = Solr::crd();
    let name = crd.name_any();

    tracing::info!(crd = %name, "Installing CustomResourceDefinition");

    crds.patch(
        &name,
        &PatchParams::apply(FIELD_MANAGER).force(),
        &Patch::Apply(&crd),
    )
    .await?;

    let established = await_condition(crds, &name, conditions::is_crd_established());
    match tokio::time::timeout(ESTABLISH_TIMEOUT, established).await {
        Ok(Ok(_)) => {
            tracing::info!(crd = %name, "CustomResourceDefinition established");
            Ok(())
        }
        Ok(Err(e)) => Err(OperatorError::Unavailable(format!(
            "waiting for CRD {name}: {e}"
        ))),
        Err(_) => Err(OperatorError::Timeout {
            operation: "establish",
            kind: "CustomResourceDefinition".to_string(),
            name,
        }),
    }
}

/// Render the CRD as YAML.
pub fn crd_yaml() -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(&Solr::crd())
}
