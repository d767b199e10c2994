//! Solr Kubernetes Operator binary.
//!
//! Watches Solr custom resources and keeps their claim, deployment, service
//! and discovery entries in place until shut down by SIGINT or SIGTERM.

use clap::Parser;
use kube::Client;
use solr_operator::config::OperatorConfig;
use solr_operator::controller::{Operator, Synchronizer, watch_solrs};
use solr_operator::crd::{crd_yaml, install_crd};
use solr_operator::store::KubeStore;
use solr_operator::telemetry::init_tracing;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = OperatorConfig::parse();

    if config.print_crd {
        print!("{}", crd_yaml()?);
        return Ok(());
    }

    init_tracing(config.log_format)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Solr operator");

    let client = connect(&config).await?;
    tracing::info!("Connected to Kubernetes cluster");

    if config.skip_crd_install {
        tracing::info!("Skipping CRD installation");
    } else {
        install_crd(client.clone()).await?;
    }

    let store = Arc::new(KubeStore::new(client.clone()));
    let synchronizer = Synchronizer::new(store, config.call_timeout());
    let namespace = config.namespace_scope().map(str::to_string);
    let operator = Operator::new(synchronizer, namespace.clone(), config.resync_interval());

    tokio::spawn(shutdown_on_signal(operator.shutdown_token()));

    operator.run(watch_solrs(client, namespace)).await;

    tracing::info!("Solr operator stopped");
    Ok(())
}

/// Build a client for `--kubernetes`, or from the ambient kubeconfig or
/// in-cluster environment.
async fn connect(config: &OperatorConfig) -> anyhow::Result<Client> {
    match config.endpoint.as_deref() {
        Some(endpoint) => {
            tracing::info!(endpoint, "Using explicit API server endpoint");
            let kube_config = kube::Config::new(endpoint.parse()?);
            Ok(Client::try_from(kube_config)?)
        }
        None => Ok(Client::try_default().await?),
    }
}

/// Cancel `token` on SIGINT or SIGTERM.
async fn shutdown_on_signal(token: CancellationToken) {
    let interrupt = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    cancel_after_signal(token, interrupt, terminate).await;
}

/// Cancel `token` once `interrupt` or `terminate` fires. A failed `interrupt`
/// listener leaves `terminate` in charge.
async fn cancel_after_signal(
    token: CancellationToken,
    interrupt: impl Future<Output = std::io::Result<()>>,
    terminate: impl Future<Output = ()>,
) {
    let mut terminate = std::pin::pin!(terminate);
    let interrupted = tokio::select! {
        result = interrupt => result,
        _ = terminate.as_mut() => Ok(()),
    };

    match interrupted {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::warn!(error = %e, "Cannot listen for SIGINT, waiting for SIGTERM");
            terminate.await;
            tracing::info!("Received SIGTERM");
        }
    }

    token.cancel();
}
