//! Wait For Resource Example
//!
//! Waits on a live object the way a resource handler does after a create/update and after a
//! delete. By default it waits for a Pod's `status.phase` to become `Running`.
//!
//! To run this example:
//! ```bash
//! cargo run --example wait_for_resource -- default my-pod Running
//! ```
//!
//! Press Ctrl-C to cancel the wait. This example requires a working Kubernetes cluster and
//! kubectl configuration.

use std::sync::Arc;

use kube::api::ApiResource;
use kube::api::GroupVersionKind;
use kube::Client;
use kubewait::cache::CachedApiProvider;
use kubewait::k8s::DynamicObjectState;
use kubewait::k8s::K8sWaiter;
use kubewait::AwaitResource;
use kubewait::Diagnostic;
use kubewait::UpsertCondition;
use kubewait::WaitForDelete;
use kubewait::WaitForUpsert;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let namespace = args.next().unwrap_or_else(|| "default".to_string());
    let name = args.next().unwrap_or_else(|| "my-pod".to_string());
    let phase = args.next().unwrap_or_else(|| "Running".to_string());

    let client = Client::try_default().await?;
    let pods = ApiResource::from_gvk_with_plural(&GroupVersionKind::gvk("", "v1", "Pod"), "pods");
    let provider = Arc::new(CachedApiProvider::new(client, pods));

    // Cancel the wait on Ctrl-C instead of sitting out the current poll interval
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let waiter = K8sWaiter::with_cancellation(DynamicObjectState::new(provider, name.as_str(), Some(namespace)), cancel);

    tracing::info!("Waiting for pod {} to reach phase {}", name, phase);
    let upsert = WaitForUpsert(vec![UpsertCondition {
        jsonpath: "$.status.phase".to_string(),
        value: Some(phase),
        timeout: Some("2m".to_string()),
        poll_interval: Some("2s".to_string()),
    }]);
    if let Err(error) = waiter.await_upsert(&upsert).await {
        tracing::error!("{}", Diagnostic::from(&error));
        return Ok(());
    }

    tracing::info!("Delete the pod now (kubectl delete pod {}); waiting for it to go away", name);
    let delete = WaitForDelete {
        timeout: Some("5m".to_string()),
        poll_interval: Some("5s".to_string()),
    };
    match waiter.await_deletion(&delete).await {
        Ok(()) => tracing::info!("Pod {} is gone", name),
        Err(error) => tracing::error!("{}", Diagnostic::from(&error)),
    }

    Ok(())
}
