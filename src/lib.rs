//! `kubewait` blocks a resource operation until a Kubernetes object reaches a wanted state,
//! or is gone, within a bounded time. It backs the `wait_for` and `wait_for_delete` blocks
//! of Kubernetes custom resources managed through Terraform.
//!
//! ## Usage
//!
//! The shortest path is the ready-made [k8s::K8sWaiter], which reads any kind through the
//! dynamic API:
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use kube::api::{ApiResource, GroupVersionKind};
//! use kube::Client;
//! use kubewait::cache::CachedApiProvider;
//! use kubewait::k8s::{DynamicObjectState, K8sWaiter};
//! use kubewait::{AwaitResource, UpsertCondition, WaitForUpsert};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Client::try_default().await?;
//!     let gvk = GroupVersionKind::gvk("cert-manager.io", "v1", "Certificate");
//!     let provider = Arc::new(CachedApiProvider::new(client, ApiResource::from_gvk(&gvk)));
//!
//!     let waiter = K8sWaiter::new(DynamicObjectState::new(provider, "web-tls", Some("default".into())));
//!
//!     // Wait until the certificate reports Ready=True, checking every 5s for up to 30s.
//!     let wait = WaitForUpsert(vec![UpsertCondition {
//!         jsonpath: "$.status.conditions[0].status".into(),
//!         value: Some("True".into()),
//!         ..Default::default()
//!     }]);
//!     waiter.await_upsert(&wait).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Timeouts
//!
//! Durations are strings such as `"30s"` or `"2m"`. The defaults are a `30s` timeout and a
//! `5s` poll interval. A timeout of `0s` checks exactly once without waiting, a negative
//! timeout waits for up to one week ([wait::MAX_TIMEOUT]).
//!
//! ## Bring your own state
//!
//! Anything implementing [poller::FetchState] can be waited on, including plain async
//! closures:
//!
//! ```rust,ignore
//! use kubewait::{ConditionPoller, JsonPath, WaitSpec};
//!
//! let spec = WaitSpec::field_value(JsonPath::parse("$.status.phase")?, Some("Bound".into()));
//! let outcome = ConditionPoller::new()
//!     .poll_until(&spec, &|| async { my_client.read_volume_claim().await })
//!     .await;
//! outcome.into_result(&spec)?;
//! ```
//!
//! ## Error Handling
//!
//! Every failed wait ends in a single [error::Error]: [error::Error::WaitTimeout] when the
//! budget ran out, [error::Error::WaitCancelled] when the caller stopped it, the transport
//! error when reading the object failed, and a configuration error for malformed paths or
//! durations. Configuration errors are raised before the first read. Use
//! [diagnostics::Diagnostic] to present any of them to a user.

pub mod cache;
pub mod diagnostics;
pub mod error;
pub mod jsonpath;
pub mod k8s;
pub mod poller;
pub mod wait;

pub use diagnostics::Diagnostic;
pub use jsonpath::JsonPath;
pub use poller::ConditionPoller;
pub use poller::FetchState;
pub use poller::PollOutcome;
pub use wait::UpsertCondition;
pub use wait::WaitForDelete;
pub use wait::WaitForUpsert;
pub use wait::WaitMode;
pub use wait::WaitSpec;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// The AwaitResource trait runs the post-mutation waits of a resource.
///
/// Implementors provide the [FetchState] of the object they manage; the waits after create,
/// update and delete come as default methods.
#[async_trait]
pub trait AwaitResource: Send + Sync {
    type State: FetchState;

    /// Returns the state accessor of the managed object.
    fn state(&self) -> &Self::State;

    /// Returns the token that stops a running wait. Override it to share one with the
    /// surrounding operation; the default is never cancelled.
    fn cancellation(&self) -> CancellationToken {
        CancellationToken::new()
    }

    /// Waits for every upsert condition in order, each with its own budget.
    ///
    /// All conditions are validated before the first read, so a malformed path in the last
    /// condition does not cost the time budget of the earlier ones.
    async fn await_upsert(&self, wait: &WaitForUpsert) -> Result<()> {
        let specs = wait.specs()?;
        let poller = ConditionPoller::with_cancellation(self.cancellation());

        for spec in &specs {
            log::info!(condition:% = spec.mode; "Waiting for resource condition.");
            poller.poll_until(spec, self.state()).await.into_result(spec)?;
        }

        Ok(())
    }

    /// Waits until the object is gone.
    async fn await_deletion(&self, wait: &WaitForDelete) -> Result<()> {
        let spec = WaitSpec::try_from(wait)?;

        log::info!(timeout:? = spec.effective_timeout(); "Waiting for resource deletion.");
        ConditionPoller::with_cancellation(self.cancellation())
            .poll_until(&spec, self.state())
            .await
            .into_result(&spec)
    }
}
