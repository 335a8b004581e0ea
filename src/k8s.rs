//! Kubernetes-backed resource state for waits.
//!
//! [DynamicObjectState] reads one object of any kind through the dynamic API and hands its
//! body to the poller as plain JSON. [K8sWaiter] bundles it with a cancellation token and
//! implements [crate::AwaitResource], so resource handlers get the upsert and delete waits
//! without further code.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::cache::ProvideApi;
use crate::error::Result;
use crate::poller::FetchState;
use crate::AwaitResource;

/// The state of one named object, fetched through a [ProvideApi].
pub struct DynamicObjectState<P>
where
    P: ProvideApi,
{
    api_provider: Arc<P>,
    name: String,
    namespace: Option<String>,
}

impl<P> DynamicObjectState<P>
where
    P: ProvideApi,
{
    /// `namespace` is `None` for cluster-scoped kinds.
    pub fn new(api_provider: Arc<P>, name: impl Into<String>, namespace: Option<String>) -> Self {
        Self {
            api_provider,
            name: name.into(),
            namespace,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

#[async_trait]
impl<P> FetchState for DynamicObjectState<P>
where
    P: ProvideApi,
{
    /// A missing object is `Ok(None)`; every other API failure is returned as is.
    async fn fetch(&self) -> Result<Option<Value>> {
        let api = self.api_provider.get(self.namespace())?;
        tracing::debug!(
            kind = %self.api_provider.api_resource().kind,
            name = %self.name,
            namespace = ?self.namespace,
            "Reading object state"
        );
        let object = api.get_opt(&self.name).await?;

        Ok(object.map(serde_json::to_value).transpose()?)
    }
}

/// A ready-to-use [AwaitResource] for one Kubernetes object.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
///
/// use kube::api::{ApiResource, GroupVersionKind};
/// use kubewait::cache::CachedApiProvider;
/// use kubewait::k8s::{DynamicObjectState, K8sWaiter};
/// use kubewait::{AwaitResource, WaitForDelete};
///
/// let gvk = GroupVersionKind::gvk("cert-manager.io", "v1", "Certificate");
/// let provider = Arc::new(CachedApiProvider::new(client, ApiResource::from_gvk(&gvk)));
/// let waiter = K8sWaiter::new(DynamicObjectState::new(provider, "web-tls", Some("default".into())));
///
/// waiter.await_deletion(&WaitForDelete::default()).await?;
/// ```
pub struct K8sWaiter<P>
where
    P: ProvideApi,
{
    state: DynamicObjectState<P>,
    cancel: CancellationToken,
}

impl<P> K8sWaiter<P>
where
    P: ProvideApi,
{
    pub fn new(state: DynamicObjectState<P>) -> Self {
        Self::with_cancellation(state, CancellationToken::new())
    }

    /// Shares `cancel` with the caller so an interrupted operation can stop the wait.
    pub fn with_cancellation(state: DynamicObjectState<P>, cancel: CancellationToken) -> Self {
        K8sWaiter { state, cancel }
    }
}

impl<P> AwaitResource for K8sWaiter<P>
where
    P: ProvideApi,
{
    type State = DynamicObjectState<P>;

    fn state(&self) -> &Self::State {
        &self.state
    }

    fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CachedApiProvider;
    use crate::cache::StaticApiProvider;
    use crate::error::Error;
    use crate::poller::ConditionPoller;
    use crate::poller::PollOutcome;
    use crate::wait::UpsertCondition;
    use crate::wait::WaitForDelete;
    use crate::wait::WaitForUpsert;
    use crate::wait::WaitSpec;
    use chrono::TimeDelta;
    use kube::api::ApiResource;
    use kube::api::GroupVersionKind;
    use kube::Client;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tower_test::mock;

    type ApiServerHandle = mock::Handle<http::Request<kube::client::Body>, http::Response<kube::client::Body>>;

    const WIDGET_PATH: &str = "/apis/example.com/v1/namespaces/default/widgets/web";

    #[derive(Clone, Copy)]
    enum Reply {
        Phase(&'static str),
        NotFound,
        ServerError,
    }

    fn widgets() -> ApiResource {
        let gvk = GroupVersionKind::gvk("example.com", "v1", "Widget");
        ApiResource::from_gvk_with_plural(&gvk, "widgets")
    }

    /// Answers GETs for `widgets/web` with the scripted replies, then repeats the last one.
    fn mocked_client(replies: Vec<Reply>) -> Client {
        let (mock_service, handle) =
            mock::pair::<http::Request<kube::client::Body>, http::Response<kube::client::Body>>();
        serve(handle, replies.into());
        Client::new(mock_service, "default")
    }

    fn serve(mut handle: ApiServerHandle, mut replies: VecDeque<Reply>) {
        tokio::spawn(async move {
            while let Some((request, send)) = handle.next_request().await {
                assert_eq!(request.method(), http::Method::GET);
                assert!(request.uri().path().ends_with(WIDGET_PATH), "unexpected uri {}", request.uri());

                let reply = if replies.len() > 1 {
                    replies.pop_front()
                } else {
                    replies.front().copied()
                };

                let (status, body) = match reply.unwrap_or(Reply::NotFound) {
                    Reply::Phase(phase) => (
                        200,
                        json!({
                            "apiVersion": "example.com/v1",
                            "kind": "Widget",
                            "metadata": { "name": "web", "namespace": "default" },
                            "status": { "phase": phase }
                        }),
                    ),
                    Reply::NotFound => (404, status_body(404, "NotFound", "widgets \"web\" not found")),
                    Reply::ServerError => (500, status_body(500, "InternalError", "etcd unavailable")),
                };

                send.send_response(
                    http::Response::builder()
                        .status(status)
                        .body(kube::client::Body::from(serde_json::to_vec(&body).unwrap()))
                        .unwrap(),
                );
            }
        });
    }

    fn status_body(code: u16, reason: &str, message: &str) -> Value {
        json!({
            "kind": "Status",
            "apiVersion": "v1",
            "metadata": {},
            "status": "Failure",
            "message": message,
            "reason": reason,
            "code": code
        })
    }

    fn state(client: Client) -> DynamicObjectState<CachedApiProvider> {
        let provider = Arc::new(CachedApiProvider::new(client, widgets()));
        DynamicObjectState::new(provider, "web", Some("default".to_string()))
    }

    fn fast(timeout: &str) -> (Option<String>, Option<String>) {
        (Some(timeout.to_string()), Some("10ms".to_string()))
    }

    #[tokio::test]
    async fn test_fetch_returns_object_body() {
        // Given: An api server that knows the object
        let state = state(mocked_client(vec![Reply::Phase("Ready")]));

        // When: Fetching it
        let body = state.fetch().await.unwrap().unwrap();

        // Then: The dynamic object is exposed as plain JSON
        assert_eq!(body["metadata"]["name"], "web");
        assert_eq!(body["status"]["phase"], "Ready");
    }

    #[tokio::test]
    async fn test_fetch_maps_not_found_to_none() {
        let state = state(mocked_client(vec![Reply::NotFound]));

        let body = state.fetch().await.unwrap();

        assert!(body.is_none());
    }

    #[tokio::test]
    async fn test_fetch_propagates_server_errors() {
        let state = state(mocked_client(vec![Reply::ServerError]));

        let result = state.fetch().await;

        assert!(matches!(result, Err(Error::Kube { .. })));
    }

    #[tokio::test]
    async fn test_fetch_with_unknown_static_namespace_fails() {
        // Given: A static provider that only knows "production"
        let provider = Arc::new(StaticApiProvider::new(
            mocked_client(vec![Reply::Phase("Ready")]),
            widgets(),
            [Some("production")],
        ));
        let state = DynamicObjectState::new(provider, "web", Some("default".to_string()));

        // When: Fetching from "default"
        let result = state.fetch().await;

        // Then: The lookup fails before any request is made
        assert!(matches!(result, Err(Error::UserInput(_))));
    }

    #[tokio::test]
    async fn test_await_upsert_polls_until_ready() {
        // Given: An object that is pending twice before it becomes ready
        let client = mocked_client(vec![Reply::Phase("Pending"), Reply::Phase("Pending"), Reply::Phase("Ready")]);
        let waiter = K8sWaiter::new(state(client));
        let (timeout, poll_interval) = fast("5s");
        let wait = WaitForUpsert(vec![UpsertCondition {
            jsonpath: "$.status.phase".into(),
            value: Some("Ready".into()),
            timeout,
            poll_interval,
        }]);

        // When: Awaiting the upsert conditions
        let result = waiter.await_upsert(&wait).await;

        // Then: The wait succeeds
        assert!(result.is_ok(), "{result:?}");
    }

    #[tokio::test]
    async fn test_await_upsert_times_out() {
        let waiter = K8sWaiter::new(state(mocked_client(vec![Reply::Phase("Pending")])));
        let wait = WaitForUpsert(vec![UpsertCondition {
            jsonpath: "$.status.phase".into(),
            value: Some("Ready".into()),
            timeout: Some("0s".into()),
            poll_interval: None,
        }]);

        let result = waiter.await_upsert(&wait).await;

        assert!(matches!(result, Err(Error::WaitTimeout { attempts: 1, .. })));
    }

    #[tokio::test]
    async fn test_await_deletion_succeeds_once_gone() {
        // Given: An object that disappears on the third read
        let client = mocked_client(vec![
            Reply::Phase("Terminating"),
            Reply::Phase("Terminating"),
            Reply::NotFound,
        ]);
        let waiter = K8sWaiter::new(state(client));
        let (timeout, poll_interval) = fast("5s");

        // When: Awaiting deletion
        let result = waiter.await_deletion(&WaitForDelete { timeout, poll_interval }).await;

        // Then: The wait succeeds
        assert!(result.is_ok(), "{result:?}");
    }

    #[tokio::test]
    async fn test_await_deletion_surfaces_transport_error() {
        let waiter = K8sWaiter::new(state(mocked_client(vec![Reply::ServerError])));
        let (timeout, poll_interval) = fast("5s");

        let result = waiter.await_deletion(&WaitForDelete { timeout, poll_interval }).await;

        assert!(matches!(result, Err(Error::Kube { .. })));
    }

    #[tokio::test]
    async fn test_cancelled_waiter_stops_after_first_check() {
        // Given: A waiter whose shared token is already cancelled
        let cancel = CancellationToken::new();
        let waiter = K8sWaiter::with_cancellation(
            state(mocked_client(vec![Reply::Phase("Terminating")])),
            cancel.clone(),
        );
        cancel.cancel();
        let spec = WaitSpec::deletion()
            .with_timeout(TimeDelta::minutes(5))
            .with_poll_interval(Duration::from_secs(60));

        // When: Polling through the waiter's poller
        let outcome = ConditionPoller::with_cancellation(waiter.cancellation())
            .poll_until(&spec, waiter.state())
            .await;

        // Then: It checked once and then honored the cancellation
        assert!(matches!(outcome, PollOutcome::Cancelled { attempts: 1 }));
    }
}
