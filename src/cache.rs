//! Api handle caching for waits that repeatedly read the same kind in the same namespaces.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

use kube::api::ApiResource;
use kube::api::DynamicObject;
use kube::Api;
use kube::Client;

use crate::error::Error;
use crate::error::Result;

/// Abstraction for obtaining [Api] handles for one dynamically typed kind.
///
/// `None` as namespace selects the cluster scope, used for cluster-scoped kinds.
///
/// # Implementations
///
/// - [StaticApiProvider] - Lock-free, pre-populated cache (fastest, when namespaces are known)
/// - [CachedApiProvider] - RwLock-based, lazy-loading cache (for dynamic namespaces)
pub trait ProvideApi: Send + Sync {
    /// Gets an [Arc<Api>] for the given namespace.
    fn get(&self, namespace: Option<&str>) -> Result<Arc<Api<DynamicObject>>>;

    /// The kind this provider serves.
    fn api_resource(&self) -> &ApiResource;
}

fn build_api(client: Client, resource: &ApiResource, namespace: Option<&str>) -> Api<DynamicObject> {
    match namespace {
        Some(namespace) => Api::namespaced_with(client, namespace, resource),
        None => Api::all_with(client, resource),
    }
}

/// Caches [Arc<Api>] instances per namespace, creating them on first use.
///
/// # Example
///
/// ```rust,ignore
/// use kube::api::{ApiResource, GroupVersionKind};
/// use kubewait::cache::CachedApiProvider;
///
/// let gvk = GroupVersionKind::gvk("cert-manager.io", "v1", "Certificate");
/// let provider = CachedApiProvider::new(client, ApiResource::from_gvk(&gvk));
/// let api = provider.get(Some("default"))?;
/// ```
pub struct CachedApiProvider {
    client: Client,
    resource: ApiResource,
    cache: RwLock<HashMap<Option<String>, Arc<Api<DynamicObject>>>>,
}

impl CachedApiProvider {
    pub fn new(client: Client, resource: ApiResource) -> Self {
        Self {
            client,
            resource,
            cache: RwLock::new(HashMap::new()),
        }
    }
}

impl ProvideApi for CachedApiProvider {
    fn get(&self, namespace: Option<&str>) -> Result<Arc<Api<DynamicObject>>> {
        let key = namespace.map(str::to_owned);

        // Fast path: try to get from cache with read lock
        {
            let cache = self.cache.read()?;
            if let Some(api) = cache.get(&key) {
                return Ok(Arc::clone(api));
            }
        }

        let mut cache = self.cache.write()?;

        // Double-check in case another thread created it while we waited for write lock
        if let Some(api) = cache.get(&key) {
            return Ok(Arc::clone(api));
        }

        let api = Arc::new(build_api(self.client.clone(), &self.resource, namespace));
        cache.insert(key, Arc::clone(&api));

        Ok(api)
    }

    fn api_resource(&self) -> &ApiResource {
        &self.resource
    }
}

/// A pre-populated, immutable [ProvideApi]. Lookups outside the initial set fail.
pub struct StaticApiProvider {
    resource: ApiResource,
    cache: HashMap<Option<String>, Arc<Api<DynamicObject>>>,
}

impl StaticApiProvider {
    /// Pre-caches an [Api] per namespace. Pass `None` to include the cluster scope.
    pub fn new<I, S>(client: Client, resource: ApiResource, namespaces: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: AsRef<str>,
    {
        let cache = namespaces
            .into_iter()
            .map(|namespace| {
                let namespace: Option<&str> = namespace.as_ref().map(|ns| ns.as_ref());
                let api = Arc::new(build_api(client.clone(), &resource, namespace));
                (namespace.map(str::to_owned), api)
            })
            .collect();

        Self { resource, cache }
    }
}

impl ProvideApi for StaticApiProvider {
    fn get(&self, namespace: Option<&str>) -> Result<Arc<Api<DynamicObject>>> {
        self.cache
            .get(&namespace.map(str::to_owned))
            .map(Arc::clone)
            .ok_or_else(|| {
                Error::UserInput(format!(
                    "Namespace '{}' not found in static cache for {}. Did you include it during initialization?",
                    namespace.unwrap_or("<cluster>"),
                    self.resource.kind
                ))
            })
    }

    fn api_resource(&self) -> &ApiResource {
        &self.resource
    }
}
