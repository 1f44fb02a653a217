use crate::{k8s, FIELD_MANAGER};
use k8s::{Api, Client, ConfigMap, PostParams};
use kube::runtime::reflector::{ObjectRef, Store};

/// Config maps in the namespace policy servers are deployed to.
#[async_trait::async_trait]
pub trait ConfigMaps: Send + Sync {
    fn namespace(&self) -> &str;

    /// Reads a config map. The result may come from a local cache and lag
    /// behind the API server.
    async fn get(&self, name: &str) -> Result<Option<ConfigMap>, k8s::Error>;

    /// Reads a config map from the API server, observing every write that
    /// completed before the call.
    async fn get_committed(&self, name: &str) -> Result<Option<ConfigMap>, k8s::Error>;

    /// Fails with a 409 conflict when the config map already exists.
    async fn create(&self, config_map: &ConfigMap) -> Result<ConfigMap, k8s::Error>;

    /// Fails with a 409 conflict when `metadata.resourceVersion` is not the
    /// config map's current version.
    async fn replace(&self, name: &str, config_map: &ConfigMap) -> Result<ConfigMap, k8s::Error>;
}

/// [`ConfigMaps`] backed by the Kubernetes API, optionally reading through a
/// reflector cache.
#[derive(Clone)]
pub struct ClusterConfigMaps {
    api: Api<ConfigMap>,
    namespace: String,
    cache: Option<Store<ConfigMap>>,
}

// === impl ClusterConfigMaps ===

impl ClusterConfigMaps {
    pub fn new(client: Client, namespace: impl ToString) -> Self {
        let namespace = namespace.to_string();
        Self {
            api: Api::namespaced(client, &namespace),
            namespace,
            cache: None,
        }
    }

    /// Serves [`ConfigMaps::get`] from `cache`, which must be fed by a
    /// watch on the same namespace.
    pub fn with_cache(self, cache: Store<ConfigMap>) -> Self {
        Self {
            cache: Some(cache),
            ..self
        }
    }

    fn post_params() -> PostParams {
        PostParams {
            dry_run: false,
            field_manager: Some(FIELD_MANAGER.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl ConfigMaps for ClusterConfigMaps {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn get(&self, name: &str) -> Result<Option<ConfigMap>, k8s::Error> {
        match self.cache.as_ref() {
            Some(cache) => {
                let key = ObjectRef::new(name).within(&self.namespace);
                Ok(cache.get(&key).map(|cm| (*cm).clone()))
            }
            None => self.api.get_opt(name).await,
        }
    }

    async fn get_committed(&self, name: &str) -> Result<Option<ConfigMap>, k8s::Error> {
        self.api.get_opt(name).await
    }

    async fn create(&self, config_map: &ConfigMap) -> Result<ConfigMap, k8s::Error> {
        self.api.create(&Self::post_params(), config_map).await
    }

    async fn replace(&self, name: &str, config_map: &ConfigMap) -> Result<ConfigMap, k8s::Error> {
        self.api.replace(name, &Self::post_params(), config_map).await
    }
}
