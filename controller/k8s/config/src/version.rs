use crate::{k8s, ConfigMaps, ConfigResource, Error};
use k8s::{PolicyServer, ResourceExt};
use tracing::{debug, instrument};

impl<S: ConfigMaps> ConfigResource<S> {
    /// Returns the resource version of the policy server's config map.
    ///
    /// The read bypasses any cache so that it observes the write made by a
    /// preceding [`ConfigResource::apply`]. The version changes whenever the
    /// config map does, and is what triggers a policy server rollout.
    #[instrument(skip_all, fields(policy_server = %policy_server.name_any()))]
    pub async fn observe_version(&self, policy_server: &PolicyServer) -> Result<String, Error> {
        let name = policy_server.name_with_prefix();
        let namespace = self.store.namespace().to_string();

        let config_map = self
            .store
            .get_committed(&name)
            .await
            .map_err(|source| self.kube_error("read", &name, source))?
            .ok_or_else(|| Error::NotYetApplied {
                namespace: namespace.clone(),
                name: name.clone(),
            })?;

        let version = config_map
            .resource_version()
            .ok_or(Error::MissingVersion { namespace, name })?;
        debug!(%version, "Observed config map version");
        Ok(version)
    }
}
