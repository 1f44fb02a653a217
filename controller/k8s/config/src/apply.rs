use crate::{is_conflict, k8s, ConfigMaps, Error};
use k8s::{labels, ConfigMap, ObjectMeta, OwnerReference, PolicyServer, Resource, ResourceExt};
use kubewarden_controller_core::ConfigDocument;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// Maintains the config map holding each policy server's configuration.
pub struct ConfigResource<S> {
    pub(crate) store: S,
}

/// The write, if any, made by [`ConfigResource::apply`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Applied {
    Created,
    Updated,
    Unchanged,
}

// === impl ConfigResource ===

impl<S: ConfigMaps> ConfigResource<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates or updates the policy server's config map so it holds
    /// `document`, carries the policy server label and is owned by the
    /// policy server.
    ///
    /// Writes are conditioned on the version that was read. A conflicting
    /// write restarts the cycle from a read against the API server; other
    /// errors are returned without retrying. Nothing is written when the
    /// config map already matches.
    #[instrument(skip_all, fields(policy_server = %policy_server.name_any()))]
    pub async fn apply(
        &self,
        policy_server: &PolicyServer,
        document: &ConfigDocument,
    ) -> Result<Applied, Error> {
        let name = policy_server.name_with_prefix();
        let owner = policy_server
            .owner_ref(&())
            .ok_or_else(|| Error::OwnerReference {
                policy_server: policy_server.name_any(),
            })?;
        let data = document.to_data()?;
        let desired = Desired {
            data,
            labels: labels::policy_server(&policy_server.name_any()),
            owner,
        };

        let mut committed = false;
        loop {
            let current = if committed {
                self.store.get_committed(&name).await
            } else {
                self.store.get(&name).await
            }
            .map_err(|source| self.kube_error("read", &name, source))?;

            let (applied, write) = match current {
                None => {
                    let config_map = desired.apply_to(ConfigMap {
                        metadata: ObjectMeta {
                            name: Some(name.clone()),
                            namespace: Some(self.store.namespace().to_string()),
                            ..Default::default()
                        },
                        ..Default::default()
                    });
                    (Applied::Created, self.store.create(&config_map).await)
                }
                Some(current) => {
                    let config_map = desired.apply_to(current.clone());
                    if config_map == current {
                        debug!(%name, "Config map is up to date");
                        return Ok(Applied::Unchanged);
                    }
                    (Applied::Updated, self.store.replace(&name, &config_map).await)
                }
            };

            match write {
                Ok(written) => {
                    info!(
                        %name,
                        version = %written.resource_version().unwrap_or_default(),
                        ?applied,
                        "Applied config map"
                    );
                    return Ok(applied);
                }
                Err(error) if is_conflict(&error) => {
                    debug!(%name, %error, "Config map changed concurrently; retrying");
                    committed = true;
                }
                Err(source) => {
                    let op = match applied {
                        Applied::Created => "create",
                        _ => "replace",
                    };
                    return Err(self.kube_error(op, &name, source));
                }
            }
        }
    }

    pub(crate) fn kube_error(&self, op: &'static str, name: &str, source: k8s::Error) -> Error {
        Error::Kube {
            op,
            kind: "ConfigMap",
            namespace: self.store.namespace().to_string(),
            name: name.to_string(),
            source,
        }
    }
}

/// The fields of the config map that the controller manages.
struct Desired {
    data: BTreeMap<String, String>,
    labels: BTreeMap<String, String>,
    owner: OwnerReference,
}

impl Desired {
    /// Sets the managed fields on `config_map`, keeping labels and owner
    /// references set by others.
    fn apply_to(&self, mut config_map: ConfigMap) -> ConfigMap {
        config_map.data = Some(self.data.clone());

        config_map
            .metadata
            .labels
            .get_or_insert_with(Default::default)
            .extend(self.labels.clone());

        let owners = config_map
            .metadata
            .owner_references
            .get_or_insert_with(Default::default);
        match owners.iter_mut().find(|o| same_owner(o, &self.owner)) {
            Some(existing) => *existing = self.owner.clone(),
            None => owners.push(self.owner.clone()),
        }

        config_map
    }
}

/// Owner references to objects of the same group, kind and name denote the
/// same owner, even if the object was recreated with a new uid.
fn same_owner(a: &OwnerReference, b: &OwnerReference) -> bool {
    fn group(api_version: &str) -> &str {
        api_version.split_once('/').map_or("", |(group, _)| group)
    }

    a.kind == b.kind && a.name == b.name && group(&a.api_version) == group(&b.api_version)
}
