use crate::{k8s, Error, FIELD_MANAGER};
use k8s::{labels, Api, Client, Deployment, Patch, PatchParams, PolicyServer, ResourceExt};
use tracing::{debug, info, instrument};

/// Restarts a policy server's pods when its configuration version changes.
#[async_trait::async_trait]
pub trait RolloutTrigger: Send + Sync {
    /// Returns true if a rollout was requested.
    async fn trigger(&self, policy_server: &PolicyServer, version: &str) -> Result<bool, Error>;
}

/// Records the configuration version on the policy server Deployment's pod
/// template, so that a new version rolls the pods.
#[derive(Clone)]
pub struct DeploymentRollout {
    api: Api<Deployment>,
    namespace: String,
}

impl DeploymentRollout {
    pub fn new(client: Client, namespace: impl ToString) -> Self {
        let namespace = namespace.to_string();
        Self {
            api: Api::namespaced(client, &namespace),
            namespace,
        }
    }

    fn kube_error(&self, op: &'static str, name: &str, source: k8s::Error) -> Error {
        Error::Kube {
            op,
            kind: "Deployment",
            namespace: self.namespace.clone(),
            name: name.to_string(),
            source,
        }
    }
}

#[async_trait::async_trait]
impl RolloutTrigger for DeploymentRollout {
    #[instrument(skip_all, fields(policy_server = %policy_server.name_any(), %version))]
    async fn trigger(&self, policy_server: &PolicyServer, version: &str) -> Result<bool, Error> {
        let name = policy_server.name_with_prefix();
        let deployment = match self
            .api
            .get_opt(&name)
            .await
            .map_err(|source| self.kube_error("read", &name, source))?
        {
            Some(deployment) => deployment,
            None => {
                // The deployment reconciler stamps the version when it
                // creates the deployment.
                debug!(%name, "Deployment not found; skipping rollout");
                return Ok(false);
            }
        };

        if config_version(&deployment) == Some(version) {
            debug!(%name, "Deployment already runs this config version");
            return Ok(false);
        }

        let params = PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        self.api
            .patch(&name, &params, &Patch::Merge(config_version_patch(version)))
            .await
            .map_err(|source| self.kube_error("patch", &name, source))?;
        info!(%name, "Rolling out new config version");
        Ok(true)
    }
}

/// The config version recorded on a deployment's pod template.
fn config_version(deployment: &Deployment) -> Option<&str> {
    deployment
        .spec
        .as_ref()?
        .template
        .metadata
        .as_ref()?
        .annotations
        .as_ref()?
        .get(labels::CONFIG_VERSION)
        .map(String::as_str)
}

fn config_version_patch(version: &str) -> serde_json::Value {
    serde_json::json!({
        "spec": {
            "template": {
                "metadata": {
                    "annotations": {
                        (labels::CONFIG_VERSION): version,
                    },
                },
            },
        },
    })
}
