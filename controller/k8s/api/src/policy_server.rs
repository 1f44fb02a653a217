use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prefix applied to a policy server's name to build the names of the
/// resources generated for it.
pub const NAME_PREFIX: &str = "policy-server-";

/// Describes a policy-evaluation workload and the registries it may pull
/// policy modules from.
#[derive(Clone, Debug, PartialEq, CustomResource, Deserialize, Serialize)]
#[kube(
    group = "policies.kubewarden.io",
    version = "v1",
    kind = "PolicyServer",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct PolicyServerSpec {
    pub image: String,

    #[serde(default = "default_replicas")]
    pub replicas: i32,

    /// Registries contacted without verifying their TLS certificates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure_sources: Option<Vec<String>>,

    /// PEM encoded certificate authorities, keyed by registry host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_authorities: Option<BTreeMap<String, Vec<String>>>,
}

fn default_replicas() -> i32 {
    1
}

impl PolicyServer {
    /// Name of the config map and deployment generated for this server.
    pub fn name_with_prefix(&self) -> String {
        format!("{NAME_PREFIX}{}", self.name_any())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_defaults() {
        let ps: PolicyServer = serde_json::from_value(serde_json::json!({
            "apiVersion": "policies.kubewarden.io/v1",
            "kind": "PolicyServer",
            "metadata": { "name": "default" },
            "spec": { "image": "ghcr.io/kubewarden/policy-server:latest" },
        }))
        .unwrap();
        assert_eq!(ps.spec.replicas, 1);
        assert_eq!(ps.spec.insecure_sources, None);
        assert_eq!(ps.spec.source_authorities, None);
        assert_eq!(ps.name_with_prefix(), "policy-server-default");
    }
}
