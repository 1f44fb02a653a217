use kube::{CustomResource, Resource, ResourceExt};
use serde::{Deserialize, Serialize};

/// The policy server that hosts policies which do not name one.
pub const DEFAULT_POLICY_SERVER: &str = "default";

/// Fields shared by namespaced and cluster-wide admission policies.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySpec {
    #[serde(default = "default_policy_server")]
    pub policy_server: String,

    /// Location of the policy's Wasm module (`registry://`, `https://`, `file://`).
    pub module: String,

    #[serde(default)]
    pub mode: PolicyMode,

    #[serde(default)]
    pub mutating: bool,

    /// Policy-defined configuration, passed through to the policy untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<serde_json::Value>,

    /// Cluster resources the policy may read while evaluating a request.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context_aware_resources: Vec<ContextAwareResource>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    /// Rejections are enforced.
    #[default]
    Protect,
    /// Rejections are only logged.
    Monitor,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextAwareResource {
    pub api_version: String,
    pub kind: String,
}

#[derive(Clone, Debug, PartialEq, CustomResource, Deserialize, Serialize)]
#[kube(
    group = "policies.kubewarden.io",
    version = "v1",
    kind = "AdmissionPolicy",
    namespaced,
    schema = "disabled"
)]
pub struct AdmissionPolicySpec {
    #[serde(flatten)]
    pub policy: PolicySpec,
}

#[derive(Clone, Debug, PartialEq, CustomResource, Deserialize, Serialize)]
#[kube(
    group = "policies.kubewarden.io",
    version = "v1",
    kind = "ClusterAdmissionPolicy",
    schema = "disabled"
)]
pub struct ClusterAdmissionPolicySpec {
    #[serde(flatten)]
    pub policy: PolicySpec,
}

/// Common accessors over both admission policy kinds.
pub trait Policy: Resource<DynamicType = ()> {
    fn spec(&self) -> &PolicySpec;

    /// A name that is unique across every policy kind and namespace. It is
    /// the key the policy is served under by its policy server.
    fn unique_name(&self) -> String;

    fn is_bound_to(&self, policy_server: &str) -> bool {
        self.spec().policy_server == policy_server
    }
}

fn default_policy_server() -> String {
    DEFAULT_POLICY_SERVER.to_string()
}

// === impl AdmissionPolicy ===

impl Policy for AdmissionPolicy {
    fn spec(&self) -> &PolicySpec {
        &self.spec.policy
    }

    fn unique_name(&self) -> String {
        format!(
            "namespaced-{}-{}",
            self.namespace().unwrap_or_default(),
            self.name_any()
        )
    }
}

// === impl ClusterAdmissionPolicy ===

impl Policy for ClusterAdmissionPolicy {
    fn spec(&self) -> &PolicySpec {
        &self.spec.policy
    }

    fn unique_name(&self) -> String {
        format!("clusterwide-{}", self.name_any())
    }
}
