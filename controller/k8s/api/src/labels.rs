use std::collections::BTreeMap;

/// Identifies the policy server that owns a config map or deployment.
pub const POLICY_SERVER: &str = "kubewarden/policy-server";

/// Pod template annotation carrying the applied config map's resource version.
/// A change restarts the policy server pods.
pub const CONFIG_VERSION: &str = "kubewarden/config-version";

pub fn policy_server(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(POLICY_SERVER.to_string(), name.to_string())])
}
