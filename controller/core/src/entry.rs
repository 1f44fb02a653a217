use crate::{
    k8s::{ContextAwareResource, Policy, PolicyMode},
    NamespacedName,
};
use serde::Serialize;
use std::collections::{btree_map, BTreeMap};

/// One policy as served by a policy server.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfigEntry {
    pub namespaced_name: NamespacedName,
    pub url: String,
    pub policy_mode: PolicyMode,
    pub allowed_to_mutate: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub context_aware_resources: Vec<ContextAwareResource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<serde_json::Value>,
}

/// Entries keyed by each policy's unique name.
///
/// Keys iterate, and serialize, in sorted order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PolicyEntries(BTreeMap<String, PolicyConfigEntry>);

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("policies {existing} and {duplicate} share the unique name {key:?}")]
pub struct DuplicateKey {
    pub key: String,
    pub existing: NamespacedName,
    pub duplicate: NamespacedName,
}

/// Builds the entries for a set of policies of one kind.
///
/// Policies of another kind may be added with [`PolicyEntries::try_extend`].
pub fn build_entries<'p, P>(
    policies: impl IntoIterator<Item = &'p P>,
) -> Result<PolicyEntries, DuplicateKey>
where
    P: Policy + 'p,
{
    let mut entries = PolicyEntries::default();
    entries.try_extend(policies)?;
    Ok(entries)
}

// === impl PolicyConfigEntry ===

impl PolicyConfigEntry {
    pub fn from_policy<P: Policy>(policy: &P) -> Self {
        let spec = policy.spec();
        Self {
            namespaced_name: NamespacedName::of(policy),
            url: spec.module.clone(),
            policy_mode: spec.mode,
            allowed_to_mutate: spec.mutating,
            context_aware_resources: spec.context_aware_resources.clone(),
            settings: spec.settings.as_ref().map(canonicalize),
        }
    }
}

// === impl PolicyEntries ===

impl PolicyEntries {
    /// Adds a policy's entry. Fails, leaving the entries untouched, if
    /// another policy already uses the same unique name.
    pub fn insert<P: Policy>(&mut self, policy: &P) -> Result<(), DuplicateKey> {
        let entry = PolicyConfigEntry::from_policy(policy);
        match self.0.entry(policy.unique_name()) {
            btree_map::Entry::Occupied(existing) => Err(DuplicateKey {
                key: existing.key().clone(),
                existing: existing.get().namespaced_name.clone(),
                duplicate: entry.namespaced_name,
            }),
            btree_map::Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(())
            }
        }
    }

    pub fn try_extend<'p, P>(
        &mut self,
        policies: impl IntoIterator<Item = &'p P>,
    ) -> Result<(), DuplicateKey>
    where
        P: Policy + 'p,
    {
        for policy in policies {
            self.insert(policy)?;
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&PolicyConfigEntry> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PolicyConfigEntry)> + '_ {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Rebuilds every JSON object with its keys inserted in sorted order, so
/// the serialized form does not depend on how `serde_json::Map` is backed.
fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    use serde_json::Value;

    match value {
        Value::Object(map) => {
            let sorted = map
                .iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect::<BTreeMap<_, _>>();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::{
        policy::{AdmissionPolicySpec, ClusterAdmissionPolicySpec},
        AdmissionPolicy, ClusterAdmissionPolicy, ObjectMeta, PolicySpec,
    };
    use pretty_assertions::assert_eq;

    fn spec(module: &str) -> PolicySpec {
        PolicySpec {
            policy_server: "default".to_string(),
            module: module.to_string(),
            mode: PolicyMode::Protect,
            mutating: false,
            settings: None,
            context_aware_resources: vec![],
        }
    }

    fn mk_policy(ns: &str, name: &str) -> AdmissionPolicy {
        AdmissionPolicy {
            metadata: ObjectMeta {
                namespace: Some(ns.to_string()),
                name: Some(name.to_string()),
                ..Default::default()
            },
            spec: AdmissionPolicySpec {
                policy: spec(&format!("registry://example.com/{name}:v1")),
            },
        }
    }

    #[test]
    fn one_entry_per_policy() {
        let policies = vec![
            mk_policy("team-a", "no-root"),
            mk_policy("team-b", "no-root"),
            mk_policy("team-a", "no-host-path"),
        ];
        let entries = build_entries(&policies).unwrap();

        assert_eq!(entries.len(), 3);
        let keys = entries.iter().map(|(k, _)| k).collect::<Vec<_>>();
        assert_eq!(
            keys,
            vec![
                "namespaced-team-a-no-host-path",
                "namespaced-team-a-no-root",
                "namespaced-team-b-no-root",
            ]
        );
        assert_eq!(
            entries.get("namespaced-team-b-no-root").unwrap().namespaced_name,
            NamespacedName::new("team-b", "no-root")
        );
    }

    #[test]
    fn namespaced_and_cluster_policies_share_a_map() {
        let namespaced = vec![mk_policy("team-a", "no-root")];
        let cluster = vec![ClusterAdmissionPolicy::new(
            "no-root",
            ClusterAdmissionPolicySpec {
                policy: spec("registry://example.com/no-root:v1"),
            },
        )];

        let mut entries = build_entries(&namespaced).unwrap();
        entries.try_extend(&cluster).unwrap();

        assert_eq!(entries.len(), 2);
        assert!(entries
            .get("clusterwide-no-root")
            .unwrap()
            .namespaced_name
            .is_cluster_scoped());
    }

    #[test]
    fn colliding_unique_names_are_rejected() {
        // "a-b"/"c" and "a"/"b-c" both yield "namespaced-a-b-c".
        let policies = vec![mk_policy("a-b", "c"), mk_policy("a", "b-c")];
        let err = build_entries(&policies).unwrap_err();
        assert_eq!(
            err,
            DuplicateKey {
                key: "namespaced-a-b-c".to_string(),
                existing: NamespacedName::new("a-b", "c"),
                duplicate: NamespacedName::new("a", "b-c"),
            }
        );
    }

    #[test]
    fn failed_insert_keeps_existing_entry() {
        let mut entries = build_entries(&[mk_policy("a-b", "c")]).unwrap();
        let before = entries.clone();
        assert!(entries.insert(&mk_policy("a", "b-c")).is_err());
        assert_eq!(entries, before);
    }

    #[test]
    fn entry_copies_policy_fields() {
        let mut policy = mk_policy("team-a", "psp-capabilities");
        policy.spec.policy.mode = PolicyMode::Monitor;
        policy.spec.policy.mutating = true;
        policy.spec.policy.settings = Some(serde_json::json!({
            "required_drop_capabilities": ["NET_ADMIN"],
        }));
        policy.spec.policy.context_aware_resources = vec![ContextAwareResource {
            api_version: "v1".to_string(),
            kind: "Namespace".to_string(),
        }];

        let entry = PolicyConfigEntry::from_policy(&policy);
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            serde_json::json!({
                "namespacedName": { "namespace": "team-a", "name": "psp-capabilities" },
                "url": "registry://example.com/psp-capabilities:v1",
                "policyMode": "monitor",
                "allowedToMutate": true,
                "contextAwareResources": [{ "apiVersion": "v1", "kind": "Namespace" }],
                "settings": { "required_drop_capabilities": ["NET_ADMIN"] },
            })
        );
    }

    #[test]
    fn optional_fields_are_omitted() {
        let entry = PolicyConfigEntry::from_policy(&mk_policy("team-a", "no-root"));
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("settings").is_none());
        assert!(json.get("contextAwareResources").is_none());
    }

    #[test]
    fn settings_keys_are_sorted() {
        let mut policy = mk_policy("team-a", "no-root");
        policy.spec.policy.settings = Some(serde_json::json!({
            "zeta": 1,
            "alpha": { "nested_z": true, "nested_a": [{ "y": 1, "b": 2 }] },
        }));
        let entry = PolicyConfigEntry::from_policy(&policy);
        assert_eq!(
            serde_json::to_string(&entry.settings).unwrap(),
            r#"{"alpha":{"nested_a":[{"b":2,"y":1}],"nested_z":true},"zeta":1}"#
        );
    }
}
