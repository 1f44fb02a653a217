#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Synthesizes the runtime configuration of a policy server from the
//! policies bound to it.
//!
//! Nothing in this crate performs I/O: callers collect the policy objects,
//! build a [`ConfigDocument`], and hand the serialized data to whatever
//! applies it to the cluster.

mod document;
mod entry;
mod requeue;
mod sources;

pub use self::{
    document::{ConfigDocument, SerializeError, POLICIES_KEY, SOURCES_KEY},
    entry::{build_entries, DuplicateKey, PolicyConfigEntry, PolicyEntries},
    requeue::Requeues,
    sources::{build_source_trust, AuthorityKind, SourceAuthority, SourceTrustConfig},
};
pub use kubewarden_controller_k8s_api as k8s;
use k8s::ResourceExt;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies an object in the cluster. An empty namespace denotes a
/// cluster-scoped object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct NamespacedName {
    #[serde(default)]
    pub namespace: String,
    pub name: String,
}

// === impl NamespacedName ===

impl NamespacedName {
    pub fn new(namespace: impl ToString, name: impl ToString) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn cluster(name: impl ToString) -> Self {
        Self::new("", name)
    }

    pub fn of<R: ResourceExt>(resource: &R) -> Self {
        Self {
            namespace: resource.namespace().unwrap_or_default(),
            name: resource.name_any(),
        }
    }

    #[inline]
    pub fn is_cluster_scoped(&self) -> bool {
        self.namespace.is_empty()
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_cluster_scoped() {
            return f.write_str(&self.name);
        }
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
