use crate::{NamespacedName, PolicyEntries};

/// Policies to re-reconcile after their policy server's configuration
/// changed, split by the reconciler responsible for them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Requeues {
    pub namespaced: Vec<NamespacedName>,
    pub cluster: Vec<NamespacedName>,
}

impl PolicyEntries {
    /// Every entry lands in exactly one of the two lists, depending only on
    /// whether its identity carries a namespace.
    pub fn fan_out(&self) -> Requeues {
        let (cluster, namespaced): (Vec<_>, Vec<_>) = self
            .iter()
            .map(|(_, entry)| entry.namespaced_name.clone())
            .partition(NamespacedName::is_cluster_scoped);
        Requeues { namespaced, cluster }
    }
}
