use crate::{
    core::{NamespacedName, Requeues},
    k8s::{AdmissionPolicy, ClusterAdmissionPolicy},
};
use kube::runtime::reflector::ObjectRef;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

/// Publishes the policies that must be reconciled again because their
/// policy server's configuration changed.
#[derive(Clone, Debug)]
pub struct Requeue {
    namespaced: UnboundedSender<ObjectRef<AdmissionPolicy>>,
    cluster: UnboundedSender<ObjectRef<ClusterAdmissionPolicy>>,
}

/// Receiving ends of a [`Requeue`], one per policy reconciler.
#[derive(Debug)]
pub struct RequeueRx {
    pub namespaced: UnboundedReceiver<ObjectRef<AdmissionPolicy>>,
    pub cluster: UnboundedReceiver<ObjectRef<ClusterAdmissionPolicy>>,
}

// === impl Requeue ===

impl Requeue {
    pub fn channel() -> (Self, RequeueRx) {
        let (namespaced_tx, namespaced_rx) = mpsc::unbounded_channel();
        let (cluster_tx, cluster_rx) = mpsc::unbounded_channel();
        let tx = Self {
            namespaced: namespaced_tx,
            cluster: cluster_tx,
        };
        let rx = RequeueRx {
            namespaced: namespaced_rx,
            cluster: cluster_rx,
        };
        (tx, rx)
    }

    pub fn send(&self, requeues: Requeues) {
        let Requeues {
            namespaced,
            cluster,
        } = requeues;

        for NamespacedName { namespace, name } in namespaced {
            let obj = ObjectRef::new(&name).within(&namespace);
            if let Err(error) = self.namespaced.send(obj) {
                warn!(%namespace, %name, %error, "Failed to requeue AdmissionPolicy");
            }
        }

        for NamespacedName { name, .. } in cluster {
            if let Err(error) = self.cluster.send(ObjectRef::new(&name)) {
                warn!(%name, %error, "Failed to requeue ClusterAdmissionPolicy");
            }
        }
    }
}

// === impl RequeueRx ===

impl RequeueRx {
    /// Logs each request until both senders are dropped. Used when no
    /// policy reconciler consumes the requests in this process.
    pub async fn log(self) {
        let Self {
            mut namespaced,
            mut cluster,
        } = self;
        let mut namespaced_open = true;
        let mut cluster_open = true;
        while namespaced_open || cluster_open {
            tokio::select! {
                obj = namespaced.recv(), if namespaced_open => match obj {
                    Some(obj) => debug!(policy = %obj, "Requeue AdmissionPolicy"),
                    None => namespaced_open = false,
                },
                obj = cluster.recv(), if cluster_open => match obj {
                    Some(obj) => debug!(policy = %obj, "Requeue ClusterAdmissionPolicy"),
                    None => cluster_open = false,
                },
            }
        }
    }
}
