use crate::{
    config::{ClusterConfigMaps, ConfigResource, DeploymentRollout},
    k8s::{
        labels, AdmissionPolicy, Api, ClusterAdmissionPolicy, ConfigMap, PolicyServer,
        ResourceExt,
    },
    reconcile::{self, Context},
    Requeue,
};
use anyhow::{bail, Result};
use clap::Parser;
use futures::prelude::*;
use kube::runtime::{
    reflector::{self, ObjectRef, Store},
    watcher, Controller, WatchStreamExt,
};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "kubewarden-controller",
    about = "Maintains the configuration of Kubewarden policy servers"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "kubewarden=info,warn",
        env = "KUBEWARDEN_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Namespace holding the policy server deployments and config maps.
    #[clap(
        long,
        default_value = "kubewarden",
        env = "KUBEWARDEN_DEPLOYMENTS_NAMESPACE"
    )]
    deployments_namespace: String,

    /// Seconds to wait before reconciling a policy server again after a
    /// failure.
    #[clap(long, default_value = "5")]
    requeue_after_secs: u64,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            admin,
            deployments_namespace,
            requeue_after_secs,
        } = self;

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_admin(admin.into_builder())
            .with_client(client)
            .build()
            .await?;
        let client = runtime.client();

        // Only config maps generated for a policy server are cached.
        let owned = watcher::Config::default().labels(labels::POLICY_SERVER);
        let config_maps = Api::<ConfigMap>::namespaced(client.clone(), &deployments_namespace);
        let admission_policies = Api::<AdmissionPolicy>::all(client.clone());
        let cluster_policies = Api::<ClusterAdmissionPolicy>::all(client.clone());

        let config_maps_cache = spawn_cache(config_maps.clone(), owned.clone(), "configmaps");
        let admission_cache = spawn_cache(
            admission_policies.clone(),
            watcher::Config::default(),
            "admissionpolicies",
        );
        let cluster_cache = spawn_cache(
            cluster_policies.clone(),
            watcher::Config::default(),
            "clusteradmissionpolicies",
        );
        admission_cache.wait_until_ready().await?;
        cluster_cache.wait_until_ready().await?;
        config_maps_cache.wait_until_ready().await?;
        info!("Caches synced");

        let (requeue, requeue_rx) = Requeue::channel();
        tokio::spawn(requeue_rx.log().instrument(info_span!("requeue")));

        let ctx = Arc::new(Context {
            config: ConfigResource::new(
                ClusterConfigMaps::new(client.clone(), &deployments_namespace)
                    .with_cache(config_maps_cache),
            ),
            rollout: DeploymentRollout::new(client.clone(), &deployments_namespace),
            admission_policies: admission_cache,
            cluster_policies: cluster_cache,
            requeue,
            requeue_after: Duration::from_secs(requeue_after_secs),
        });

        let controller = Controller::new(
            Api::<PolicyServer>::all(client.clone()),
            watcher::Config::default(),
        )
        // Policy servers are cluster-scoped while their config maps are not,
        // so config maps are mapped back through the policy server label
        // rather than their owner references.
        .watches(config_maps, owned, |cm: ConfigMap| {
            cm.labels()
                .get(labels::POLICY_SERVER)
                .and_then(|name| policy_server_ref(name))
        })
        .watches(
            admission_policies,
            watcher::Config::default(),
            |policy: AdmissionPolicy| policy_server_ref(&policy.spec.policy.policy_server),
        )
        .watches(
            cluster_policies,
            watcher::Config::default(),
            |policy: ClusterAdmissionPolicy| policy_server_ref(&policy.spec.policy.policy_server),
        )
        .shutdown_on_signal()
        .run(reconcile::reconcile, reconcile::error_policy, ctx)
        .for_each(|res| {
            match res {
                Ok((obj, action)) => debug!(policy_server = %obj, ?action, "Reconciled"),
                Err(error) => warn!(%error, "Reconcile failed"),
            }
            future::ready(())
        });
        tokio::spawn(controller.instrument(info_span!("policyservers")));

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

fn policy_server_ref(name: &str) -> Option<ObjectRef<PolicyServer>> {
    Some(ObjectRef::new(name))
}

/// Maintains a cache of the resources matched by `config`.
fn spawn_cache<K>(api: Api<K>, config: watcher::Config, resource: &'static str) -> Store<K>
where
    K: kube::Resource<DynamicType = ()>
        + Clone
        + std::fmt::Debug
        + serde::de::DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    let (store, writer) = reflector::store();
    let events = watcher(api, config)
        .default_backoff()
        .reflect(writer)
        .for_each(move |event| {
            if let Err(error) = event {
                warn!(%error, "Watch failed");
            }
            future::ready(())
        });
    tokio::spawn(events.instrument(info_span!("cache", %resource)));
    store
}
