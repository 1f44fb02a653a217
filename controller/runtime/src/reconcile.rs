use crate::{
    config::{self, Applied, ConfigMaps, ConfigResource, RolloutTrigger},
    core::{build_entries, build_source_trust, ConfigDocument, DuplicateKey},
    k8s::{AdmissionPolicy, ClusterAdmissionPolicy, Policy, PolicyServer, ResourceExt},
    Requeue,
};
use kube::runtime::{controller::Action, reflector::Store};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, instrument, warn};

/// Delay before asking for a config map version again when it has not been
/// created yet.
const NOT_YET_APPLIED_REQUEUE: Duration = Duration::from_secs(1);

pub(crate) struct Context<S, R> {
    pub config: ConfigResource<S>,
    pub rollout: R,
    pub admission_policies: Store<AdmissionPolicy>,
    pub cluster_policies: Store<ClusterAdmissionPolicy>,
    pub requeue: Requeue,
    pub requeue_after: Duration,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ReconcileError {
    #[error(transparent)]
    Entries(#[from] DuplicateKey),

    #[error(transparent)]
    Config(#[from] config::Error),
}

/// Brings one policy server's config map in line with the policies bound to
/// it, rolls the policy server if the config changed, and requeues those
/// policies.
#[instrument(skip_all, fields(policy_server = %policy_server.name_any()))]
pub(crate) async fn reconcile<S, R>(
    policy_server: Arc<PolicyServer>,
    ctx: Arc<Context<S, R>>,
) -> Result<Action, ReconcileError>
where
    S: ConfigMaps,
    R: RolloutTrigger,
{
    if policy_server.metadata.deletion_timestamp.is_some() {
        debug!("Policy server is being deleted");
        return Ok(Action::await_change());
    }

    let document = synthesize(&policy_server, &ctx)?;
    let applied = ctx.config.apply(&policy_server, &document).await?;
    let version = ctx.config.observe_version(&policy_server).await?;

    if applied != Applied::Unchanged {
        let requeues = document.policies.fan_out();
        info!(
            namespaced = requeues.namespaced.len(),
            cluster = requeues.cluster.len(),
            "Requeueing policies"
        );
        ctx.requeue.send(requeues);
    }

    ctx.rollout.trigger(&policy_server, &version).await?;
    Ok(Action::await_change())
}

pub(crate) fn error_policy<S, R>(
    policy_server: Arc<PolicyServer>,
    error: &ReconcileError,
    ctx: Arc<Context<S, R>>,
) -> Action {
    warn!(policy_server = %policy_server.name_any(), %error, "Reconciliation failed");
    match error {
        ReconcileError::Config(error) if error.is_not_yet_applied() => {
            Action::requeue(NOT_YET_APPLIED_REQUEUE)
        }
        _ => Action::requeue(ctx.requeue_after),
    }
}

/// Builds the document from the cached policies bound to `policy_server`.
/// Policies that are being deleted are left out.
fn synthesize<S, R>(
    policy_server: &PolicyServer,
    ctx: &Context<S, R>,
) -> Result<ConfigDocument, DuplicateKey> {
    let name = policy_server.name_any();
    let admission = bound(&ctx.admission_policies, &name);
    let cluster = bound(&ctx.cluster_policies, &name);

    let mut entries = build_entries(admission.iter().map(Arc::as_ref))?;
    entries.try_extend(cluster.iter().map(Arc::as_ref))?;
    debug!(policies = entries.len(), "Synthesized policies");

    Ok(ConfigDocument::new(
        entries,
        build_source_trust(&policy_server.spec),
    ))
}

fn bound<P>(store: &Store<P>, policy_server: &str) -> Vec<Arc<P>>
where
    P: Policy + Clone + 'static,
{
    store
        .state()
        .into_iter()
        .filter(|p| p.is_bound_to(policy_server) && p.meta().deletion_timestamp.is_none())
        .collect()
}
