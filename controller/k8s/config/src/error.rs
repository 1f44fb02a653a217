use kubewarden_controller_core::SerializeError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Serialize(#[from] SerializeError),

    /// Writing without an owner reference would leak the config map once
    /// the policy server is deleted.
    #[error("cannot set owner reference to policy server {policy_server}: it has no uid")]
    OwnerReference { policy_server: String },

    #[error("config map {namespace}/{name} has not been applied yet")]
    NotYetApplied { namespace: String, name: String },

    #[error("config map {namespace}/{name} has no resource version")]
    MissingVersion { namespace: String, name: String },

    #[error("failed to {op} {kind} {namespace}/{name}: {source}")]
    Kube {
        op: &'static str,
        kind: &'static str,
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },
}

impl Error {
    /// True when the version was requested before the config map was
    /// created. The caller should apply it and try again.
    pub fn is_not_yet_applied(&self) -> bool {
        matches!(self, Self::NotYetApplied { .. })
    }
}
