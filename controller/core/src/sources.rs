use crate::k8s::PolicyServerSpec;
use serde::Serialize;
use std::collections::BTreeMap;

/// The registries a policy server trusts when fetching policy modules.
///
/// Both fields are always serialized, even when empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SourceTrustConfig {
    #[serde(rename = "insecure_sources")]
    pub insecure_registries: Vec<String>,

    #[serde(rename = "source_authorities")]
    pub registry_authorities: BTreeMap<String, Vec<SourceAuthority>>,
}

/// A trust anchor for a registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SourceAuthority {
    #[serde(rename = "type")]
    pub kind: AuthorityKind,
    #[serde(rename = "data")]
    pub pem: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum AuthorityKind {
    /// The certificate is embedded inline as PEM.
    Data,
}

pub fn build_source_trust(spec: &PolicyServerSpec) -> SourceTrustConfig {
    let insecure_registries = spec.insecure_sources.clone().unwrap_or_default();

    let registry_authorities = spec
        .source_authorities
        .iter()
        .flatten()
        .map(|(registry, certs)| {
            let authorities = certs
                .iter()
                .map(|pem| SourceAuthority {
                    kind: AuthorityKind::Data,
                    pem: pem.clone(),
                })
                .collect();
            (registry.clone(), authorities)
        })
        .collect();

    SourceTrustConfig {
        insecure_registries,
        registry_authorities,
    }
}
