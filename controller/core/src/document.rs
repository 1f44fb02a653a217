use crate::{PolicyEntries, SourceTrustConfig};
use std::collections::BTreeMap;

/// Config map key holding the policies document.
///
/// The payload is JSON despite the extension.
pub const POLICIES_KEY: &str = "policies.yml";

/// Config map key holding the source-trust document.
pub const SOURCES_KEY: &str = "sources.yml";

/// Everything a policy server reads at startup.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigDocument {
    pub policies: PolicyEntries,
    pub sources: SourceTrustConfig,
}

#[derive(Debug, thiserror::Error)]
#[error("failed to serialize {document}: {source}")]
pub struct SerializeError {
    pub document: &'static str,
    #[source]
    pub source: serde_json::Error,
}

// === impl ConfigDocument ===

impl ConfigDocument {
    pub fn new(policies: PolicyEntries, sources: SourceTrustConfig) -> Self {
        Self { policies, sources }
    }

    /// Serializes both documents into config map data.
    ///
    /// Identical documents always produce byte-identical data: the resource
    /// version of the applied config map, and so pod rollouts, depend on it.
    pub fn to_data(&self) -> Result<BTreeMap<String, String>, SerializeError> {
        let policies = serde_json::to_string(&self.policies).map_err(|source| SerializeError {
            document: POLICIES_KEY,
            source,
        })?;
        let sources = serde_json::to_string(&self.sources).map_err(|source| SerializeError {
            document: SOURCES_KEY,
            source,
        })?;

        Ok(BTreeMap::from([
            (POLICIES_KEY.to_string(), policies),
            (SOURCES_KEY.to_string(), sources),
        ]))
    }
}
