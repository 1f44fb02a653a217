#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Applies a policy server's [`ConfigDocument`] to the cluster as a config
//! map owned by the policy server, and reports the applied version.

mod apply;
mod error;
mod rollout;
mod store;
mod version;


pub use self::{
    apply::{Applied, ConfigResource},
    error::Error,
    rollout::{DeploymentRollout, RolloutTrigger},
    store::{ClusterConfigMaps, ConfigMaps},
};
pub use kubewarden_controller_core::ConfigDocument;
use kubewarden_controller_k8s_api as k8s;

/// Field manager recorded on every write made by the controller.
pub const FIELD_MANAGER: &str = "kubewarden-controller";

fn is_conflict(error: &k8s::Error) -> bool {
    matches!(error, k8s::Error::Api(response) if response.code == 409)
}
