#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod labels;
pub mod policy;
pub mod policy_server;

pub use self::{
    policy::{
        AdmissionPolicy, ClusterAdmissionPolicy, ContextAwareResource, Policy, PolicyMode,
        PolicySpec,
    },
    policy_server::{PolicyServer, PolicyServerSpec},
};
pub use k8s_openapi::{
    api::{self, apps::v1::Deployment, core::v1::ConfigMap},
    apimachinery::pkg::apis::meta::v1::OwnerReference,
};
pub use kube::{
    api::{Api, ObjectMeta, Patch, PatchParams, PostParams, ResourceExt},
    error::ErrorResponse,
    Client, Error, Resource,
};

/// API group shared by every Kubewarden custom resource.
pub const POLICIES_API_GROUP: &str = "policies.kubewarden.io";
