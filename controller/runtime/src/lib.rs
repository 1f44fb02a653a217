#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use kubewarden_controller_core as core;
pub use kubewarden_controller_k8s_api as k8s;
pub use kubewarden_controller_k8s_config as config;

mod args;
mod reconcile;
mod requeue;

pub use self::{
    args::Args,
    requeue::{Requeue, RequeueRx},
};
