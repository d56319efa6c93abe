//! CloudShell session controller
//!
//! Reconciles `CloudShell` sessions into the child resources that realize
//! them:
//!
//! - **Identity**: derives the short session identifier every child name is built from
//! - **Resources**: pure builders for the desired ServiceAccount, RBAC, network and Deployment objects
//! - **Diff**: declarative equivalence between desired and live objects
//! - **Phases**: the ordered convergence state machine
//! - **Controller**: the `kube::runtime` entrypoints (`reconcile`, `error_policy`)

pub mod config;
pub mod controller;
pub mod diff;
pub mod identity;
pub mod phases;
pub mod resources;
pub mod store;

#[cfg(test)]
mod testing;

pub use config::{ControllerConfig, WorkloadConfig};
pub use controller::{error_policy, reconcile, Context};
pub use store::{KubeSessionStore, SessionStore};

pub(crate) use cloudshell_common::{crd, Error};
