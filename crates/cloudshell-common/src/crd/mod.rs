//! Custom resource definitions
//!
//! `CloudShell` is owned by this operator. `Route` is OpenShift's
//! `route.openshift.io/v1` type, modeled here because k8s-openapi does not
//! ship it.

mod cloudshell;
mod route;

pub use cloudshell::{CloudShell, CloudShellSpec, CloudShellStatus};
pub use route::{
    InsecureEdgeTerminationPolicy, Route, RouteIngress, RouteSpec, RouteStatus,
    RouteTargetReference, TlsConfig, TlsTermination,
};
