//! Desired state of a session's child resources
//!
//! Each submodule holds pure builders for one area: `service_account`,
//! `rbac`, `network` and `deployment`. Builders never touch the store, never
//! fail on well-formed input, and produce identical output for identical
//! input (label and annotation maps are `BTreeMap`s, lists are built in a
//! fixed order).
//!
//! [`ChildResource`] wraps the typed objects so the store, the differ and the
//! phases can handle every kind uniformly.

pub mod deployment;
pub mod network;
pub mod rbac;
pub mod service_account;

use std::fmt;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;

use cloudshell_common::kube_utils::set_owner_reference;

use crate::crd::{CloudShell, Route};
use crate::Error;

pub use deployment::{build_deployment, deployment_available};
pub use network::{build_route, build_service};
pub use rbac::{build_exec_role, build_exec_role_binding, build_view_role_binding};
pub use service_account::build_service_account;

/// Kinds of child resources a session owns
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChildKind {
    /// core/v1 ServiceAccount
    ServiceAccount,
    /// rbac/v1 Role
    Role,
    /// rbac/v1 RoleBinding
    RoleBinding,
    /// core/v1 Service
    Service,
    /// route.openshift.io/v1 Route
    Route,
    /// apps/v1 Deployment
    Deployment,
}

impl ChildKind {
    /// Kubernetes kind name
    pub fn as_str(&self) -> &'static str {
        match self {
            ChildKind::ServiceAccount => "ServiceAccount",
            ChildKind::Role => "Role",
            ChildKind::RoleBinding => "RoleBinding",
            ChildKind::Service => "Service",
            ChildKind::Route => "Route",
            ChildKind::Deployment => "Deployment",
        }
    }
}

impl fmt::Display for ChildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed child object of any supported kind
#[derive(Clone, Debug, PartialEq)]
pub enum ChildResource {
    /// ServiceAccount the proxy authenticates as
    ServiceAccount(ServiceAccount),
    /// Role granting pod exec
    Role(Role),
    /// Binding of the exec Role or the view ClusterRole
    RoleBinding(RoleBinding),
    /// Cluster-internal Service in front of the proxy
    Service(Service),
    /// External Route to the Service
    Route(Route),
    /// Session workload
    Deployment(Box<Deployment>),
}

impl ChildResource {
    /// Kind of the wrapped object
    pub fn kind(&self) -> ChildKind {
        match self {
            ChildResource::ServiceAccount(_) => ChildKind::ServiceAccount,
            ChildResource::Role(_) => ChildKind::Role,
            ChildResource::RoleBinding(_) => ChildKind::RoleBinding,
            ChildResource::Service(_) => ChildKind::Service,
            ChildResource::Route(_) => ChildKind::Route,
            ChildResource::Deployment(_) => ChildKind::Deployment,
        }
    }

    /// Object metadata
    pub fn meta(&self) -> &ObjectMeta {
        match self {
            ChildResource::ServiceAccount(o) => &o.metadata,
            ChildResource::Role(o) => &o.metadata,
            ChildResource::RoleBinding(o) => &o.metadata,
            ChildResource::Service(o) => &o.metadata,
            ChildResource::Route(o) => &o.metadata,
            ChildResource::Deployment(o) => &o.metadata,
        }
    }

    /// Mutable object metadata
    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            ChildResource::ServiceAccount(o) => &mut o.metadata,
            ChildResource::Role(o) => &mut o.metadata,
            ChildResource::RoleBinding(o) => &mut o.metadata,
            ChildResource::Service(o) => &mut o.metadata,
            ChildResource::Route(o) => &mut o.metadata,
            ChildResource::Deployment(o) => &mut o.metadata,
        }
    }

    /// Object name
    pub fn name(&self) -> String {
        match self {
            ChildResource::ServiceAccount(o) => o.name_any(),
            ChildResource::Role(o) => o.name_any(),
            ChildResource::RoleBinding(o) => o.name_any(),
            ChildResource::Service(o) => o.name_any(),
            ChildResource::Route(o) => o.name_any(),
            ChildResource::Deployment(o) => o.name_any(),
        }
    }

    /// Object namespace
    pub fn namespace(&self) -> String {
        self.meta().namespace.clone().unwrap_or_default()
    }

    /// Resource version observed when the object was read
    pub fn resource_version(&self) -> Option<&str> {
        self.meta().resource_version.as_deref()
    }

    /// Stamp a controller owner reference to `session`
    pub fn set_owner(&mut self, session: &CloudShell) -> Result<(), Error> {
        match self {
            ChildResource::ServiceAccount(o) => set_owner_reference(o, session),
            ChildResource::Role(o) => set_owner_reference(o, session),
            ChildResource::RoleBinding(o) => set_owner_reference(o, session),
            ChildResource::Service(o) => set_owner_reference(o, session),
            ChildResource::Route(o) => set_owner_reference(o, session),
            ChildResource::Deployment(o) => set_owner_reference(o.as_mut(), session),
        }
    }

    /// Serialize to the JSON form sent to, and read from, the API server
    pub fn to_json(&self) -> Result<serde_json::Value, Error> {
        let result = match self {
            ChildResource::ServiceAccount(o) => serde_json::to_value(o),
            ChildResource::Role(o) => serde_json::to_value(o),
            ChildResource::RoleBinding(o) => serde_json::to_value(o),
            ChildResource::Service(o) => serde_json::to_value(o),
            ChildResource::Route(o) => serde_json::to_value(o),
            ChildResource::Deployment(o) => serde_json::to_value(o.as_ref()),
        };
        result.map_err(|e| Error::serialization_for_kind(self.kind().as_str(), e.to_string()))
    }
}

/// Metadata shared by every child: name, session namespace and session labels
pub(crate) fn child_meta(name: String, id: &str, namespace: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: Some(namespace.to_string()),
        labels: Some(crate::identity::session_labels(id)),
        ..Default::default()
    }
}
