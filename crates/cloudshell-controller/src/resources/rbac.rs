//! RBAC prerequisites: the exec Role and the two RoleBindings
//!
//! Both bindings grant to every ServiceAccount in the session namespace, so
//! the proxy's SubjectAccessReview (`exec` on `pods`) succeeds for users who
//! can already act in the namespace.

use k8s_openapi::api::rbac::v1::{PolicyRule, Role, RoleBinding, RoleRef, Subject};

use super::child_meta;
use crate::identity::{child_name, view_binding_name};

const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

/// Built-in ClusterRole granting read access to most namespaced objects
const VIEW_CLUSTER_ROLE: &str = "view";

/// Build the Role granting `create` on `pods/exec`
pub fn build_exec_role(id: &str, namespace: &str) -> Role {
    Role {
        metadata: child_meta(child_name(id), id, namespace),
        rules: Some(vec![PolicyRule {
            api_groups: Some(vec![String::new()]),
            resources: Some(vec!["pods/exec".to_string()]),
            verbs: vec!["create".to_string()],
            ..Default::default()
        }]),
    }
}

/// Build the binding of the exec Role
pub fn build_exec_role_binding(id: &str, namespace: &str) -> RoleBinding {
    RoleBinding {
        metadata: child_meta(child_name(id), id, namespace),
        role_ref: RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: "Role".to_string(),
            name: child_name(id),
        },
        subjects: Some(vec![namespace_service_accounts(namespace)]),
    }
}

/// Build the binding of the `view` ClusterRole
pub fn build_view_role_binding(id: &str, namespace: &str) -> RoleBinding {
    RoleBinding {
        metadata: child_meta(view_binding_name(id), id, namespace),
        role_ref: RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: "ClusterRole".to_string(),
            name: VIEW_CLUSTER_ROLE.to_string(),
        },
        subjects: Some(vec![namespace_service_accounts(namespace)]),
    }
}

fn namespace_service_accounts(namespace: &str) -> Subject {
    Subject {
        api_group: Some(RBAC_API_GROUP.to_string()),
        kind: "Group".to_string(),
        name: format!("system:serviceaccounts:{}", namespace),
        namespace: None,
    }
}
