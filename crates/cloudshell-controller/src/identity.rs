//! Session identity and the names derived from it
//!
//! Every child resource is named and labeled from the session identifier,
//! never from the session's display name, so renaming or recreating a session
//! with the same name can never collide with an older session's children.

use std::collections::BTreeMap;

use uuid::Uuid;

use cloudshell_common::{RESOURCE_PREFIX, SESSION_ID_LABEL, WORKSPACE_ID_LABEL};

use crate::Error;

/// Number of dash-delimited UUID groups kept in the session identifier
const ID_GROUPS: usize = 3;

/// Derive the session identifier from a creation UID.
///
/// The UID is parsed and rendered in canonical lower-case hyphenated form,
/// then the first three groups are concatenated:
/// `a1b2c3d4-e5f6-47a8-9b0c-1d2e3f405060` becomes `a1b2c3d4e5f647a8`.
pub fn assign_identity(uid: &str) -> Result<String, Error> {
    let parsed = Uuid::parse_str(uid).map_err(|e| Error::malformed_identifier(uid, e.to_string()))?;
    let canonical = parsed.hyphenated().to_string();
    Ok(canonical.split('-').take(ID_GROUPS).collect())
}

/// Name shared by the session's ServiceAccount, Role, exec RoleBinding,
/// Service, Route, Deployment and TLS secret
pub fn child_name(id: &str) -> String {
    format!("{}-{}", RESOURCE_PREFIX, id)
}

/// Name of the RoleBinding granting the `view` ClusterRole
pub fn view_binding_name(id: &str) -> String {
    format!("{}-view-{}", RESOURCE_PREFIX, id)
}

/// External host name of the session
pub fn host_name(id: &str, base_domain: &str) -> String {
    format!("{}.{}", child_name(id), base_domain)
}

/// Labels carried by every child, also used as the pod selector
pub fn session_labels(id: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (SESSION_ID_LABEL.to_string(), id.to_string()),
        (WORKSPACE_ID_LABEL.to_string(), id.to_string()),
    ])
}
