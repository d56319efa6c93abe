//! Kubernetes helpers shared by the controller and the operator binary

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};

use crate::Error;

/// Kubernetes condition status value meaning "true"
pub const STATUS_TRUE: &str = "True";

/// Build a controller owner reference pointing at `owner`.
///
/// The reference sets `controller` and `blockOwnerDeletion` so the garbage
/// collector removes the child when the owner is deleted, and so the owning
/// controller is re-triggered by changes to the child. Fails when the owner
/// has not been persisted yet (no name or UID).
pub fn controller_owner_ref<K>(owner: &K) -> Result<OwnerReference, Error>
where
    K: Resource<DynamicType = ()>,
{
    let mut owner_ref = owner.controller_owner_ref(&()).ok_or_else(|| {
        Error::reference(
            K::kind(&()).to_string(),
            owner.meta().name.clone().unwrap_or_default(),
            "owner has no name or uid",
        )
    })?;
    owner_ref.block_owner_deletion = Some(true);
    Ok(owner_ref)
}

/// Stamp `child` with a controller owner reference to `owner`.
///
/// Replaces any existing reference to the same owner UID and leaves
/// references to other owners untouched.
pub fn set_owner_reference<C, K>(child: &mut C, owner: &K) -> Result<(), Error>
where
    C: Resource<DynamicType = ()>,
    K: Resource<DynamicType = ()>,
{
    let owner_ref = controller_owner_ref(owner).map_err(|e| match e {
        Error::Reference { message, .. } => {
            Error::reference(C::kind(&()).to_string(), child.name_any(), message)
        }
        other => other,
    })?;
    let refs = child.meta_mut().owner_references.get_or_insert_with(Vec::new);
    refs.retain(|r| r.uid != owner_ref.uid);
    refs.push(owner_ref);
    Ok(())
}

/// Whether an object's metadata carries an owner reference to `uid`
pub fn is_owned_by(meta: &ObjectMeta, uid: &str) -> bool {
    meta.owner_references
        .as_deref()
        .unwrap_or_default()
        .iter()
        .any(|r| r.uid == uid)
}

/// Check if a Kubernetes condition of the given type has status "True"
///
/// This is a helper for checking conditions on deployments and other
/// resources that use the standard Kubernetes condition format.
pub fn has_condition<T>(conditions: Option<&[T]>, condition_type: &str) -> bool
where
    T: HasConditionFields,
{
    conditions
        .map(|conds| {
            conds
                .iter()
                .any(|c| c.type_field() == condition_type && c.status_field() == STATUS_TRUE)
        })
        .unwrap_or(false)
}

/// Trait for types that have condition-like fields (type and status)
pub trait HasConditionFields {
    /// Get the condition type field value
    fn type_field(&self) -> &str;
    /// Get the condition status field value
    fn status_field(&self) -> &str;
}

impl HasConditionFields for k8s_openapi::api::apps::v1::DeploymentCondition {
    fn type_field(&self) -> &str {
        &self.type_
    }
    fn status_field(&self) -> &str {
        &self.status
    }
}
