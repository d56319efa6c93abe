//! Access to the cluster object store
//!
//! [`SessionStore`] is the only seam between the reconciler and the API
//! server, so phases can be exercised against mocks or an in-memory store.
//! Every error returned is already classified by [`Error::from_kube`].

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::{Client, Resource};
#[cfg(test)]
use mockall::automock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use cloudshell_common::FIELD_MANAGER;

use crate::crd::{CloudShell, CloudShellStatus, Route};
use crate::resources::{ChildKind, ChildResource};
use crate::Error;

/// Trait abstracting object store operations for the reconciler
///
/// This trait allows mocking the Kubernetes client in tests while using
/// the real client in production.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Read a child object; `Ok(None)` when it does not exist
    async fn fetch(
        &self,
        kind: ChildKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ChildResource>, Error>;

    /// Create a child object
    async fn create(&self, desired: &ChildResource) -> Result<(), Error>;

    /// Overwrite the fields `desired` sets on the object last read as `live`.
    ///
    /// The write is conditional on `live`'s resource version and fails with
    /// [`Error::Conflict`] when the object changed in between.
    async fn patch(&self, desired: &ChildResource, live: &ChildResource) -> Result<(), Error>;

    /// Merge `status` into a session's status subresource
    async fn patch_status(
        &self,
        name: &str,
        namespace: &str,
        status: &CloudShellStatus,
    ) -> Result<(), Error>;
}

/// Real Kubernetes client implementation
pub struct KubeSessionStore {
    client: Client,
}

impl KubeSessionStore {
    /// Create a store backed by `client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn get_typed<K>(&self, namespace: &str, name: &str) -> Result<Option<K>, Error>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Debug
            + DeserializeOwned,
    {
        match self.api::<K>(namespace).get(name).await {
            Ok(obj) => Ok(Some(obj)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(Error::from_kube(e, K::kind(&()), namespace, name)),
        }
    }

    async fn create_typed<K>(&self, obj: &K) -> Result<(), Error>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Debug
            + Serialize
            + DeserializeOwned,
    {
        let namespace = obj.meta().namespace.clone().unwrap_or_default();
        let name = obj.meta().name.clone().unwrap_or_default();
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        self.api::<K>(&namespace)
            .create(&params, obj)
            .await
            .map_err(|e| Error::from_kube(e, K::kind(&()), &namespace, &name))?;
        Ok(())
    }

    async fn merge_typed<K>(
        &self,
        namespace: &str,
        name: &str,
        body: &serde_json::Value,
    ) -> Result<(), Error>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Debug
            + DeserializeOwned,
    {
        self.api::<K>(namespace)
            .patch(name, &patch_params(), &Patch::Merge(body))
            .await
            .map_err(|e| Error::from_kube(e, K::kind(&()), namespace, name))?;
        Ok(())
    }
}

fn patch_params() -> PatchParams {
    PatchParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..Default::default()
    }
}

/// Merge patch body: the desired object without status, guarded by the
/// resource version of the live object.
///
/// Keys only the live object carries are left in place by the server; the
/// differ does not compare them.
pub(crate) fn conditional_patch_body(
    desired: &ChildResource,
    live: &ChildResource,
) -> Result<serde_json::Value, Error> {
    let mut body = desired.to_json()?;
    if let Some(obj) = body.as_object_mut() {
        obj.remove("status");
    }
    if let Some(version) = live.resource_version() {
        body["metadata"]["resourceVersion"] = serde_json::Value::String(version.to_string());
    }
    Ok(body)
}

#[async_trait]
impl SessionStore for KubeSessionStore {
    async fn fetch(
        &self,
        kind: ChildKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ChildResource>, Error> {
        let found = match kind {
            ChildKind::ServiceAccount => self
                .get_typed::<ServiceAccount>(namespace, name)
                .await?
                .map(ChildResource::ServiceAccount),
            ChildKind::Role => self
                .get_typed::<Role>(namespace, name)
                .await?
                .map(ChildResource::Role),
            ChildKind::RoleBinding => self
                .get_typed::<RoleBinding>(namespace, name)
                .await?
                .map(ChildResource::RoleBinding),
            ChildKind::Service => self
                .get_typed::<Service>(namespace, name)
                .await?
                .map(ChildResource::Service),
            ChildKind::Route => self
                .get_typed::<Route>(namespace, name)
                .await?
                .map(ChildResource::Route),
            ChildKind::Deployment => self
                .get_typed::<Deployment>(namespace, name)
                .await?
                .map(|d| ChildResource::Deployment(Box::new(d))),
        };
        Ok(found)
    }

    async fn create(&self, desired: &ChildResource) -> Result<(), Error> {
        debug!(kind = %desired.kind(), name = %desired.name(), "creating child");
        match desired {
            ChildResource::ServiceAccount(o) => self.create_typed(o).await,
            ChildResource::Role(o) => self.create_typed(o).await,
            ChildResource::RoleBinding(o) => self.create_typed(o).await,
            ChildResource::Service(o) => self.create_typed(o).await,
            ChildResource::Route(o) => self.create_typed(o).await,
            ChildResource::Deployment(o) => self.create_typed(o.as_ref()).await,
        }
    }

    async fn patch(&self, desired: &ChildResource, live: &ChildResource) -> Result<(), Error> {
        let body = conditional_patch_body(desired, live)?;
        let (namespace, name) = (desired.namespace(), desired.name());
        debug!(
            kind = %desired.kind(),
            name = %name,
            resource_version = ?live.resource_version(),
            "patching child"
        );
        match desired.kind() {
            ChildKind::ServiceAccount => {
                self.merge_typed::<ServiceAccount>(&namespace, &name, &body).await
            }
            ChildKind::Role => self.merge_typed::<Role>(&namespace, &name, &body).await,
            ChildKind::RoleBinding => {
                self.merge_typed::<RoleBinding>(&namespace, &name, &body).await
            }
            ChildKind::Service => self.merge_typed::<Service>(&namespace, &name, &body).await,
            ChildKind::Route => self.merge_typed::<Route>(&namespace, &name, &body).await,
            ChildKind::Deployment => {
                self.merge_typed::<Deployment>(&namespace, &name, &body).await
            }
        }
    }

    async fn patch_status(
        &self,
        name: &str,
        namespace: &str,
        status: &CloudShellStatus,
    ) -> Result<(), Error> {
        let api: Api<CloudShell> = self.api(namespace);
        let status_patch = serde_json::json!({ "status": status });

        api.patch_status(name, &patch_params(), &Patch::Merge(&status_patch))
            .await
            .map_err(|e| Error::from_kube(e, "CloudShell", namespace, name))?;

        Ok(())
    }
}
