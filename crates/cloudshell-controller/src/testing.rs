//! In-memory object store for multi-pass reconciliation tests
//!
//! Behaves like a small API server: assigns UIDs and resource versions, fills
//! in the defaults a real server adds, applies patches as JSON merge patches
//! onto the stored object, rejects stale patches with a conflict, and records
//! every call so tests can assert on what a pass did.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentCondition, DeploymentStatus};
use k8s_openapi::api::core::v1::{ObjectReference, PodSecurityContext, Service};
use kube::error::ErrorResponse;

use cloudshell_common::{EventPublisher, Reason};

use crate::crd::CloudShellStatus;
use crate::resources::{ChildKind, ChildResource};
use crate::store::{conditional_patch_body, SessionStore};
use crate::Error;

type Key = (ChildKind, String, String);

/// One recorded store operation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreCall {
    Fetch(ChildKind),
    Create(ChildKind),
    Patch(ChildKind),
    PatchStatus,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<Key, ChildResource>,
    statuses: BTreeMap<(String, String), CloudShellStatus>,
    calls: Vec<StoreCall>,
    created: Vec<(ChildKind, String)>,
    patched: Vec<(ChildKind, String)>,
    writes: usize,
    next_version: u64,
    fetch_failures: BTreeMap<ChildKind, ErrorResponse>,
    next_patch_failure: Option<ErrorResponse>,
}

impl State {
    fn bump_version(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("store lock poisoned")
    }

    /// Last status written for a session
    pub fn session_status(&self, namespace: &str, name: &str) -> Option<CloudShellStatus> {
        self.lock()
            .statuses
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Children created so far, in creation order
    pub fn created(&self) -> Vec<(ChildKind, String)> {
        self.lock().created.clone()
    }

    /// Children successfully patched so far, in order
    pub fn patched(&self) -> Vec<(ChildKind, String)> {
        self.lock().patched.clone()
    }

    /// Number of successful creates, patches and status writes
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn contains(&self, kind: ChildKind, namespace: &str, name: &str) -> bool {
        self.lock()
            .objects
            .contains_key(&(kind, namespace.to_string(), name.to_string()))
    }

    /// Delete an object out of band
    pub fn remove(&self, kind: ChildKind, namespace: &str, name: &str) {
        self.lock()
            .objects
            .remove(&(kind, namespace.to_string(), name.to_string()));
    }

    /// Fail every fetch of `kind` with the given API response
    pub fn fail_fetch(&self, kind: ChildKind, response: ErrorResponse) {
        self.lock().fetch_failures.insert(kind, response);
    }

    /// Fail the next patch with the given API response
    pub fn fail_next_patch(&self, response: ErrorResponse) {
        self.lock().next_patch_failure = Some(response);
    }

    /// Set the `Available` condition of a stored Deployment, as the
    /// deployment controller would
    pub fn set_deployment_available(&self, namespace: &str, name: &str, available: bool) {
        let mut state = self.lock();
        let version = state.bump_version();
        let key = (ChildKind::Deployment, namespace.to_string(), name.to_string());
        if let Some(ChildResource::Deployment(d)) = state.objects.get_mut(&key) {
            d.status = Some(DeploymentStatus {
                replicas: Some(1),
                conditions: Some(vec![DeploymentCondition {
                    type_: "Available".to_string(),
                    status: if available { "True" } else { "False" }.to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            });
            d.metadata.resource_version = Some(version);
        }
    }

    /// Modify a stored Deployment out of band
    pub fn mutate_deployment(&self, namespace: &str, name: &str, f: impl FnOnce(&mut Deployment)) {
        let mut state = self.lock();
        let version = state.bump_version();
        let key = (ChildKind::Deployment, namespace.to_string(), name.to_string());
        if let Some(ChildResource::Deployment(d)) = state.objects.get_mut(&key) {
            f(d);
            d.metadata.resource_version = Some(version);
        }
    }

    /// Modify a stored Service out of band
    pub fn mutate_service(&self, namespace: &str, name: &str, f: impl FnOnce(&mut Service)) {
        let mut state = self.lock();
        let version = state.bump_version();
        let key = (ChildKind::Service, namespace.to_string(), name.to_string());
        if let Some(ChildResource::Service(svc)) = state.objects.get_mut(&key) {
            f(svc);
            svc.metadata.resource_version = Some(version);
        }
    }
}

fn key_of(obj: &ChildResource) -> Key {
    (obj.kind(), obj.namespace(), obj.name())
}

/// Fill in what a real API server adds on write
fn apply_server_defaults(obj: &mut ChildResource) {
    match obj {
        ChildResource::Deployment(d) => {
            if let Some(spec) = d.spec.as_mut() {
                spec.revision_history_limit = Some(10);
                spec.progress_deadline_seconds = Some(600);
                if let Some(pod) = spec.template.spec.as_mut() {
                    pod.dns_policy = Some("ClusterFirst".to_string());
                    pod.restart_policy = Some("Always".to_string());
                    pod.scheduler_name = Some("default-scheduler".to_string());
                    pod.security_context = Some(PodSecurityContext::default());
                    pod.service_account = pod.service_account_name.clone();
                    for c in &mut pod.containers {
                        c.termination_message_path = Some("/dev/termination-log".to_string());
                        c.termination_message_policy = Some("File".to_string());
                    }
                }
            }
        }
        ChildResource::Service(svc) => {
            if let Some(spec) = svc.spec.as_mut() {
                spec.cluster_ip = Some("10.0.0.10".to_string());
                spec.cluster_ips = Some(vec!["10.0.0.10".to_string()]);
                spec.session_affinity = Some("None".to_string());
                spec.ip_families = Some(vec!["IPv4".to_string()]);
                spec.ip_family_policy = Some("SingleStack".to_string());
                spec.internal_traffic_policy = Some("Cluster".to_string());
            }
        }
        ChildResource::Route(route) => {
            route.spec.wildcard_policy = Some("None".to_string());
            route.spec.to.weight = Some(100);
        }
        ChildResource::ServiceAccount(sa) => {
            sa.secrets = Some(vec![ObjectReference {
                name: sa.metadata.name.as_ref().map(|n| format!("{}-token-x7k2p", n)),
                ..Default::default()
            }]);
        }
        ChildResource::Role(_) | ChildResource::RoleBinding(_) => {}
    }
}

fn from_json(kind: ChildKind, value: serde_json::Value) -> Result<ChildResource, Error> {
    let result = match kind {
        ChildKind::ServiceAccount => serde_json::from_value(value).map(ChildResource::ServiceAccount),
        ChildKind::Role => serde_json::from_value(value).map(ChildResource::Role),
        ChildKind::RoleBinding => serde_json::from_value(value).map(ChildResource::RoleBinding),
        ChildKind::Service => serde_json::from_value(value).map(ChildResource::Service),
        ChildKind::Route => serde_json::from_value(value).map(ChildResource::Route),
        ChildKind::Deployment => {
            serde_json::from_value(value).map(|d| ChildResource::Deployment(Box::new(d)))
        }
    };
    result.map_err(|e| Error::serialization_for_kind(kind.as_str(), e.to_string()))
}

fn api_error(response: ErrorResponse, obj_key: &Key) -> Error {
    let (kind, namespace, name) = obj_key;
    Error::from_kube(kube::Error::Api(response), kind.as_str(), namespace, name)
}

fn response(code: u16, reason: &str) -> ErrorResponse {
    ErrorResponse {
        status: "Failure".to_string(),
        message: reason.to_string(),
        reason: reason.to_string(),
        code,
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn fetch(
        &self,
        kind: ChildKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ChildResource>, Error> {
        let mut state = self.lock();
        state.calls.push(StoreCall::Fetch(kind));
        let key = (kind, namespace.to_string(), name.to_string());
        if let Some(failure) = state.fetch_failures.get(&kind) {
            return Err(api_error(failure.clone(), &key));
        }
        Ok(state.objects.get(&key).cloned())
    }

    async fn create(&self, desired: &ChildResource) -> Result<(), Error> {
        let mut state = self.lock();
        state.calls.push(StoreCall::Create(desired.kind()));
        let key = key_of(desired);
        if state.objects.contains_key(&key) {
            return Err(api_error(response(409, "AlreadyExists"), &key));
        }

        let mut obj = desired.clone();
        apply_server_defaults(&mut obj);
        let version = state.bump_version();
        let meta = obj.meta_mut();
        meta.uid = Some(format!("uid-{}", version));
        meta.resource_version = Some(version);

        state.created.push((key.0, key.2.clone()));
        state.writes += 1;
        state.objects.insert(key, obj);
        Ok(())
    }

    async fn patch(&self, desired: &ChildResource, live: &ChildResource) -> Result<(), Error> {
        let mut state = self.lock();
        state.calls.push(StoreCall::Patch(desired.kind()));
        let key = key_of(desired);
        if let Some(failure) = state.next_patch_failure.take() {
            return Err(api_error(failure, &key));
        }
        let Some(stored) = state.objects.get(&key).cloned() else {
            return Err(api_error(response(404, "NotFound"), &key));
        };
        if stored.resource_version() != live.resource_version() {
            return Err(api_error(response(409, "Conflict"), &key));
        }

        let mut merged = stored.to_json()?;
        json_patch::merge(&mut merged, &conditional_patch_body(desired, live)?);
        let mut obj = from_json(key.0, merged)?;
        apply_server_defaults(&mut obj);
        obj.meta_mut().resource_version = Some(state.bump_version());

        state.patched.push((key.0, key.2.clone()));
        state.writes += 1;
        state.objects.insert(key, obj);
        Ok(())
    }

    async fn patch_status(
        &self,
        name: &str,
        namespace: &str,
        status: &CloudShellStatus,
    ) -> Result<(), Error> {
        let mut state = self.lock();
        state.calls.push(StoreCall::PatchStatus);
        state
            .statuses
            .insert((namespace.to_string(), name.to_string()), status.clone());
        state.writes += 1;
        Ok(())
    }
}

/// Event publisher that keeps every event for later assertions
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<(Reason, String)>>,
}

impl RecordingPublisher {
    pub fn reasons(&self) -> Vec<Reason> {
        self.events
            .lock()
            .expect("publisher lock poisoned")
            .iter()
            .map(|(r, _)| *r)
            .collect()
    }

    pub fn notes(&self) -> Vec<String> {
        self.events
            .lock()
            .expect("publisher lock poisoned")
            .iter()
            .map(|(_, n)| n.clone())
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, _subject: &ObjectReference, reason: Reason, note: String) {
        self.events
            .lock()
            .expect("publisher lock poisoned")
            .push((reason, note));
    }
}
