//! Controller runner - builds the CloudShell controller future
//!
//! The controller watches CloudShell sessions and every child kind they own,
//! so a change to (or deletion of) any child re-triggers its session.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use k8s_openapi::NamespaceResourceScope;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, Resource};

use cloudshell_common::crd::{CloudShell, Route};
use cloudshell_controller::{error_policy, reconcile, Context, ControllerConfig};

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
const WATCH_TIMEOUT_SECS: u32 = 25;

/// Build the CloudShell controller future.
///
/// With `namespace` set, sessions and children are only watched there.
pub fn build_cloudshell_controller(
    client: Client,
    namespace: Option<&str>,
    config: ControllerConfig,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    let ctx = Arc::new(Context::from_client(client.clone(), config));
    let watcher = || WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS);

    match namespace {
        Some(ns) => tracing::info!(namespace = %ns, "- CloudShell controller (namespaced)"),
        None => tracing::info!("- CloudShell controller (all namespaces)"),
    }

    Box::pin(
        Controller::new(scoped_api::<CloudShell>(&client, namespace), watcher())
            .owns(scoped_api::<ServiceAccount>(&client, namespace), watcher())
            .owns(scoped_api::<Role>(&client, namespace), watcher())
            .owns(scoped_api::<RoleBinding>(&client, namespace), watcher())
            .owns(scoped_api::<Service>(&client, namespace), watcher())
            .owns(scoped_api::<Route>(&client, namespace), watcher())
            .owns(scoped_api::<Deployment>(&client, namespace), watcher())
            .shutdown_on_signal()
            .run(reconcile, error_policy, ctx)
            .for_each(log_reconcile_result("CloudShell")),
    )
}

fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}
