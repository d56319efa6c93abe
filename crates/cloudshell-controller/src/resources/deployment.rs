//! Session workload: user shell, exec sidecar and authenticating proxy
//!
//! The pod runs three containers:
//!
//! - `shell-host` runs the user-chosen image and idles as the exec target
//! - `machine-exec` serves terminal sessions over websocket on port 4444
//! - `oauth-proxy` terminates TLS on 8443, authenticates the caller against
//!   the cluster OAuth server, checks `exec` permission on pods in the
//!   session namespace and forwards to `machine-exec`

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{
    Deployment, DeploymentSpec, DeploymentStrategy, RollingUpdateDeployment,
};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, PodSpec, PodTemplateSpec, ResourceRequirements, SecretVolumeSource,
    Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use cloudshell_common::kube_utils::has_condition;

use super::child_meta;
use super::network::PROXY_PORT;
use crate::config::WorkloadConfig;
use crate::crd::CloudShellSpec;
use crate::identity::{child_name, session_labels};

/// Port `machine-exec` listens on
pub const MACHINE_EXEC_PORT: i32 = 4444;

/// Where the serving certificate secret is mounted in the proxy
const TLS_MOUNT_PATH: &str = "/etc/tls/private";

/// Octal 0644
const SECRET_DEFAULT_MODE: i32 = 420;

/// Surface the tail of the container log when a container exits without
/// writing a termination message
const TERMINATION_MESSAGE_POLICY: &str = "FallbackToLogsOnError";

/// Build the session Deployment.
///
/// One replica, rolling updates with a surge and unavailability of one, and a
/// one second termination grace period so a replaced shell exits promptly.
pub fn build_deployment(
    spec: &CloudShellSpec,
    id: &str,
    namespace: &str,
    workload: &WorkloadConfig,
) -> Deployment {
    let name = child_name(id);
    let labels = session_labels(id);

    Deployment {
        metadata: child_meta(name.clone(), id, namespace),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            strategy: Some(DeploymentStrategy {
                type_: Some("RollingUpdate".to_string()),
                rolling_update: Some(RollingUpdateDeployment {
                    max_surge: Some(IntOrString::Int(1)),
                    max_unavailable: Some(IntOrString::Int(1)),
                }),
            }),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(name.clone()),
                    termination_grace_period_seconds: Some(1),
                    containers: vec![
                        shell_host(spec, workload),
                        machine_exec(workload),
                        oauth_proxy(id, namespace, workload),
                    ],
                    volumes: Some(vec![Volume {
                        name: name.clone(),
                        secret: Some(SecretVolumeSource {
                            secret_name: Some(name),
                            default_mode: Some(SECRET_DEFAULT_MODE),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Whether the Deployment reports the `Available` condition as true
pub fn deployment_available(deployment: &Deployment) -> bool {
    has_condition(
        deployment
            .status
            .as_ref()
            .and_then(|s| s.conditions.as_deref()),
        "Available",
    )
}

fn shell_host(spec: &CloudShellSpec, workload: &WorkloadConfig) -> Container {
    Container {
        name: "shell-host".to_string(),
        image: Some(spec.image.clone()),
        image_pull_policy: Some("Always".to_string()),
        termination_message_policy: Some(TERMINATION_MESSAGE_POLICY.to_string()),
        resources: Some(memory(&workload.container_memory)),
        ..Default::default()
    }
}

fn machine_exec(workload: &WorkloadConfig) -> Container {
    Container {
        name: "machine-exec".to_string(),
        image: Some(workload.machine_exec_image.clone()),
        image_pull_policy: Some("Always".to_string()),
        termination_message_policy: Some(TERMINATION_MESSAGE_POLICY.to_string()),
        ports: Some(vec![ContainerPort {
            name: Some("exec".to_string()),
            container_port: MACHINE_EXEC_PORT,
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        resources: Some(memory(&workload.container_memory)),
        ..Default::default()
    }
}

fn oauth_proxy(id: &str, namespace: &str, workload: &WorkloadConfig) -> Container {
    let args = vec![
        format!("--https-address=:{}", PROXY_PORT),
        "--http-address=127.0.0.1:8080".to_string(),
        "--provider=openshift".to_string(),
        format!("--openshift-service-account={}", child_name(id)),
        format!("--upstream=http://localhost:{}", MACHINE_EXEC_PORT),
        format!("--tls-cert={}/tls.crt", TLS_MOUNT_PATH),
        format!("--tls-key={}/tls.key", TLS_MOUNT_PATH),
        format!("--cookie-secret={}", workload.cookie_secret),
        format!("--openshift-sar={}", exec_access_review(namespace)),
    ];

    Container {
        name: "oauth-proxy".to_string(),
        image: Some(workload.oauth_proxy_image.clone()),
        image_pull_policy: Some("Always".to_string()),
        termination_message_policy: Some(TERMINATION_MESSAGE_POLICY.to_string()),
        args: Some(args),
        ports: Some(vec![ContainerPort {
            name: Some("https".to_string()),
            container_port: PROXY_PORT,
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        volume_mounts: Some(vec![VolumeMount {
            name: child_name(id),
            mount_path: TLS_MOUNT_PATH.to_string(),
            ..Default::default()
        }]),
        resources: Some(memory(&workload.container_memory)),
        ..Default::default()
    }
}

/// SubjectAccessReview the proxy runs for each caller: may they exec into
/// pods of the session namespace.
fn exec_access_review(namespace: &str) -> serde_json::Value {
    serde_json::json!({
        "namespace": namespace,
        "resource": "pods",
        "name": "",
        "verb": "exec",
    })
}

fn memory(amount: &str) -> ResourceRequirements {
    let quantity = BTreeMap::from([("memory".to_string(), Quantity(amount.to_string()))]);
    ResourceRequirements {
        requests: Some(quantity.clone()),
        limits: Some(quantity),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::{DeploymentCondition, DeploymentStatus};

    fn spec() -> CloudShellSpec {
        CloudShellSpec {
            image: "registry/example:latest".to_string(),
        }
    }

    fn workload() -> WorkloadConfig {
        WorkloadConfig {
            cookie_secret: "s3cret".to_string(),
            ..Default::default()
        }
    }

    fn pod_spec(d: &Deployment) -> &PodSpec {
        d.spec
            .as_ref()
            .and_then(|s| s.template.spec.as_ref())
            .expect("pod spec")
    }

    fn container<'a>(d: &'a Deployment, name: &str) -> &'a Container {
        pod_spec(d)
            .containers
            .iter()
            .find(|c| c.name == name)
            .expect("container present")
    }

    #[test]
    fn workload_shape_matches_session() {
        let d = build_deployment(&spec(), "abc", "dev", &workload());
        let s = d.spec.as_ref().expect("spec");
        assert_eq!(s.replicas, Some(1));
        assert_eq!(s.selector.match_labels, Some(session_labels("abc")));
        assert_eq!(
            s.template.metadata.as_ref().and_then(|m| m.labels.clone()),
            Some(session_labels("abc"))
        );

        let pod = pod_spec(&d);
        assert_eq!(pod.service_account_name.as_deref(), Some("cloudshell-abc"));
        assert_eq!(pod.termination_grace_period_seconds, Some(1));
        let names: Vec<&str> = pod.containers.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["shell-host", "machine-exec", "oauth-proxy"]);
    }

    #[test]
    fn shell_host_runs_requested_image() {
        let d = build_deployment(&spec(), "abc", "dev", &workload());
        let shell = container(&d, "shell-host");
        assert_eq!(shell.image.as_deref(), Some("registry/example:latest"));
        let limits = shell
            .resources
            .as_ref()
            .and_then(|r| r.limits.as_ref())
            .expect("limits");
        assert_eq!(limits["memory"], Quantity("128Mi".to_string()));
    }

    #[test]
    fn proxy_is_wired_to_exec_and_tls_secret() {
        let d = build_deployment(&spec(), "abc", "dev", &workload());
        let proxy = container(&d, "oauth-proxy");
        let args = proxy.args.as_ref().expect("args");
        assert!(args.contains(&"--upstream=http://localhost:4444".to_string()));
        assert!(args.contains(&"--openshift-service-account=cloudshell-abc".to_string()));
        assert!(args.contains(&"--cookie-secret=s3cret".to_string()));
        let sar = args
            .iter()
            .find_map(|a| a.strip_prefix("--openshift-sar="))
            .expect("sar arg");
        let sar: serde_json::Value = serde_json::from_str(sar).expect("sar is json");
        assert_eq!(
            sar,
            serde_json::json!({"namespace": "dev", "resource": "pods", "name": "", "verb": "exec"})
        );

        let mounts = proxy.volume_mounts.as_ref().expect("mounts");
        assert_eq!(mounts[0].mount_path, "/etc/tls/private");
        let volumes = pod_spec(&d).volumes.as_ref().expect("volumes");
        assert_eq!(volumes[0].name, mounts[0].name);
        assert_eq!(
            volumes[0].secret.as_ref().and_then(|s| s.secret_name.as_deref()),
            Some("cloudshell-abc")
        );
    }

    #[test]
    fn containers_fall_back_to_logs_for_termination_message() {
        let d = build_deployment(&spec(), "abc", "dev", &workload());
        for c in &pod_spec(&d).containers {
            assert_eq!(
                c.termination_message_policy.as_deref(),
                Some("FallbackToLogsOnError"),
                "container {}",
                c.name
            );
        }
    }

    #[test]
    fn build_is_deterministic() {
        let a = build_deployment(&spec(), "abc", "dev", &workload());
        let b = build_deployment(&spec(), "abc", "dev", &workload());
        assert_eq!(a, b);
    }

    #[test]
    fn availability_follows_available_condition() {
        let mut d = build_deployment(&spec(), "abc", "dev", &workload());
        assert!(!deployment_available(&d));

        d.status = Some(DeploymentStatus {
            conditions: Some(vec![DeploymentCondition {
                type_: "Available".to_string(),
                status: "False".to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        });
        assert!(!deployment_available(&d));

        if let Some(conds) = d.status.as_mut().and_then(|s| s.conditions.as_mut()) {
            conds[0].status = "True".to_string();
        }
        assert!(deployment_available(&d));
    }
}
