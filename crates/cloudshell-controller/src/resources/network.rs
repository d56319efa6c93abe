//! Service and Route exposing the session's oauth proxy

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use super::child_meta;
use crate::crd::{
    InsecureEdgeTerminationPolicy, Route, RouteSpec, RouteTargetReference, TlsConfig,
    TlsTermination,
};
use crate::identity::{child_name, host_name, session_labels};

/// Port the oauth proxy serves HTTPS on
pub const PROXY_PORT: i32 = 8443;

/// Name of the Service port in front of the proxy
pub const PROXY_PORT_NAME: &str = "cloud-shell-proxy";

/// Asks OpenShift to issue a serving certificate into the named secret
const SERVING_CERT_ANNOTATION: &str = "service.alpha.openshift.io/serving-cert-secret-name";

/// Build the ClusterIP Service selecting the session pod
pub fn build_service(id: &str, namespace: &str) -> Service {
    let name = child_name(id);
    let mut metadata = child_meta(name.clone(), id, namespace);
    metadata.annotations = Some(BTreeMap::from([(
        SERVING_CERT_ANNOTATION.to_string(),
        name,
    )]));

    Service {
        metadata,
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(session_labels(id)),
            ports: Some(vec![ServicePort {
                name: Some(PROXY_PORT_NAME.to_string()),
                port: PROXY_PORT,
                protocol: Some("TCP".to_string()),
                target_port: Some(IntOrString::Int(PROXY_PORT)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build the Route publishing the Service at `cloudshell-<id>.<base_domain>`.
///
/// TLS is re-encrypted to the proxy, plain HTTP is redirected.
pub fn build_route(id: &str, namespace: &str, base_domain: &str) -> Route {
    let name = child_name(id);
    let mut route = Route::new(
        &name,
        RouteSpec {
            host: Some(host_name(id, base_domain)),
            path: None,
            to: RouteTargetReference {
                kind: "Service".to_string(),
                name: name.clone(),
                weight: None,
            },
            tls: Some(TlsConfig {
                termination: TlsTermination::Reencrypt,
                insecure_edge_termination_policy: Some(InsecureEdgeTerminationPolicy::Redirect),
            }),
            wildcard_policy: None,
        },
    );
    route.metadata = child_meta(name, id, namespace);
    route
}
