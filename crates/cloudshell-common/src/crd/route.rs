//! OpenShift Route (`route.openshift.io/v1`)
//!
//! Only the fields the operator writes or inspects are modeled. Unknown fields
//! returned by the API server are dropped on deserialization, which is fine
//! because writes use merge patches built from the desired value alone.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Route exposes a Service on an external host name through the cluster router
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "route.openshift.io",
    version = "v1",
    kind = "Route",
    namespaced,
    status = "RouteStatus",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    /// External host name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Path prefix routed to the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Backend the route points at
    pub to: RouteTargetReference,

    /// TLS configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,

    /// Wildcard policy, defaulted by the router to `None`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wildcard_policy: Option<String>,
}

/// Backend reference of a Route
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteTargetReference {
    /// Target kind, always `Service`
    pub kind: String,
    /// Target name
    pub name: String,
    /// Traffic weight, defaulted by the API server to 100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
}

/// How the router handles TLS for a Route
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    /// Where TLS is terminated
    pub termination: TlsTermination,

    /// What to do with plain HTTP requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure_edge_termination_policy: Option<InsecureEdgeTerminationPolicy>,
}

/// TLS termination mode
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TlsTermination {
    /// Terminated at the router, forwarded in plaintext
    Edge,
    /// Passed through to the backend untouched
    Passthrough,
    /// Terminated at the router and re-encrypted to the backend
    #[default]
    Reencrypt,
}

/// Handling of insecure (non-TLS) requests
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum InsecureEdgeTerminationPolicy {
    /// Reject
    #[default]
    None,
    /// Serve over plain HTTP
    Allow,
    /// Redirect to HTTPS
    Redirect,
}

/// Route status as reported by the routers that admitted it
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteStatus {
    /// One entry per router
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingress: Vec<RouteIngress>,
}

/// Admission state of a Route on one router
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteIngress {
    /// Host the router serves the route on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Router name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tls_serializes_with_openshift_spelling() {
        let tls = TlsConfig {
            termination: TlsTermination::Reencrypt,
            insecure_edge_termination_policy: Some(InsecureEdgeTerminationPolicy::Redirect),
        };
        let json = serde_json::to_value(&tls).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "termination": "reencrypt",
                "insecureEdgeTerminationPolicy": "Redirect"
            })
        );
    }

    #[test]
    fn live_route_with_server_fields_deserializes() {
        let live = serde_json::json!({
            "apiVersion": "route.openshift.io/v1",
            "kind": "Route",
            "metadata": {"name": "cloudshell-abc", "namespace": "dev", "resourceVersion": "7"},
            "spec": {
                "host": "cloudshell-abc.example.com",
                "to": {"kind": "Service", "name": "cloudshell-abc", "weight": 100},
                "wildcardPolicy": "None",
                "alternateBackends": []
            },
            "status": {"ingress": [{"host": "cloudshell-abc.example.com", "routerName": "default"}]}
        });
        let route: Route = serde_json::from_value(live).expect("deserialize");
        assert_eq!(route.spec.to.weight, Some(100));
        assert_eq!(route.spec.wildcard_policy.as_deref(), Some("None"));
        assert_eq!(route.status.expect("status").ingress.len(), 1);
    }

    #[test]
    fn routes_compare_by_value() {
        let spec = RouteSpec {
            host: Some("cloudshell-abc.example.com".to_string()),
            to: RouteTargetReference {
                kind: "Service".to_string(),
                name: "cloudshell-abc".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let a = Route::new("cloudshell-abc", spec.clone());
        let mut b = Route::new("cloudshell-abc", spec);
        assert_eq!(a, b);

        b.spec.host = Some("other.example.com".to_string());
        assert_ne!(a, b);
    }
}
