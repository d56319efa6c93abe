//! CloudShell CRD: one interactive shell session

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// CloudShell requests an interactive terminal session running `image`.
///
/// Example:
/// ```yaml
/// apiVersion: cloudshell.che.eclipse.org/v1alpha1
/// kind: CloudShell
/// metadata:
///   name: my-shell
///   namespace: dev
/// spec:
///   image: registry/example:latest
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "cloudshell.che.eclipse.org",
    version = "v1alpha1",
    kind = "CloudShell",
    plural = "cloudshells",
    shortname = "cs",
    namespaced,
    status = "CloudShellStatus",
    printcolumn = r#"{"name":"ID","type":"string","jsonPath":".status.id"}"#,
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"URL","type":"string","jsonPath":".status.url"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CloudShellSpec {
    /// Container image for the interactive shell
    pub image: String,
}

/// Observed state, written only by the operator
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CloudShellStatus {
    /// Short session identifier derived from the creation UID. Set once.
    #[serde(default)]
    pub id: String,

    /// Whether the session workload is available
    #[serde(default)]
    pub ready: bool,

    /// Externally reachable endpoint of the session
    #[serde(default)]
    pub url: String,
}

impl CloudShell {
    /// The persisted session identifier, if the identity phase has completed
    pub fn session_id(&self) -> Option<&str> {
        self.status
            .as_ref()
            .map(|s| s.id.as_str())
            .filter(|id| !id.is_empty())
    }

    /// Whether the status currently reports the session as ready
    pub fn is_ready(&self) -> bool {
        self.status.as_ref().map(|s| s.ready).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    #[test]
    fn session_id_ignores_empty_status() {
        let mut shell = CloudShell::new(
            "shell",
            CloudShellSpec {
                image: "registry/example:latest".to_string(),
            },
        );
        assert_eq!(shell.session_id(), None);

        shell.status = Some(CloudShellStatus::default());
        assert_eq!(shell.session_id(), None);
        assert!(!shell.is_ready());

        shell.status = Some(CloudShellStatus {
            id: "a1b2c3d4e5f647a8".to_string(),
            ready: true,
            url: String::new(),
        });
        assert_eq!(shell.session_id(), Some("a1b2c3d4e5f647a8"));
        assert!(shell.is_ready());
    }

    #[test]
    fn crd_has_status_subresource() {
        let crd = CloudShell::crd();
        assert_eq!(crd.spec.group, "cloudshell.che.eclipse.org");
        assert_eq!(crd.spec.names.kind, "CloudShell");
        let version = &crd.spec.versions[0];
        assert!(version
            .subresources
            .as_ref()
            .and_then(|s| s.status.as_ref())
            .is_some());
        serde_yaml::to_string(&crd).expect("crd should serialize");
    }

    #[test]
    fn status_deserializes_with_missing_fields() {
        let status: CloudShellStatus =
            serde_json::from_value(serde_json::json!({"id": "abc"})).expect("valid status");
        assert_eq!(status.id, "abc");
        assert!(!status.ready);
        assert!(status.url.is_empty());
    }
}
