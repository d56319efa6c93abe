//! ServiceAccount the session's oauth proxy authenticates as

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ServiceAccount;

use super::child_meta;
use crate::identity::child_name;

/// Annotation key prefix OpenShift reads OAuth redirect references from
const OAUTH_REDIRECT_ANNOTATION: &str = "serviceaccounts.openshift.io/oauth-redirectreference";

/// Build the session ServiceAccount.
///
/// Carries an OAuth redirect reference to the session Route, which lets the
/// proxy use the account as an OAuth client.
pub fn build_service_account(id: &str, namespace: &str) -> ServiceAccount {
    let name = child_name(id);
    let redirect = format!(
        r#"{{"kind":"OAuthRedirectReference","apiVersion":"v1","reference":{{"kind":"Route","name":"{}"}}}}"#,
        name
    );

    let mut metadata = child_meta(name, id, namespace);
    metadata.annotations = Some(BTreeMap::from([(
        format!("{}.{}", OAUTH_REDIRECT_ANNOTATION, id),
        redirect,
    )]));

    ServiceAccount {
        metadata,
        automount_service_account_token: Some(true),
        ..Default::default()
    }
}
