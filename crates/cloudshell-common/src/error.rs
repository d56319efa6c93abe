//! Error types for the CloudShell operator
//!
//! Errors carry the kind, namespace and name of the object being worked on so
//! log lines and Kubernetes events point at the exact resource. Store errors
//! are classified once, at the client boundary, into the benign races the
//! reconciler expects (`NotFound`, `AlreadyExists`, `Conflict`) and genuine
//! infrastructure faults (`Store`).

use thiserror::Error;

/// Main error type for CloudShell operations
#[derive(Debug, Error)]
pub enum Error {
    /// The session's creation UID could not be parsed as a UUID
    #[error("malformed identifier {uid:?}: {message}")]
    MalformedIdentifier {
        /// The rejected input
        uid: String,
        /// Parser diagnostic
        message: String,
    },

    /// The object does not exist in the store
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Resource kind
        kind: String,
        /// Resource namespace
        namespace: String,
        /// Resource name
        name: String,
    },

    /// Create raced with an earlier create of the same object
    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        /// Resource kind
        kind: String,
        /// Resource namespace
        namespace: String,
        /// Resource name
        name: String,
    },

    /// Optimistic write lost against a concurrent modification
    #[error("conflict writing {kind} {namespace}/{name}: {message}")]
    Conflict {
        /// Resource kind
        kind: String,
        /// Resource namespace
        namespace: String,
        /// Resource name
        name: String,
        /// Message returned by the API server
        message: String,
    },

    /// Transient store or transport failure
    #[error("store error on {kind} {namespace}/{name}: {source}")]
    Store {
        /// Resource kind
        kind: String,
        /// Resource namespace
        namespace: String,
        /// Resource name
        name: String,
        /// The underlying kube-rs error
        #[source]
        source: kube::Error,
    },

    /// Owner reference could not be stamped on a child
    #[error("owner reference error for {kind} {name}: {message}")]
    Reference {
        /// Kind of the child being stamped
        kind: String,
        /// Name of the child being stamped
        name: String,
        /// Description of what is missing
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// The session itself is unusable as given
    #[error("validation error for {session}: {message}")]
    Validation {
        /// Name of the offending session
        session: String,
        /// Description of what's invalid
        message: String,
    },
}

impl Error {
    /// Classify a kube-rs error for the object identified by `kind/namespace/name`.
    ///
    /// 404 becomes `NotFound`. 409 becomes `AlreadyExists` or `Conflict`
    /// depending on the reason the API server reports. Everything else,
    /// including transport failures and timeouts, is a `Store` error.
    pub fn from_kube(
        source: kube::Error,
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let (kind, namespace, name) = (kind.into(), namespace.into(), name.into());
        match &source {
            kube::Error::Api(ae) if ae.code == 404 => Self::NotFound {
                kind,
                namespace,
                name,
            },
            kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
                Self::AlreadyExists {
                    kind,
                    namespace,
                    name,
                }
            }
            kube::Error::Api(ae) if ae.code == 409 => Self::Conflict {
                kind,
                namespace,
                name,
                message: ae.message.clone(),
            },
            _ => Self::Store {
                kind,
                namespace,
                name,
                source,
            },
        }
    }

    /// Create a malformed identifier error
    pub fn malformed_identifier(uid: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::MalformedIdentifier {
            uid: uid.into(),
            message: msg.into(),
        }
    }

    /// Create an owner reference error for a child object
    pub fn reference(kind: impl Into<String>, name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Reference {
            kind: kind.into(),
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create a validation error for a session
    pub fn validation_for(session: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            session: session.into(),
            message: msg.into(),
        }
    }

    /// Races the reconciler resolves by requeueing rather than failing
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. } | Error::AlreadyExists { .. } | Error::Conflict { .. }
        )
    }

    /// Check if this error is retryable
    ///
    /// Malformed identifiers, validation and serialization errors need an
    /// upstream fix; retrying with the same input cannot succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::MalformedIdentifier { .. } => false,
            Error::Validation { .. } => false,
            Error::Serialization { .. } => false,
            Error::NotFound { .. } => true,
            Error::AlreadyExists { .. } => true,
            Error::Conflict { .. } => true,
            Error::Store { .. } => true,
            Error::Reference { .. } => true,
        }
    }

    /// Kind of the resource this error is about, if known
    pub fn kind(&self) -> Option<&str> {
        match self {
            Error::NotFound { kind, .. }
            | Error::AlreadyExists { kind, .. }
            | Error::Conflict { kind, .. }
            | Error::Store { kind, .. }
            | Error::Reference { kind, .. } => Some(kind),
            Error::Serialization { kind, .. } => kind.as_deref(),
            Error::MalformedIdentifier { .. } | Error::Validation { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: format!("{} from api server", reason),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn not_found_is_classified_from_404() {
        let err = Error::from_kube(api_error(404, "NotFound"), "Service", "dev", "cloudshell-abc");
        assert!(matches!(err, Error::NotFound { .. }));
        assert!(err.is_benign());
        assert_eq!(err.to_string(), "Service dev/cloudshell-abc not found");
    }

    #[test]
    fn already_exists_and_conflict_are_split_by_reason() {
        let err = Error::from_kube(api_error(409, "AlreadyExists"), "Route", "dev", "r");
        assert!(matches!(err, Error::AlreadyExists { .. }));

        let err = Error::from_kube(api_error(409, "Conflict"), "Route", "dev", "r");
        match &err {
            Error::Conflict { message, .. } => assert!(message.contains("Conflict")),
            other => panic!("expected Conflict, got {:?}", other),
        }
        assert!(err.is_benign());
    }

    #[test]
    fn server_errors_are_store_errors() {
        let err = Error::from_kube(api_error(504, "Timeout"), "Deployment", "dev", "d");
        assert!(matches!(err, Error::Store { .. }));
        assert!(!err.is_benign());
        assert!(err.is_retryable());
        assert_eq!(err.kind(), Some("Deployment"));
    }

    #[test]
    fn permanent_errors_are_not_retryable() {
        assert!(!Error::malformed_identifier("nope", "invalid length").is_retryable());
        assert!(!Error::validation_for("shell", "missing namespace").is_retryable());
        assert!(!Error::serialization_for_kind("Route", "bad json").is_retryable());
        assert!(Error::reference("ServiceAccount", "cloudshell-x", "owner has no uid").is_retryable());
    }

    #[test]
    fn malformed_identifier_message_names_input() {
        let err = Error::malformed_identifier("not-a-uuid", "invalid character");
        assert!(err.to_string().contains("\"not-a-uuid\""));
        assert_eq!(err.kind(), None);
    }
}
