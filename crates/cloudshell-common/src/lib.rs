//! Common types for the CloudShell operator: CRDs, errors, and utilities

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod events;
pub mod kube_utils;
pub mod telemetry;

pub use error::Error;
pub use events::{EventPublisher, KubeEventPublisher, NoopEventPublisher, Reason};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Field manager name used for every write the operator makes
pub const FIELD_MANAGER: &str = "cloudshell-operator";

/// Prefix shared by every child resource name and external host name
pub const RESOURCE_PREFIX: &str = "cloudshell";

/// Label key carrying the session identifier
pub const SESSION_ID_LABEL: &str = "cloudshell.id";

/// Label key carrying the session identifier for Che tooling
pub const WORKSPACE_ID_LABEL: &str = "che.workspace_id";
