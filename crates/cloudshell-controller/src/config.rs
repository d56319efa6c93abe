//! Controller configuration
//!
//! Everything here is immutable for the lifetime of the operator process and
//! shared read-only across concurrent reconciliations.

use std::time::Duration;

/// Default base domain for session routes
pub const DEFAULT_BASE_DOMAIN: &str = "192.168.42.191.nip.io";

/// Default image of the command execution sidecar
pub const DEFAULT_MACHINE_EXEC_IMAGE: &str = "quay.io/eclipse/che-machine-exec:nightly";

/// Default image of the authenticating reverse proxy sidecar
pub const DEFAULT_OAUTH_PROXY_IMAGE: &str = "openshift/oauth-proxy:latest";

/// Default memory request and limit applied to every session container
pub const DEFAULT_CONTAINER_MEMORY: &str = "128Mi";

/// Settings for the reconciler
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Domain appended to `cloudshell-<id>` to form the external host name
    pub base_domain: String,
    /// Images and sizing of the session workload
    pub workload: WorkloadConfig,
    /// Delay before re-running a pass that created or patched something
    pub requeue_interval: Duration,
    /// Delay before retrying a pass that failed with a retryable error
    pub error_requeue_interval: Duration,
    /// Periodic re-check of a converged session, to catch drift on unwatched children
    pub resync_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            base_domain: DEFAULT_BASE_DOMAIN.to_string(),
            workload: WorkloadConfig::default(),
            requeue_interval: Duration::from_secs(2),
            error_requeue_interval: Duration::from_secs(30),
            resync_interval: Duration::from_secs(300),
        }
    }
}

/// Images and resource sizing of the session Deployment
#[derive(Clone, Debug)]
pub struct WorkloadConfig {
    /// Command execution sidecar image
    pub machine_exec_image: String,
    /// Authenticating reverse proxy image
    pub oauth_proxy_image: String,
    /// Memory request and limit for each container
    pub container_memory: String,
    /// Secret the proxy uses to sign session cookies
    pub cookie_secret: String,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            machine_exec_image: DEFAULT_MACHINE_EXEC_IMAGE.to_string(),
            oauth_proxy_image: DEFAULT_OAUTH_PROXY_IMAGE.to_string(),
            container_memory: DEFAULT_CONTAINER_MEMORY.to_string(),
            cookie_secret: String::new(),
        }
    }
}
