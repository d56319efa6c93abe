//! CloudShell controller entrypoints
//!
//! `reconcile` runs one pass of the phase state machine for a session and
//! maps its outcome to a runtime [`Action`]. The session is marked ready only
//! when every phase reports `Continue` within the same pass.

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tracing::{debug, info, instrument, warn};

use cloudshell_common::Reason;
use cloudshell_common::{EventPublisher, KubeEventPublisher};

use crate::config::ControllerConfig;
use crate::crd::{CloudShell, CloudShellStatus};
use crate::identity::host_name;
use crate::phases::{Phase, PhaseOutcome, SessionContext};
use crate::store::{KubeSessionStore, SessionStore};
use crate::Error;

/// Name the controller reports events as
pub const CONTROLLER_NAME: &str = "cloudshell-controller";

/// Controller context shared by every reconciliation
///
/// Holds no per-session state; concurrent passes for different sessions only
/// share the store client, the event publisher and immutable configuration.
pub struct Context {
    /// Object store access
    pub store: Arc<dyn SessionStore>,
    /// Event publisher for emitting Kubernetes Events
    pub events: Arc<dyn EventPublisher>,
    /// Reconciler settings
    pub config: ControllerConfig,
}

impl Context {
    /// Create a new Context with the given dependencies
    pub fn new(
        store: Arc<dyn SessionStore>,
        events: Arc<dyn EventPublisher>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            store,
            events,
            config,
        }
    }

    /// Create a Context backed by a Kubernetes client
    pub fn from_client(client: Client, config: ControllerConfig) -> Self {
        let events = Arc::new(KubeEventPublisher::new(client.clone(), CONTROLLER_NAME));
        Self {
            store: Arc::new(KubeSessionStore::new(client)),
            events,
            config,
        }
    }

    /// Create a context for testing with a custom store
    #[cfg(test)]
    pub fn for_testing(store: Arc<dyn SessionStore>) -> Self {
        use cloudshell_common::NoopEventPublisher;
        Self {
            store,
            events: Arc::new(NoopEventPublisher),
            config: ControllerConfig::default(),
        }
    }
}

/// Reconcile a CloudShell session
#[instrument(
    skip(session, ctx),
    fields(session = %session.name_any(), namespace = %session.namespace().unwrap_or_default())
)]
pub async fn reconcile(session: Arc<CloudShell>, ctx: Arc<Context>) -> Result<Action, Error> {
    debug!("reconciling session");
    let sctx = SessionContext::new(&session)?;

    for phase in Phase::ORDER {
        match phase.run(&sctx, &ctx).await {
            Ok(PhaseOutcome::Continue) => {
                debug!(phase = %phase, "phase converged");
            }
            Ok(PhaseOutcome::Requeue) => {
                debug!(phase = %phase, "phase wrote changes, requeueing");
                return Ok(Action::requeue(ctx.config.requeue_interval));
            }
            Ok(PhaseOutcome::Wait) => {
                debug!(phase = %phase, "phase waiting for watch event");
                return Ok(Action::await_change());
            }
            Err(e) => {
                warn!(phase = %phase, error = %e, "phase failed");
                return Err(e);
            }
        }
    }

    mark_ready(&sctx, &ctx).await?;
    Ok(Action::requeue(ctx.config.resync_interval))
}

/// Write `ready=true` and the session URL, skipping the write when unchanged
async fn mark_ready(sctx: &SessionContext<'_>, ctx: &Context) -> Result<(), Error> {
    let id = sctx.id()?;
    let status = CloudShellStatus {
        id: id.to_string(),
        ready: true,
        url: host_name(id, &ctx.config.base_domain),
    };
    if sctx.session.status.as_ref() == Some(&status) {
        return Ok(());
    }

    ctx.store
        .patch_status(&sctx.name, &sctx.namespace, &status)
        .await?;
    info!(url = %status.url, "session ready");
    ctx.events
        .publish(
            &sctx.object_ref(),
            Reason::SessionReady,
            format!("Session available at {}", status.url),
        )
        .await;
    Ok(())
}

/// Error policy for the controller
///
/// Retryable errors are requeued after the configured error interval; the
/// runtime's own backoff applies on top. Permanent errors wait for the session
/// to change.
pub fn error_policy(session: Arc<CloudShell>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!(
        ?error,
        session = %session.name_any(),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );

    if error.is_retryable() {
        Action::requeue(ctx.config.error_requeue_interval)
    } else {
        Action::await_change()
    }
}
