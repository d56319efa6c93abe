//! Phase handlers for the CloudShell controller.
//!
//! A reconciliation pass walks [`Phase::ORDER`] and stops at the first phase
//! that does not report [`PhaseOutcome::Continue`]. Each phase converges one
//! group of child resources and is safe to re-run at any point: partially
//! applied passes self-heal on the next invocation.

mod deployment;
mod identity;
mod network;
mod prerequisites;
mod service_account;

pub use deployment::handle_deployment;
pub use identity::handle_identity;
pub use network::handle_network;
pub use prerequisites::handle_prerequisites;
pub use service_account::handle_service_account;

use std::fmt;

use k8s_openapi::api::core::v1::ObjectReference;
use kube::{Resource, ResourceExt};
use tracing::{debug, info};

use cloudshell_common::Reason;
use cloudshell_common::kube_utils::is_owned_by;

use crate::controller::Context;
use crate::crd::CloudShell;
use crate::diff;
use crate::resources::ChildResource;
use crate::Error;

/// One step of the convergence state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Derive and persist the session identifier
    Identity,
    /// Exec Role and the two RoleBindings
    Prerequisites,
    /// ServiceAccount the proxy runs as
    ServiceAccount,
    /// Service and Route
    Network,
    /// Session workload and its availability
    Deployment,
}

impl Phase {
    /// Execution order within one pass
    pub const ORDER: [Phase; 5] = [
        Phase::Identity,
        Phase::Prerequisites,
        Phase::ServiceAccount,
        Phase::Network,
        Phase::Deployment,
    ];

    /// Phase name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Identity => "Identity",
            Phase::Prerequisites => "Prerequisites",
            Phase::ServiceAccount => "ServiceAccount",
            Phase::Network => "Network",
            Phase::Deployment => "Deployment",
        }
    }

    /// Run this phase for one session
    pub async fn run(
        self,
        sctx: &SessionContext<'_>,
        ctx: &Context,
    ) -> Result<PhaseOutcome, Error> {
        match self {
            Phase::Identity => handle_identity(sctx, ctx).await,
            Phase::Prerequisites => handle_prerequisites(sctx, ctx).await,
            Phase::ServiceAccount => handle_service_account(sctx, ctx).await,
            Phase::Network => handle_network(sctx, ctx).await,
            Phase::Deployment => handle_deployment(sctx, ctx).await,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of running one phase
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// Resources of this phase are converged; run the next phase
    Continue,
    /// Something was written; stop and re-run the pass shortly
    Requeue,
    /// Converged but not ready; stop and wait for a watch event
    Wait,
}

/// Per-pass view of the session being reconciled
pub struct SessionContext<'a> {
    /// The session as delivered by the runtime
    pub session: &'a CloudShell,
    /// Session name
    pub name: String,
    /// Session namespace, also the namespace of every child
    pub namespace: String,
}

impl<'a> SessionContext<'a> {
    /// Build the context, rejecting sessions without a namespace
    pub fn new(session: &'a CloudShell) -> Result<Self, Error> {
        let name = session.name_any();
        let namespace = session
            .namespace()
            .ok_or_else(|| Error::validation_for(&name, "session has no namespace"))?;
        Ok(Self {
            session,
            name,
            namespace,
        })
    }

    /// The persisted session identifier
    pub fn id(&self) -> Result<&str, Error> {
        self.session
            .session_id()
            .ok_or_else(|| Error::validation_for(&self.name, "session identity not yet assigned"))
    }

    /// Reference used as the subject of published events
    pub fn object_ref(&self) -> ObjectReference {
        self.session.object_ref(&())
    }
}

/// State of a single child after one convergence attempt
pub(crate) enum Converge {
    /// Live object matches the desired state
    Current(ChildResource),
    /// Created or patched (or raced with another writer); verify next pass
    Pending,
}

/// Create-or-patch one child towards `desired`.
///
/// A live object missing the owner reference to this session counts as
/// drifted, since the differ does not compare owner references.
///
/// Never reports convergence for an object it just wrote: creates and patches
/// return [`Converge::Pending`] and are re-verified on the next pass.
pub(crate) async fn converge(
    sctx: &SessionContext<'_>,
    ctx: &Context,
    mut desired: ChildResource,
) -> Result<Converge, Error> {
    desired.set_owner(sctx.session)?;
    let kind = desired.kind();
    let name = desired.name();

    let Some(live) = ctx.store.fetch(kind, &sctx.namespace, &name).await? else {
        create_child(sctx, ctx, &desired).await?;
        return Ok(Converge::Pending);
    };

    let owned = sctx
        .session
        .uid()
        .is_some_and(|uid| is_owned_by(live.meta(), &uid));
    if owned && diff::equivalent(&desired, &live)? {
        debug!(kind = %kind, name = %name, "child up to date");
        return Ok(Converge::Current(live));
    }

    match ctx.store.patch(&desired, &live).await {
        Ok(()) => {
            info!(kind = %kind, name = %name, "patched drifted child");
            ctx.events
                .publish(
                    &sctx.object_ref(),
                    Reason::ChildPatched,
                    format!("Patched {} {}", kind, name),
                )
                .await;
        }
        Err(e) if e.is_benign() => {
            debug!(kind = %kind, name = %name, error = %e, "patch raced with another writer");
        }
        Err(e) => return Err(e),
    }
    Ok(Converge::Pending)
}

/// Create `desired`, treating an existing object as success
pub(crate) async fn create_child(
    sctx: &SessionContext<'_>,
    ctx: &Context,
    desired: &ChildResource,
) -> Result<(), Error> {
    let (kind, name) = (desired.kind(), desired.name());
    match ctx.store.create(desired).await {
        Ok(()) => {
            info!(kind = %kind, name = %name, "created child");
            ctx.events
                .publish(
                    &sctx.object_ref(),
                    Reason::ChildCreated,
                    format!("Created {} {}", kind, name),
                )
                .await;
            Ok(())
        }
        Err(e @ Error::AlreadyExists { .. }) => {
            debug!(kind = %kind, name = %name, error = %e, "child already exists");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Map a single-child convergence result to a phase outcome
pub(crate) fn outcome(state: &Converge) -> PhaseOutcome {
    match state {
        Converge::Current(_) => PhaseOutcome::Continue,
        Converge::Pending => PhaseOutcome::Requeue,
    }
}
