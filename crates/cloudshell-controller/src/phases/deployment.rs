//! Deployment phase: converge the workload and gate on its availability

use tracing::{debug, info};

use cloudshell_common::Reason;

use super::{converge, Converge, PhaseOutcome, SessionContext};
use crate::controller::Context;
use crate::crd::CloudShellStatus;
use crate::resources::{build_deployment, deployment_available, ChildResource};
use crate::Error;

/// Converge the session Deployment.
///
/// Reports `Continue` only once the live Deployment is `Available`. Until
/// then the pass waits for the owned-Deployment watch instead of polling, and
/// a session previously reported ready is flipped back to not ready.
pub async fn handle_deployment(
    sctx: &SessionContext<'_>,
    ctx: &Context,
) -> Result<PhaseOutcome, Error> {
    let desired = ChildResource::Deployment(Box::new(build_deployment(
        &sctx.session.spec,
        sctx.id()?,
        &sctx.namespace,
        &ctx.config.workload,
    )));

    let live = match converge(sctx, ctx, desired).await? {
        Converge::Current(live) => live,
        Converge::Pending => return Ok(PhaseOutcome::Requeue),
    };

    let available = match &live {
        ChildResource::Deployment(d) => deployment_available(d),
        _ => false,
    };
    if available {
        return Ok(PhaseOutcome::Continue);
    }

    debug!("deployment not yet available");
    if sctx.session.is_ready() {
        let status = CloudShellStatus {
            ready: false,
            ..sctx.session.status.clone().unwrap_or_default()
        };
        ctx.store
            .patch_status(&sctx.name, &sctx.namespace, &status)
            .await?;
        info!("session lost availability");
        ctx.events
            .publish(
                &sctx.object_ref(),
                Reason::SessionNotReady,
                "Session deployment is not available".to_string(),
            )
            .await;
    }
    Ok(PhaseOutcome::Wait)
}
