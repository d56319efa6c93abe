//! Identity phase: derive the session identifier from the creation UID
//!
//! The identifier is written once. Sessions that already carry one skip this
//! phase, so every later child name stays stable for the session's lifetime.

use kube::ResourceExt;
use tracing::info;

use cloudshell_common::Reason;

use super::{PhaseOutcome, SessionContext};
use crate::controller::Context;
use crate::crd::CloudShellStatus;
use crate::identity::assign_identity;
use crate::Error;

/// Assign and persist `status.id` when it is not set yet.
///
/// Requeues after writing: the identifier is read back from the session on
/// the next pass rather than assumed.
pub async fn handle_identity(
    sctx: &SessionContext<'_>,
    ctx: &Context,
) -> Result<PhaseOutcome, Error> {
    if sctx.session.session_id().is_some() {
        return Ok(PhaseOutcome::Continue);
    }

    let uid = sctx
        .session
        .uid()
        .ok_or_else(|| Error::validation_for(&sctx.name, "session has no uid"))?;
    let id = match assign_identity(&uid) {
        Ok(id) => id,
        Err(e) => {
            ctx.events
                .publish(&sctx.object_ref(), Reason::ValidationFailed, e.to_string())
                .await;
            return Err(e);
        }
    };

    let status = CloudShellStatus {
        id: id.clone(),
        ..sctx.session.status.clone().unwrap_or_default()
    };
    ctx.store
        .patch_status(&sctx.name, &sctx.namespace, &status)
        .await?;

    info!(id = %id, "assigned session identity");
    ctx.events
        .publish(
            &sctx.object_ref(),
            Reason::IdentityAssigned,
            format!("Assigned session id {}", id),
        )
        .await;

    Ok(PhaseOutcome::Requeue)
}
