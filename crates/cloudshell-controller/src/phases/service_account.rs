//! ServiceAccount phase

use super::{converge, outcome, PhaseOutcome, SessionContext};
use crate::controller::Context;
use crate::resources::{build_service_account, ChildResource};
use crate::Error;

/// Converge the session ServiceAccount
pub async fn handle_service_account(
    sctx: &SessionContext<'_>,
    ctx: &Context,
) -> Result<PhaseOutcome, Error> {
    let desired = ChildResource::ServiceAccount(build_service_account(sctx.id()?, &sctx.namespace));
    let state = converge(sctx, ctx, desired).await?;
    Ok(outcome(&state))
}
