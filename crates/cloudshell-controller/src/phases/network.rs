//! Network phase: Service, then Route

use super::{converge, outcome, PhaseOutcome, SessionContext};
use crate::controller::Context;
use crate::resources::{build_route, build_service, ChildResource};
use crate::Error;

/// Converge the session Service and Route, in that order
pub async fn handle_network(
    sctx: &SessionContext<'_>,
    ctx: &Context,
) -> Result<PhaseOutcome, Error> {
    let id = sctx.id()?;

    let service = ChildResource::Service(build_service(id, &sctx.namespace));
    let state = converge(sctx, ctx, service).await?;
    if outcome(&state) != PhaseOutcome::Continue {
        return Ok(outcome(&state));
    }

    let route = ChildResource::Route(build_route(id, &sctx.namespace, &ctx.config.base_domain));
    let state = converge(sctx, ctx, route).await?;
    Ok(outcome(&state))
}
