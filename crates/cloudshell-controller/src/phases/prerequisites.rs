//! Prerequisites phase: exec Role and RoleBindings
//!
//! These objects are created when absent and otherwise left alone. Each one
//! is handled independently so a partially applied earlier pass completes.

use tracing::debug;

use super::{create_child, PhaseOutcome, SessionContext};
use crate::controller::Context;
use crate::resources::{
    build_exec_role, build_exec_role_binding, build_view_role_binding, ChildResource,
};
use crate::Error;

/// Ensure the exec Role and both RoleBindings exist
pub async fn handle_prerequisites(
    sctx: &SessionContext<'_>,
    ctx: &Context,
) -> Result<PhaseOutcome, Error> {
    let id = sctx.id()?;
    let ns = sctx.namespace.as_str();

    let children = [
        ChildResource::Role(build_exec_role(id, ns)),
        ChildResource::RoleBinding(build_exec_role_binding(id, ns)),
        ChildResource::RoleBinding(build_view_role_binding(id, ns)),
    ];

    for mut desired in children {
        desired.set_owner(sctx.session)?;
        let (kind, name) = (desired.kind(), desired.name());
        if ctx.store.fetch(kind, ns, &name).await?.is_some() {
            debug!(kind = %kind, name = %name, "prerequisite present");
            continue;
        }
        create_child(sctx, ctx, &desired).await?;
    }

    Ok(PhaseOutcome::Continue)
}
