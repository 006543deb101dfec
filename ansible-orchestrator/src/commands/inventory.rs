//! `ansible-inventory` queries

use super::{CommandSpec, SpecBuilder, ANSIBLE_INVENTORY};
use crate::context::ExecutionContext;
use crate::error::Result;

/// JSON dump with group variables kept on their groups (`--export`), so the
/// inventory interpreter can apply its own precedence
pub fn list(ctx: &ExecutionContext) -> Result<CommandSpec> {
    Ok(SpecBuilder::new(ctx, ANSIBLE_INVENTORY)?
        .inventory(ctx)
        .arg("--list")
        .arg("--export")
        .build())
}

/// Human-readable tree, optionally rooted at one group
pub fn graph(group: Option<&str>, ctx: &ExecutionContext) -> Result<CommandSpec> {
    let mut builder = SpecBuilder::new(ctx, ANSIBLE_INVENTORY)?
        .inventory(ctx)
        .arg("--graph");
    if let Some(group) = group.map(str::trim).filter(|g| !g.is_empty()) {
        builder = builder.arg(group);
    }
    Ok(builder.build())
}
