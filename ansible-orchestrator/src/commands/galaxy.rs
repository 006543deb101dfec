//! `ansible-galaxy` requirement installation

use super::{require, CommandSpec, SpecBuilder, ANSIBLE_GALAXY};
use crate::context::ExecutionContext;
use crate::error::Result;

pub const DEFAULT_REQUIREMENTS: &str = "requirements.yml";

/// `ansible-galaxy install -r <file> [--force]`; roles land in the first
/// entry of the context roles path through `ANSIBLE_ROLES_PATH`
pub fn install(requirements_file: Option<&str>, force: bool, ctx: &ExecutionContext) -> Result<CommandSpec> {
    let file = require("requirements_file", requirements_file.unwrap_or(DEFAULT_REQUIREMENTS))?;

    Ok(SpecBuilder::new(ctx, ANSIBLE_GALAXY)?
        .arg("install")
        .arg("-r")
        .arg(file)
        .flag(force, "--force")
        .build())
}
