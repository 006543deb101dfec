//! `ansible-playbook` invocations: full runs and syntax checks

use super::{normalize_tags, require, CommandSpec, SpecBuilder, VarMap, ANSIBLE_PLAYBOOK};
use crate::context::ExecutionContext;
use crate::error::{OrchestratorError, Result};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybookRun {
    pub playbook: String,
    pub extra_vars: VarMap,
    pub tags: Vec<String>,
    pub skip_tags: Vec<String>,
    pub limit: Option<String>,
    pub check: bool,
    pub diff: bool,
    pub verbosity: u8,
    pub timeout: Option<Duration>,
}

impl PlaybookRun {
    pub fn new(playbook: impl Into<String>) -> Self {
        Self {
            playbook: playbook.into(),
            ..Self::default()
        }
    }
}

/// `ansible-playbook <playbook> -i <inv> [-e json] [--tags] [--skip-tags] [--limit] [--check] [--diff] [-v…]`
pub fn run(params: &PlaybookRun, ctx: &ExecutionContext) -> Result<CommandSpec> {
    let playbook = require("playbook", &params.playbook)?;
    let tags = normalize_tags(&params.tags);
    let skip_tags = normalize_tags(&params.skip_tags);

    let overlap: Vec<&str> = tags
        .iter()
        .filter(|t| skip_tags.contains(t))
        .map(String::as_str)
        .collect();
    if !overlap.is_empty() {
        return Err(OrchestratorError::validation(format!(
            "tags listed in both tags and skip_tags: {}",
            overlap.join(", ")
        )));
    }

    let extra_vars = if params.extra_vars.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&params.extra_vars)?)
    };
    let limit = params.limit.as_deref().map(str::trim).filter(|l| !l.is_empty());

    let spec = SpecBuilder::new(ctx, ANSIBLE_PLAYBOOK)?
        .arg(playbook)
        .inventory(ctx)
        .option("-e", extra_vars.as_deref())
        .option("--tags", (!tags.is_empty()).then(|| tags.join(",")).as_deref())
        .option("--skip-tags", (!skip_tags.is_empty()).then(|| skip_tags.join(",")).as_deref())
        .option("--limit", limit)
        .flag(params.check, "--check")
        .flag(params.diff, "--diff")
        .verbosity(params.verbosity)
        .timeout(params.timeout)
        .build();

    Ok(spec)
}

/// `ansible-playbook <playbook> -i <inv> --syntax-check`, plain text output
pub fn syntax_check(playbook: &str, ctx: &ExecutionContext) -> Result<CommandSpec> {
    let playbook = require("playbook", playbook)?;

    Ok(SpecBuilder::new(ctx, ANSIBLE_PLAYBOOK)?
        .arg(playbook)
        .inventory(ctx)
        .arg("--syntax-check")
        .build())
}
