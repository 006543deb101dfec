//! `ansible-vault` subcommands

use super::{require, CommandSpec, SpecBuilder, ANSIBLE_VAULT};
use crate::context::ExecutionContext;
use crate::error::{OrchestratorError, Result};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultAction {
    Encrypt,
    Decrypt,
    /// Plain text pass-through of the decrypted content
    View,
}

impl VaultAction {
    pub fn subcommand(self) -> &'static str {
        match self {
            VaultAction::Encrypt => "encrypt",
            VaultAction::Decrypt => "decrypt",
            VaultAction::View => "view",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultRequest {
    pub action: VaultAction,
    pub file: String,
    pub password_file: Option<PathBuf>,
    pub vault_id: Option<String>,
}

impl VaultRequest {
    pub fn new(action: VaultAction, file: impl Into<String>) -> Self {
        Self {
            action,
            file: file.into(),
            password_file: None,
            vault_id: None,
        }
    }
}

/// `ansible-vault <sub> <file> [--vault-password-file F | --vault-id ID]`
pub fn build(request: &VaultRequest, ctx: &ExecutionContext) -> Result<CommandSpec> {
    let file = require("file_path", &request.file)?;
    let vault_id = request.vault_id.as_deref().map(str::trim).filter(|v| !v.is_empty());

    if request.password_file.is_some() && vault_id.is_some() {
        return Err(OrchestratorError::validation(
            "vault password and vault id are mutually exclusive",
        ));
    }

    let password_file = request
        .password_file
        .as_ref()
        .map(|p| p.to_string_lossy().into_owned());

    Ok(SpecBuilder::new(ctx, ANSIBLE_VAULT)?
        .arg(request.action.subcommand())
        .arg(file)
        .option("--vault-password-file", password_file.as_deref())
        .option("--vault-id", vault_id)
        .build())
}
