//! Command building for the Ansible CLI family
//!
//! Every logical operation is a pure function from typed parameters plus an
//! `ExecutionContext` to an immutable `CommandSpec`. Nothing here spawns a
//! process, so the whole grammar is testable without the engine installed.
//!
//! Uniform rules:
//! - inventory always passed with `-i`
//! - roles / collections search paths and the engine config always set
//!   explicitly on the `CommandSpec` environment
//! - boolean flags only emitted when true
//! - machine-parsed operations ask the engine for JSON output

pub mod adhoc;
pub mod galaxy;
pub mod inventory;
pub mod playbook;
pub mod vault;

use crate::config::EnvMap;
use crate::context::ExecutionContext;
use crate::error::{OrchestratorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ANSIBLE: &str = "ansible";
pub const ANSIBLE_PLAYBOOK: &str = "ansible-playbook";
pub const ANSIBLE_VAULT: &str = "ansible-vault";
pub const ANSIBLE_GALAXY: &str = "ansible-galaxy";
pub const ANSIBLE_INVENTORY: &str = "ansible-inventory";

pub const MAX_VERBOSITY: u8 = 4;

/// Loosely-typed variable payload, kept deterministic by ordered maps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VarValue {
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<VarValue>),
    Map(BTreeMap<String, VarValue>),
}

pub type VarMap = BTreeMap<String, VarValue>;

impl VarValue {
    pub fn is_scalar(&self) -> bool {
        !matches!(self, VarValue::List(_) | VarValue::Map(_))
    }

    /// Plain text rendering for scalars, JSON for containers
    pub fn render(&self) -> String {
        match self {
            VarValue::Bool(b) => b.to_string(),
            VarValue::Number(n) => n.to_string(),
            VarValue::String(s) => s.clone(),
            other => serde_json::to_string(other).unwrap_or_default(),
        }
    }
}

impl From<&str> for VarValue {
    fn from(value: &str) -> Self {
        VarValue::String(value.to_string())
    }
}

impl From<bool> for VarValue {
    fn from(value: bool) -> Self {
        VarValue::Bool(value)
    }
}

impl From<i64> for VarValue {
    fn from(value: i64) -> Self {
        VarValue::Number(value.into())
    }
}

/// Immutable description of one external invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub environment: EnvMap,
    pub timeout: Duration,
    pub working_directory: PathBuf,
}

impl CommandSpec {
    /// Program followed by its arguments
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Short form for logs, never includes the environment
    pub fn display(&self) -> String {
        shell_words::join(self.argv())
    }
}

/// Accumulates arguments in order; shared by every operation builder
pub(crate) struct SpecBuilder {
    program: String,
    args: Vec<String>,
    environment: EnvMap,
    timeout: Duration,
    working_directory: PathBuf,
}

impl SpecBuilder {
    pub(crate) fn new(ctx: &ExecutionContext, binary: &str) -> Result<Self> {
        let mut environment = ctx.environment.clone();

        if !ctx.roles_path.is_empty() {
            environment.insert("ANSIBLE_ROLES_PATH".into(), join_path_list(&ctx.roles_path)?);
        }
        if !ctx.collections_paths.is_empty() {
            environment.insert(
                "ANSIBLE_COLLECTIONS_PATH".into(),
                join_path_list(&ctx.collections_paths)?,
            );
        }
        if let Some(config) = &ctx.engine_config {
            environment.insert("ANSIBLE_CONFIG".into(), config.to_string_lossy().into_owned());
        }

        Ok(Self {
            program: ctx.engine.program(binary),
            args: Vec::new(),
            environment,
            timeout: ctx.engine.default_timeout,
            working_directory: ctx.root.clone(),
        })
    }

    pub(crate) fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub(crate) fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    pub(crate) fn flag(self, enabled: bool, flag: &str) -> Self {
        if enabled {
            self.arg(flag)
        } else {
            self
        }
    }

    pub(crate) fn option(self, name: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.arg(name).arg(value),
            None => self,
        }
    }

    pub(crate) fn inventory(self, ctx: &ExecutionContext) -> Self {
        self.arg("-i").path_arg(&ctx.inventory)
    }

    pub(crate) fn verbosity(self, level: u8) -> Self {
        let level = level.min(MAX_VERBOSITY);
        if level == 0 {
            self
        } else {
            self.arg(format!("-{}", "v".repeat(level as usize)))
        }
    }

    /// Ask the engine's stdout callback for a single JSON document
    pub(crate) fn json_output(self) -> Self {
        self.env("ANSIBLE_STDOUT_CALLBACK", "json")
            .env("ANSIBLE_LOAD_CALLBACK_PLUGINS", "1")
    }

    pub(crate) fn env(mut self, key: &str, value: &str) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub(crate) fn timeout(mut self, timeout: Option<Duration>) -> Self {
        if let Some(timeout) = timeout {
            self.timeout = timeout;
        }
        self
    }

    pub(crate) fn build(self) -> CommandSpec {
        CommandSpec {
            program: self.program,
            args: self.args,
            environment: self.environment,
            timeout: self.timeout,
            working_directory: self.working_directory,
        }
    }
}

/// Join with the platform path-list separator, caller order preserved
pub fn join_path_list(paths: &[PathBuf]) -> Result<String> {
    std::env::join_paths(paths)
        .map(|joined| joined.to_string_lossy().into_owned())
        .map_err(|e| OrchestratorError::validation(format!("invalid search path: {}", e)))
}

pub(crate) fn require<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(OrchestratorError::validation(format!("`{}` is required", field)))
    } else {
        Ok(trimmed)
    }
}

/// Split comma lists, trim, drop blanks and duplicates, keep first-seen order
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags.iter().flat_map(|t| t.split(',')) {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::config::EngineSettings;

    pub(crate) fn context() -> ExecutionContext {
        ExecutionContext {
            project: Some("web".into()),
            root: PathBuf::from("/srv/web"),
            inventory: PathBuf::from("/srv/web/inventory"),
            roles_path: vec![PathBuf::from("roles"), PathBuf::from("/usr/share/ansible/roles")],
            collections_paths: Vec::new(),
            engine_config: None,
            environment: EnvMap::new(),
            engine: EngineSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::context;
    use super::*;

    #[test]
    fn test_roles_path_joined_in_order() {
        let spec = SpecBuilder::new(&context(), ANSIBLE).unwrap().build();
        assert_eq!(
            spec.environment.get("ANSIBLE_ROLES_PATH").map(String::as_str),
            Some("roles:/usr/share/ansible/roles")
        );
        assert!(!spec.environment.contains_key("ANSIBLE_COLLECTIONS_PATH"));
        assert_eq!(spec.working_directory, PathBuf::from("/srv/web"));
    }

    #[test]
    fn test_separator_in_path_rejected() {
        let err = join_path_list(&[PathBuf::from("a:b")]).unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn test_verbosity_clamped() {
        let spec = SpecBuilder::new(&context(), ANSIBLE).unwrap().verbosity(9).build();
        assert_eq!(spec.args, vec!["-vvvv".to_string()]);
        let spec = SpecBuilder::new(&context(), ANSIBLE).unwrap().verbosity(0).build();
        assert!(spec.args.is_empty());
    }

    #[test]
    fn test_normalize_tags() {
        let tags = vec!["web, db".to_string(), "db".to_string(), " ".to_string()];
        assert_eq!(normalize_tags(&tags), vec!["web".to_string(), "db".to_string()]);
    }

    #[test]
    fn test_var_value_render() {
        assert_eq!(VarValue::from(true).render(), "true");
        assert_eq!(VarValue::from(8080_i64).render(), "8080");
        let list = VarValue::List(vec!["a".into(), 1_i64.into()]);
        assert_eq!(list.render(), r#"["a",1]"#);
        assert!(!list.is_scalar());
    }

    #[test]
    fn test_var_value_deserialize() {
        let value: VarValue = serde_json::from_str(r#"{"b": [1, true], "a": "x"}"#).unwrap();
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"{"a":"x","b":[1,true]}"#);
    }
}
