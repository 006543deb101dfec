//! Ad-hoc `ansible` invocations: single module against a host pattern
//!
//! All ad-hoc output is requested through the JSON stdout callback so the
//! per-host results can be read back by `interpreters::facts`.

use super::{require, CommandSpec, SpecBuilder, VarMap, ANSIBLE};
use crate::context::ExecutionContext;
use crate::error::{OrchestratorError, Result};
use serde::Deserialize;
use std::time::Duration;

pub const SERVICE_STATES: &[&str] = &["started", "stopped", "restarted", "reloaded"];

/// Module arguments, either verbatim or structured
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ModuleArgs {
    Raw(String),
    Structured(VarMap),
}

impl ModuleArgs {
    /// `key=value` pairs when every value is a scalar, one JSON object otherwise
    pub fn render(&self) -> Result<Option<String>> {
        match self {
            ModuleArgs::Raw(raw) if raw.trim().is_empty() => Ok(None),
            ModuleArgs::Raw(raw) => Ok(Some(raw.clone())),
            ModuleArgs::Structured(map) if map.is_empty() => Ok(None),
            ModuleArgs::Structured(map) if map.values().all(|v| v.is_scalar()) => {
                let pairs: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, shell_words::quote(&v.render())))
                    .collect();
                Ok(Some(pairs.join(" ")))
            }
            ModuleArgs::Structured(map) => Ok(Some(serde_json::to_string(map)?)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdHocTask {
    pub pattern: String,
    pub module: String,
    pub args: Option<ModuleArgs>,
    /// Privilege escalation (`--become`)
    pub escalate: bool,
    pub check: bool,
    pub verbosity: u8,
    pub timeout: Option<Duration>,
}

impl AdHocTask {
    pub fn new(pattern: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            module: module.into(),
            args: None,
            escalate: false,
            check: false,
            verbosity: 0,
            timeout: None,
        }
    }

    pub fn with_args(mut self, args: ModuleArgs) -> Self {
        self.args = Some(args);
        self
    }
}

/// `ansible <pattern> -i <inv> -m <module> [-a args] [--become] [--check] [-v…]`
pub fn run(task: &AdHocTask, ctx: &ExecutionContext) -> Result<CommandSpec> {
    let pattern = require("hosts", &task.pattern)?;
    let module = require("module", &task.module)?;
    let args = match &task.args {
        Some(args) => args.render()?,
        None => None,
    };

    Ok(SpecBuilder::new(ctx, ANSIBLE)?
        .arg(pattern)
        .inventory(ctx)
        .arg("-m")
        .arg(module)
        .option("-a", args.as_deref())
        .flag(task.escalate, "--become")
        .flag(task.check, "--check")
        .verbosity(task.verbosity)
        .json_output()
        .timeout(task.timeout)
        .build())
}

pub fn ping(pattern: &str, ctx: &ExecutionContext) -> Result<CommandSpec> {
    run(&AdHocTask::new(pattern, "ping"), ctx)
}

/// `setup` module, optionally narrowed with the module's own `filter=`
pub fn gather_facts(pattern: &str, filter: Option<&str>, ctx: &ExecutionContext) -> Result<CommandSpec> {
    let mut task = AdHocTask::new(pattern, "setup");
    if let Some(filter) = filter.map(str::trim).filter(|f| !f.is_empty()) {
        let mut args = VarMap::new();
        args.insert("filter".into(), filter.into());
        task = task.with_args(ModuleArgs::Structured(args));
    }
    run(&task, ctx)
}

/// `systemd name=<service> state=<state>` with privilege escalation
pub fn manage_service(pattern: &str, service: &str, state: &str, ctx: &ExecutionContext) -> Result<CommandSpec> {
    let service = require("service", service)?;
    let state = state.trim();
    if !SERVICE_STATES.contains(&state) {
        return Err(OrchestratorError::validation(format!(
            "invalid service state '{}', expected one of: {}",
            state,
            SERVICE_STATES.join(", ")
        )));
    }

    let mut args = VarMap::new();
    args.insert("name".into(), service.into());
    args.insert("state".into(), state.into());

    let mut task = AdHocTask::new(pattern, "systemd").with_args(ModuleArgs::Structured(args));
    task.escalate = true;
    run(&task, ctx)
}

/// Last `lines` lines of a remote file through the `command` module
pub fn tail_log(pattern: &str, path: &str, lines: u32, ctx: &ExecutionContext) -> Result<CommandSpec> {
    let path = require("path", path)?;
    if lines == 0 {
        return Err(OrchestratorError::validation("`lines` must be greater than zero"));
    }

    let command = format!("tail -n {} {}", lines, shell_words::quote(path));
    run(&AdHocTask::new(pattern, "command").with_args(ModuleArgs::Raw(command)), ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::context;
    use crate::commands::VarValue;

    fn args(spec: &CommandSpec) -> Vec<&str> {
        spec.args.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_ping_requests_json() {
        let spec = ping("all", &context()).unwrap();
        assert_eq!(spec.program, "ansible");
        assert_eq!(args(&spec), vec!["all", "-i", "/srv/web/inventory", "-m", "ping"]);
        assert_eq!(spec.environment.get("ANSIBLE_STDOUT_CALLBACK").map(String::as_str), Some("json"));
        assert_eq!(spec.environment.get("ANSIBLE_LOAD_CALLBACK_PLUGINS").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_scalar_args_as_pairs() {
        let mut map = VarMap::new();
        map.insert("name".into(), VarValue::from("nginx"));
        map.insert("msg".into(), VarValue::from("hello world"));
        map.insert("force".into(), VarValue::from(true));

        let rendered = ModuleArgs::Structured(map).render().unwrap().unwrap();
        assert_eq!(rendered, "force=true msg='hello world' name=nginx");
    }

    #[test]
    fn test_nested_args_as_json() {
        let mut map = VarMap::new();
        map.insert("name".into(), VarValue::from("pkg"));
        map.insert("list".into(), VarValue::List(vec![VarValue::from("a")]));

        let rendered = ModuleArgs::Structured(map).render().unwrap().unwrap();
        assert_eq!(rendered, r#"{"list":["a"],"name":"pkg"}"#);
    }

    #[test]
    fn test_become_and_check_flags() {
        let mut task = AdHocTask::new("db", "shell").with_args(ModuleArgs::Raw("uptime".into()));
        task.escalate = true;
        task.check = true;
        task.verbosity = 1;

        let spec = run(&task, &context()).unwrap();
        assert_eq!(
            args(&spec),
            vec!["db", "-i", "/srv/web/inventory", "-m", "shell", "-a", "uptime", "--become", "--check", "-v"]
        );
    }

    #[test]
    fn test_gather_facts_filter() {
        let spec = gather_facts("web01", Some("ansible_mem*"), &context()).unwrap();
        assert_eq!(&spec.args[3..], ["-m", "setup", "-a", "filter='ansible_mem*'"]);

        let spec = gather_facts("web01", None, &context()).unwrap();
        assert!(!spec.args.contains(&"-a".to_string()));
    }

    #[test]
    fn test_manage_service() {
        let spec = manage_service("web", "nginx", "restarted", &context()).unwrap();
        assert!(spec.args.contains(&"--become".to_string()));
        assert!(spec.args.contains(&"name=nginx state=restarted".to_string()));

        let err = manage_service("web", "nginx", "exploded", &context()).unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn test_tail_log_quotes_path() {
        let spec = tail_log("web01", "/var/log/my app.log", 50, &context()).unwrap();
        assert!(spec.args.contains(&"tail -n 50 '/var/log/my app.log'".to_string()));
        assert!(tail_log("web01", "/var/log/syslog", 0, &context()).is_err());
    }

    #[test]
    fn test_missing_module_rejected() {
        let err = run(&AdHocTask::new("all", " "), &context()).unwrap_err();
        assert!(err.to_string().contains("module"));
    }
}
