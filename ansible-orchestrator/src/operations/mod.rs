//! Named operations: JSON params in, JSON payload out
//!
//! Each operation resolves its context, builds one or more command specs,
//! runs them through the configured `CommandRunner` and interprets the
//! output. Failures of this core come back as
//! `{"error": {"kind": ..., "message": ...}}`; a non-zero engine exit is a
//! regular payload with `"success": false`.

pub mod params;
pub mod playbooks;

use crate::commands::{
    adhoc::{self, AdHocTask},
    galaxy, inventory,
    playbook::{self, PlaybookRun},
    vault::{self, VaultAction, VaultRequest},
    CommandSpec,
};
use crate::config::{EnvMap, ProjectDefinition, ProjectRegistry};
use crate::context::{resolve, ContextRequest, ExecutionContext};
use crate::diagnostics;
use crate::error::{OrchestratorError, Result};
use crate::execution::{CommandRunner, ExecutionResult};
use crate::interpreters::{parse_adhoc, parse_facts, parse_inventory, parse_recap, recap, LogInterpreter};
use crate::state::{new_state, Shared};
use params::*;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

pub const TOOLS: &[&str] = &[
    "ansible_inventory",
    "inventory_graph",
    "inventory_find_host",
    "ansible_playbook",
    "ansible_task",
    "ansible_ping",
    "validate_playbook",
    "create_playbook",
    "register_project",
    "list_projects",
    "project_playbooks",
    "vault_encrypt",
    "vault_decrypt",
    "vault_view",
    "galaxy_install",
    "ansible_gather_facts",
    "ansible_diagnose_host",
    "ansible_service_manager",
    "ansible_host_logs",
];

/// Structured error payload
pub fn error_payload(error: &OrchestratorError) -> Value {
    json!({"error": {"kind": error.kind(), "message": error.to_string()}})
}

/// Common fields of every payload describing one finished invocation
pub fn run_payload(spec: &CommandSpec, result: &ExecutionResult) -> Value {
    json!({
        "success": result.success(),
        "command": spec.display(),
        "exit_code": result.exit_code,
        "stdout": result.stdout,
        "stderr": result.stderr,
        "duration_ms": result.duration.as_millis() as u64,
        "timed_out": result.timed_out,
    })
}

fn parse_params<T: DeserializeOwned>(tool: &str, params: Value) -> Result<T> {
    let params = if params.is_null() { json!({}) } else { params };
    serde_json::from_value(params)
        .map_err(|e| OrchestratorError::validation(format!("invalid parameters for {}: {}", tool, e)))
}

pub struct Orchestrator {
    registry: Shared<ProjectRegistry>,
    runner: Arc<dyn CommandRunner>,
    env: EnvMap,
    cwd: PathBuf,
}

impl Orchestrator {
    pub fn new(registry: ProjectRegistry, runner: Arc<dyn CommandRunner>, env: EnvMap, cwd: PathBuf) -> Self {
        Self {
            registry: new_state(registry),
            runner,
            env,
            cwd,
        }
    }

    /// Resolve under a read guard; the guard never lives across an await
    pub fn context(&self, request: &ContextRequest) -> Result<ExecutionContext> {
        let registry = self.registry.read();
        resolve(&registry, request, &self.cwd, &self.env)
    }

    /// Run a named operation, folding every error into an error payload
    pub async fn dispatch(&self, tool: &str, params: Value) -> Value {
        info!("Operation {} requested", tool);
        match self.call(tool, params).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Operation {} failed: {}", tool, e);
                error_payload(&e)
            }
        }
    }

    pub async fn call(&self, tool: &str, params: Value) -> Result<Value> {
        match tool {
            "ansible_inventory" => self.ansible_inventory(parse_params(tool, params)?).await,
            "inventory_graph" => self.inventory_graph(parse_params(tool, params)?).await,
            "inventory_find_host" => self.inventory_find_host(parse_params(tool, params)?).await,
            "ansible_playbook" => self.ansible_playbook(parse_params(tool, params)?).await,
            "ansible_task" => self.ansible_task(parse_params(tool, params)?).await,
            "ansible_ping" => self.ansible_ping(parse_params(tool, params)?).await,
            "validate_playbook" => self.validate_playbook(parse_params(tool, params)?).await,
            "create_playbook" => self.create_playbook(parse_params(tool, params)?),
            "register_project" => self.register_project(parse_params(tool, params)?),
            "list_projects" => Ok(self.list_projects()),
            "project_playbooks" => self.project_playbooks(parse_params(tool, params)?),
            "vault_encrypt" => self.vault(VaultAction::Encrypt, parse_params(tool, params)?).await,
            "vault_decrypt" => self.vault(VaultAction::Decrypt, parse_params(tool, params)?).await,
            "vault_view" => self.vault(VaultAction::View, parse_params(tool, params)?).await,
            "galaxy_install" => self.galaxy_install(parse_params(tool, params)?).await,
            "ansible_gather_facts" => self.gather_facts(parse_params(tool, params)?).await,
            "ansible_diagnose_host" => self.diagnose_host(parse_params(tool, params)?).await,
            "ansible_service_manager" => self.service_manager(parse_params(tool, params)?).await,
            "ansible_host_logs" => self.host_logs(parse_params(tool, params)?).await,
            other => Err(OrchestratorError::validation(format!(
                "unknown operation '{}', expected one of: {}",
                other,
                TOOLS.join(", ")
            ))),
        }
    }

    async fn execute(&self, spec: CommandSpec) -> Result<(CommandSpec, ExecutionResult)> {
        let result = self.runner.run(spec.clone()).await?;
        Ok((spec, result))
    }

    /// Run payload plus per-host outcomes when the callback output parses.
    /// Unparseable output is only an error when the run itself succeeded.
    async fn adhoc_payload(&self, spec: CommandSpec) -> Result<Value> {
        let (spec, result) = self.execute(spec).await?;
        let mut payload = run_payload(&spec, &result);
        match parse_adhoc(&result.stdout) {
            Ok(outcomes) => payload["results"] = json!(outcomes),
            Err(e) if result.success() => return Err(e),
            Err(_) => {}
        }
        Ok(payload)
    }

    async fn ansible_inventory(&self, p: InventoryParams) -> Result<Value> {
        let ctx = self.context(&p.target.request())?;
        let (spec, result) = self.execute(inventory::list(&ctx)?).await?;
        if !result.success() {
            return Ok(run_payload(&spec, &result));
        }

        let graph = parse_inventory(&result.stdout)?;
        let group_hosts: serde_json::Map<String, Value> = graph
            .groups
            .keys()
            .map(|group| (group.clone(), json!(graph.hosts_in(group))))
            .collect();
        let mut payload = json!({
            "success": true,
            "inventory": ctx.inventory,
            "group_hosts": group_hosts,
            "hosts": graph.hosts.keys().collect::<Vec<_>>(),
            "groups": graph.groups.keys().collect::<Vec<_>>(),
            "total_hosts": graph.hosts.len(),
            "total_groups": graph.groups.len(),
        });
        if p.show_hostvars {
            let hostvars: serde_json::Map<String, Value> = graph
                .hosts
                .iter()
                .map(|(name, host)| (name.clone(), json!(host.vars)))
                .collect();
            payload["hostvars"] = Value::Object(hostvars);
        }
        Ok(payload)
    }

    async fn inventory_graph(&self, p: GraphParams) -> Result<Value> {
        let ctx = self.context(&p.target.request())?;
        let (spec, result) = self.execute(inventory::graph(p.group.as_deref(), &ctx)?).await?;
        let mut payload = run_payload(&spec, &result);
        payload["graph"] = json!(result.stdout);
        Ok(payload)
    }

    async fn inventory_find_host(&self, p: FindHostParams) -> Result<Value> {
        let hostname = p.hostname.trim();
        if hostname.is_empty() {
            return Err(OrchestratorError::validation("`hostname` is required"));
        }
        let ctx = self.context(&p.target.request())?;
        let (spec, result) = self.execute(inventory::list(&ctx)?).await?;
        if !result.success() {
            return Ok(run_payload(&spec, &result));
        }

        let graph = parse_inventory(&result.stdout)?;
        Ok(match graph.find_host(hostname) {
            Some(host) => json!({"success": true, "found": true, "host": host}),
            None => json!({"success": true, "found": false, "hostname": hostname}),
        })
    }

    async fn ansible_playbook(&self, p: PlaybookParams) -> Result<Value> {
        let ctx = self.context(&p.target.request())?;
        let run = PlaybookRun {
            playbook: p.playbook,
            extra_vars: p.extra_vars,
            tags: p.tags.map(NameList::into_vec).unwrap_or_default(),
            skip_tags: p.skip_tags.map(NameList::into_vec).unwrap_or_default(),
            limit: p.limit,
            check: p.check,
            diff: p.diff,
            verbosity: p.verbose,
            timeout: timeout_from(p.timeout_secs),
        };
        let (spec, result) = self.execute(playbook::run(&run, &ctx)?).await?;

        let summary = parse_recap(&result.stdout)?;
        let mut payload = run_payload(&spec, &result);
        payload["failed_hosts"] = json!(recap::failed_hosts(&summary));
        payload["recap"] = json!(summary);
        Ok(payload)
    }

    async fn ansible_task(&self, p: TaskParams) -> Result<Value> {
        let ctx = self.context(&p.target.request())?;
        let task = AdHocTask {
            pattern: p.hosts,
            module: p.module,
            args: p.args,
            escalate: p.escalate,
            check: p.check,
            verbosity: p.verbose,
            timeout: timeout_from(p.timeout_secs),
        };
        self.adhoc_payload(adhoc::run(&task, &ctx)?).await
    }

    async fn ansible_ping(&self, p: PingParams) -> Result<Value> {
        let ctx = self.context(&p.target.request())?;
        let (spec, result) = self.execute(adhoc::ping(&p.hosts, &ctx)?).await?;
        let mut payload = run_payload(&spec, &result);

        match parse_adhoc(&result.stdout) {
            Ok(outcomes) => {
                let reachable = outcomes.iter().filter(|o| o.status.is_success()).count();
                let hosts: serde_json::Map<String, Value> = outcomes
                    .iter()
                    .map(|o| {
                        let entry = json!({
                            "reachable": o.status.is_success(),
                            "status": o.status,
                            "message": o.message,
                        });
                        (o.host.clone(), entry)
                    })
                    .collect();
                payload["hosts"] = Value::Object(hosts);
                payload["reachable"] = json!(reachable);
                payload["unreachable"] = json!(outcomes.len() - reachable);
            }
            Err(e) if result.success() => return Err(e),
            Err(_) => {}
        }
        Ok(payload)
    }

    async fn validate_playbook(&self, p: ValidateParams) -> Result<Value> {
        let ctx = self.context(&p.target.request())?;
        let (spec, result) = self.execute(playbook::syntax_check(&p.playbook, &ctx)?).await?;
        let mut payload = run_payload(&spec, &result);
        payload["valid"] = json!(result.success());
        payload["playbook"] = json!(p.playbook);
        Ok(payload)
    }

    fn create_playbook(&self, p: CreatePlaybookParams) -> Result<Value> {
        let ctx = self.context(&ContextRequest::for_project(p.project))?;
        let path = playbooks::write_playbook(&ctx.root, &p.path, &p.content)?;
        Ok(json!({
            "success": true,
            "path": path,
            "message": format!("Playbook created at {}", path.display()),
        }))
    }

    fn register_project(&self, p: RegisterProjectParams) -> Result<Value> {
        let root = if p.root.is_absolute() { p.root } else { self.cwd.join(p.root) };
        let mut project = ProjectDefinition::new(p.name.trim(), root);
        project.inventory = p.inventory;
        project.roles_path = p.roles_path.map(PathList::into_vec).unwrap_or_default();
        project.collections_paths = p.collections_paths.map(PathList::into_vec).unwrap_or_default();
        project.env_vars = p.env_vars;

        let name = project.name.clone();
        let root = project.root.clone();
        let mut registry = self.registry.write();
        registry.register(project, p.set_as_default)?;

        Ok(json!({
            "success": true,
            "project": name,
            "root": root,
            "is_default": registry.default_project() == Some(name.as_str()),
            "registry": registry.location(),
        }))
    }

    fn list_projects(&self) -> Value {
        let registry = self.registry.read();
        let default = registry.default_project();
        let projects: serde_json::Map<String, Value> = registry
            .projects()
            .map(|p| {
                let entry = json!({
                    "root": p.root,
                    "inventory": p.inventory,
                    "roles_path": p.roles_path,
                    "collections_paths": p.collections_paths,
                    "is_default": default == Some(p.name.as_str()),
                });
                (p.name.clone(), entry)
            })
            .collect();

        json!({
            "projects": projects,
            "default": default,
            "total": registry.len(),
        })
    }

    fn project_playbooks(&self, p: ProjectParams) -> Result<Value> {
        let ctx = self.context(&ContextRequest::for_project(p.project))?;
        let found = playbooks::discover_playbooks(&ctx.root)?;
        Ok(json!({
            "project": ctx.project,
            "root": ctx.root,
            "total": found.len(),
            "playbooks": found,
        }))
    }

    async fn vault(&self, action: VaultAction, p: VaultParams) -> Result<Value> {
        let ctx = self.context(&ContextRequest::for_project(p.project))?;
        let mut request = VaultRequest::new(action, p.file_path);
        request.vault_id = p.vault_id;

        // Lives until the run finishes, removed on drop
        let password_file = match p.vault_password.as_deref().filter(|pw| !pw.is_empty()) {
            Some(password) => {
                let mut file = tempfile::Builder::new().prefix(".vault-pass-").tempfile()?;
                file.write_all(password.as_bytes())?;
                file.flush()?;
                request.password_file = Some(file.path().to_path_buf());
                Some(file)
            }
            None => None,
        };

        let (spec, result) = self.execute(vault::build(&request, &ctx)?).await?;
        drop(password_file);

        let mut payload = run_payload(&spec, &result);
        payload["file"] = json!(request.file);
        if action == VaultAction::View && result.success() {
            payload["content"] = json!(result.stdout);
        }
        Ok(payload)
    }

    async fn galaxy_install(&self, p: GalaxyParams) -> Result<Value> {
        let ctx = self.context(&ContextRequest::for_project(p.project))?;
        let (spec, result) = self
            .execute(galaxy::install(p.requirements_file.as_deref(), p.force, &ctx)?)
            .await?;
        Ok(run_payload(&spec, &result))
    }

    async fn gather_facts(&self, p: FactsParams) -> Result<Value> {
        let ctx = self.context(&p.target.request())?;
        let filter = p.filter_pattern.as_deref();
        let (spec, result) = self.execute(adhoc::gather_facts(&p.hosts, filter, &ctx)?).await?;

        let facts = match parse_facts(&result.stdout, filter) {
            Ok(facts) => facts,
            Err(_) if !result.success() => return Ok(run_payload(&spec, &result)),
            Err(e) => return Err(e),
        };
        Ok(json!({
            "success": result.success(),
            "command": spec.display(),
            "facts": facts.hosts,
            "unavailable": facts.unavailable,
            "timed_out": result.timed_out,
        }))
    }

    async fn diagnose_host(&self, p: DiagnoseParams) -> Result<Value> {
        let ctx = self.context(&p.target.request())?;
        let report = diagnostics::diagnose(self.runner.as_ref(), &p.hostname, &ctx).await?;
        Ok(json!({
            "hostname": report.host,
            "health_score": report.score,
            "category_scores": report.category_scores,
            "findings": report.findings,
            "details": report.details,
        }))
    }

    async fn service_manager(&self, p: ServiceParams) -> Result<Value> {
        let ctx = self.context(&p.target.request())?;
        self.adhoc_payload(adhoc::manage_service(&p.hosts, &p.service, &p.state, &ctx)?)
            .await
    }

    async fn host_logs(&self, p: HostLogsParams) -> Result<Value> {
        let ctx = self.context(&p.target.request())?;
        let (spec, result) = self.execute(adhoc::tail_log(&p.hosts, &p.path, p.lines, &ctx)?).await?;

        let outcomes = match parse_adhoc(&result.stdout) {
            Ok(outcomes) => outcomes,
            Err(_) if !result.success() => return Ok(run_payload(&spec, &result)),
            Err(e) => return Err(e),
        };

        let interpreter = LogInterpreter::new()?;
        let hosts: serde_json::Map<String, Value> = outcomes
            .iter()
            .map(|o| {
                let entries = interpreter.parse(o.stdout().unwrap_or_default());
                let entry = json!({"status": o.status, "message": o.message, "entries": entries});
                (o.host.clone(), entry)
            })
            .collect();

        Ok(json!({
            "success": result.success(),
            "command": spec.display(),
            "path": p.path,
            "hosts": hosts,
            "timed_out": result.timed_out,
        }))
    }
}
