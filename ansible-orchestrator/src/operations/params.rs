//! Typed parameters for every named operation
//!
//! Field names follow the operation table so callers can pass the same JSON
//! objects they always have. Missing optional fields take their defaults.

use crate::commands::adhoc::ModuleArgs;
use crate::commands::VarMap;
use crate::context::ContextRequest;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

fn all_hosts() -> String {
    "all".to_string()
}

fn default_log_path() -> String {
    "/var/log/syslog".to_string()
}

fn default_log_lines() -> u32 {
    100
}

/// Project and inventory pins shared by most operations
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Target {
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub inventory: Option<String>,
}

impl Target {
    pub fn request(&self) -> ContextRequest {
        ContextRequest::for_project(self.project.clone())
            .with_inventory(self.inventory.as_deref().filter(|i| !i.trim().is_empty()).map(PathBuf::from))
    }
}

/// A comma-separated string or a list of strings
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NameList {
    Joined(String),
    Items(Vec<String>),
}

impl NameList {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            NameList::Joined(joined) => vec![joined],
            NameList::Items(items) => items,
        }
    }
}

/// Colon-separated string (platform separator) or a list of paths
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PathList {
    Joined(String),
    Items(Vec<PathBuf>),
}

impl PathList {
    pub fn into_vec(self) -> Vec<PathBuf> {
        match self {
            PathList::Joined(joined) if joined.trim().is_empty() => Vec::new(),
            PathList::Joined(joined) => std::env::split_paths(&joined).collect(),
            PathList::Items(items) => items,
        }
    }
}

pub fn timeout_from(secs: Option<u64>) -> Option<Duration> {
    secs.filter(|s| *s > 0).map(Duration::from_secs)
}

#[derive(Debug, Deserialize)]
pub struct InventoryParams {
    #[serde(flatten)]
    pub target: Target,
    #[serde(default)]
    pub show_hostvars: bool,
}

#[derive(Debug, Deserialize)]
pub struct GraphParams {
    #[serde(flatten)]
    pub target: Target,
    #[serde(default)]
    pub group: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FindHostParams {
    pub hostname: String,
    #[serde(flatten)]
    pub target: Target,
}

#[derive(Debug, Deserialize)]
pub struct PlaybookParams {
    pub playbook: String,
    #[serde(flatten)]
    pub target: Target,
    #[serde(default)]
    pub extra_vars: VarMap,
    #[serde(default)]
    pub tags: Option<NameList>,
    #[serde(default)]
    pub skip_tags: Option<NameList>,
    #[serde(default)]
    pub limit: Option<String>,
    #[serde(default)]
    pub check: bool,
    #[serde(default)]
    pub diff: bool,
    #[serde(default)]
    pub verbose: u8,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct TaskParams {
    pub hosts: String,
    pub module: String,
    #[serde(default)]
    pub args: Option<ModuleArgs>,
    #[serde(flatten)]
    pub target: Target,
    #[serde(default, rename = "become")]
    pub escalate: bool,
    #[serde(default)]
    pub check: bool,
    #[serde(default)]
    pub verbose: u8,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PingParams {
    #[serde(default = "all_hosts")]
    pub hosts: String,
    #[serde(flatten)]
    pub target: Target,
}

#[derive(Debug, Deserialize)]
pub struct ValidateParams {
    pub playbook: String,
    #[serde(flatten)]
    pub target: Target,
}

#[derive(Debug, Deserialize)]
pub struct CreatePlaybookParams {
    pub path: String,
    pub content: Value,
    #[serde(default)]
    pub project: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterProjectParams {
    pub name: String,
    pub root: PathBuf,
    #[serde(default)]
    pub inventory: Option<PathBuf>,
    #[serde(default)]
    pub roles_path: Option<PathList>,
    #[serde(default)]
    pub collections_paths: Option<PathList>,
    #[serde(default)]
    pub env_vars: BTreeMap<String, String>,
    #[serde(default)]
    pub set_as_default: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectParams {
    #[serde(default)]
    pub project: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VaultParams {
    pub file_path: String,
    #[serde(default)]
    pub vault_password: Option<String>,
    #[serde(default)]
    pub vault_id: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GalaxyParams {
    #[serde(default)]
    pub requirements_file: Option<String>,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub project: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FactsParams {
    #[serde(default = "all_hosts")]
    pub hosts: String,
    #[serde(default)]
    pub filter_pattern: Option<String>,
    #[serde(flatten)]
    pub target: Target,
}

#[derive(Debug, Deserialize)]
pub struct DiagnoseParams {
    pub hostname: String,
    #[serde(flatten)]
    pub target: Target,
}

#[derive(Debug, Deserialize)]
pub struct ServiceParams {
    pub hosts: String,
    pub service: String,
    pub state: String,
    #[serde(flatten)]
    pub target: Target,
}

#[derive(Debug, Deserialize)]
pub struct HostLogsParams {
    pub hosts: String,
    #[serde(default = "default_log_path")]
    pub path: String,
    #[serde(default = "default_log_lines")]
    pub lines: u32,
    #[serde(flatten)]
    pub target: Target,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tags_accept_string_or_list() {
        let params: PlaybookParams = serde_json::from_value(json!({
            "playbook": "site.yml",
            "tags": "web,db",
            "skip_tags": ["slow"],
            "project": "infra"
        }))
        .unwrap();
        assert_eq!(params.tags.unwrap().into_vec(), vec!["web,db"]);
        assert_eq!(params.skip_tags.unwrap().into_vec(), vec!["slow"]);
        assert_eq!(params.target.project.as_deref(), Some("infra"));
    }

    #[test]
    fn test_become_renamed() {
        let params: TaskParams = serde_json::from_value(json!({
            "hosts": "web",
            "module": "apt",
            "args": {"name": "nginx", "state": "present"},
            "become": true
        }))
        .unwrap();
        assert!(params.escalate);
        assert!(matches!(params.args, Some(ModuleArgs::Structured(_))));

        let raw: TaskParams =
            serde_json::from_value(json!({"hosts": "web", "module": "shell", "args": "uptime"})).unwrap();
        assert_eq!(raw.args, Some(ModuleArgs::Raw("uptime".into())));
    }

    #[test]
    fn test_path_list_split() {
        let params: RegisterProjectParams = serde_json::from_value(json!({
            "name": "infra",
            "root": "/srv/infra",
            "roles_path": "roles:/usr/share/ansible/roles",
            "collections_paths": ["collections"]
        }))
        .unwrap();
        assert_eq!(
            params.roles_path.unwrap().into_vec(),
            vec![PathBuf::from("roles"), PathBuf::from("/usr/share/ansible/roles")]
        );
        assert_eq!(params.collections_paths.unwrap().into_vec(), vec![PathBuf::from("collections")]);
    }

    #[test]
    fn test_defaults() {
        let params: PingParams = serde_json::from_value(json!({})).unwrap();
        assert_eq!(params.hosts, "all");
        assert!(params.target.request().inventory.is_none());

        let logs: HostLogsParams = serde_json::from_value(json!({"hosts": "web01"})).unwrap();
        assert_eq!((logs.path.as_str(), logs.lines), ("/var/log/syslog", 100));
    }

    #[test]
    fn test_missing_required_field() {
        assert!(serde_json::from_value::<DiagnoseParams>(json!({"inventory": "x"})).is_err());
    }
}
