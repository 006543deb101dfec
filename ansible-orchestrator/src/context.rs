//! Execution context resolution
//!
//! Every field of the context is resolved on its own, by walking an ordered
//! chain of sources and keeping the first one that has an opinion:
//! explicit request value, resolved project, environment variable, then the
//! built-in default. A caller can therefore pin the inventory while still
//! inheriting the project's roles path.

use crate::config::{
    EngineSettings, EnvMap, ProjectDefinition, ProjectRegistry, ENV_COLLECTIONS_PATHS,
    ENV_ENGINE_CONFIG, ENV_FORWARD_PREFIX, ENV_INVENTORY, ENV_PROJECT_NAME, ENV_PROJECT_ROOT,
    ENV_ROLES_PATH,
};
use crate::error::{OrchestratorError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_INVENTORY: &str = "inventory";

/// Values a caller pins for one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextRequest {
    pub project: Option<String>,
    pub root: Option<PathBuf>,
    pub inventory: Option<PathBuf>,
    pub roles_path: Option<Vec<PathBuf>>,
    pub collections_paths: Option<Vec<PathBuf>>,
}

impl ContextRequest {
    pub fn for_project(project: Option<String>) -> Self {
        Self {
            project,
            ..Self::default()
        }
    }

    pub fn with_inventory(mut self, inventory: Option<PathBuf>) -> Self {
        self.inventory = inventory;
        self
    }
}

/// Fully merged settings for a single invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Name of the project the context came from, if any
    pub project: Option<String>,
    pub root: PathBuf,
    pub inventory: PathBuf,
    pub roles_path: Vec<PathBuf>,
    pub collections_paths: Vec<PathBuf>,
    pub engine_config: Option<PathBuf>,
    pub environment: EnvMap,
    pub engine: EngineSettings,
}

struct Sources<'a> {
    request: &'a ContextRequest,
    project: Option<&'a ProjectDefinition>,
    env: &'a EnvMap,
}

type FieldResolver<T> = for<'s, 'a> fn(&'s Sources<'a>) -> Option<T>;

fn first_opinion<T>(sources: &Sources<'_>, chain: &[FieldResolver<T>]) -> Option<T> {
    chain.iter().find_map(|resolve| resolve(sources))
}

fn env_value<'a>(sources: &Sources<'a>, key: &str) -> Option<&'a str> {
    sources
        .env
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
}

fn env_path_list(sources: &Sources<'_>, key: &str) -> Option<Vec<PathBuf>> {
    let paths: Vec<PathBuf> = std::env::split_paths(env_value(sources, key)?)
        .filter(|p| !p.as_os_str().is_empty())
        .collect();
    (!paths.is_empty()).then_some(paths)
}

// root

fn explicit_root(s: &Sources<'_>) -> Option<PathBuf> {
    s.request.root.clone()
}

fn project_root(s: &Sources<'_>) -> Option<PathBuf> {
    s.project.map(|p| p.root.clone())
}

fn env_root(s: &Sources<'_>) -> Option<PathBuf> {
    env_value(s, ENV_PROJECT_ROOT).map(PathBuf::from)
}

const ROOT_CHAIN: &[FieldResolver<PathBuf>] = &[explicit_root, project_root, env_root];

// inventory

fn explicit_inventory(s: &Sources<'_>) -> Option<PathBuf> {
    s.request.inventory.clone()
}

fn project_inventory(s: &Sources<'_>) -> Option<PathBuf> {
    s.project.and_then(|p| p.inventory.clone())
}

fn env_inventory(s: &Sources<'_>) -> Option<PathBuf> {
    env_value(s, ENV_INVENTORY).map(PathBuf::from)
}

const INVENTORY_CHAIN: &[FieldResolver<PathBuf>] =
    &[explicit_inventory, project_inventory, env_inventory];

// roles path

fn explicit_roles(s: &Sources<'_>) -> Option<Vec<PathBuf>> {
    s.request.roles_path.clone()
}

fn project_roles(s: &Sources<'_>) -> Option<Vec<PathBuf>> {
    s.project
        .map(|p| p.roles_path.clone())
        .filter(|paths| !paths.is_empty())
}

fn env_roles(s: &Sources<'_>) -> Option<Vec<PathBuf>> {
    env_path_list(s, ENV_ROLES_PATH)
}

const ROLES_CHAIN: &[FieldResolver<Vec<PathBuf>>] = &[explicit_roles, project_roles, env_roles];

// collections paths

fn explicit_collections(s: &Sources<'_>) -> Option<Vec<PathBuf>> {
    s.request.collections_paths.clone()
}

fn project_collections(s: &Sources<'_>) -> Option<Vec<PathBuf>> {
    s.project
        .map(|p| p.collections_paths.clone())
        .filter(|paths| !paths.is_empty())
}

fn env_collections(s: &Sources<'_>) -> Option<Vec<PathBuf>> {
    env_path_list(s, ENV_COLLECTIONS_PATHS)
}

const COLLECTIONS_CHAIN: &[FieldResolver<Vec<PathBuf>>] =
    &[explicit_collections, project_collections, env_collections];

// engine config file

fn env_engine_config(s: &Sources<'_>) -> Option<PathBuf> {
    env_value(s, ENV_ENGINE_CONFIG).map(PathBuf::from)
}

const ENGINE_CONFIG_CHAIN: &[FieldResolver<PathBuf>] = &[env_engine_config];

/// Pick the project: explicit name, env override, registry default, then the
/// only registered project. A name that is given but unknown is an error.
pub fn select_project<'r>(
    registry: &'r ProjectRegistry,
    explicit: Option<&str>,
    process_env: &EnvMap,
) -> Result<Option<&'r ProjectDefinition>> {
    let named = explicit
        .filter(|n| !n.trim().is_empty())
        .or_else(|| {
            process_env
                .get(ENV_PROJECT_NAME)
                .map(String::as_str)
                .filter(|n| !n.trim().is_empty())
        });

    if let Some(name) = named {
        return registry
            .get(name)
            .map(Some)
            .ok_or_else(|| OrchestratorError::ProjectNotFound(name.to_string()));
    }

    if let Some(default) = registry.default_project() {
        return Ok(registry.get(default));
    }

    if registry.len() == 1 {
        return Ok(registry.projects().next());
    }

    Ok(None)
}

/// Process environment, overlaid by project variables, overlaid by
/// forwarded `MCP_ANSIBLE_ENV_*` variables with the prefix stripped
pub fn merge_environment(process_env: &EnvMap, project: Option<&ProjectDefinition>) -> EnvMap {
    let mut environment = process_env.clone();

    if let Some(project) = project {
        environment.extend(project.env_vars.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    for (key, value) in process_env {
        if let Some(target) = key.strip_prefix(ENV_FORWARD_PREFIX) {
            if !target.is_empty() {
                environment.insert(target.to_string(), value.clone());
            }
        }
    }

    environment
}

fn anchor(root: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}

/// Resolve the context for one invocation
pub fn resolve(
    registry: &ProjectRegistry,
    request: &ContextRequest,
    cwd: &Path,
    process_env: &EnvMap,
) -> Result<ExecutionContext> {
    let project = select_project(registry, request.project.as_deref(), process_env)?;
    let sources = Sources {
        request,
        project,
        env: process_env,
    };

    let root = anchor(
        cwd,
        first_opinion(&sources, ROOT_CHAIN).unwrap_or_else(|| cwd.to_path_buf()),
    );
    if !root.is_dir() {
        return Err(OrchestratorError::MissingRoot(root));
    }

    let inventory = anchor(
        &root,
        first_opinion(&sources, INVENTORY_CHAIN).unwrap_or_else(|| PathBuf::from(DEFAULT_INVENTORY)),
    );
    let roles_path = first_opinion(&sources, ROLES_CHAIN).unwrap_or_default();
    let collections_paths = first_opinion(&sources, COLLECTIONS_CHAIN).unwrap_or_default();
    let engine_config = first_opinion(&sources, ENGINE_CONFIG_CHAIN).map(|p| anchor(&root, p));

    let context = ExecutionContext {
        project: project.map(|p| p.name.clone()),
        root,
        inventory,
        roles_path,
        collections_paths,
        engine_config,
        environment: merge_environment(process_env, project),
        engine: EngineSettings::from_env(process_env),
    };

    debug!(
        "Resolved context: project={:?} root={} inventory={}",
        context.project,
        context.root.display(),
        context.inventory.display()
    );
    Ok(context)
}
