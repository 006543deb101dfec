//! Project registry and environment configuration
//!
//! Handles:
//! - Registry document location (env override, local file, home file)
//! - Loading and validating named project definitions
//! - Whole-document rewrite on every registration
//! - Engine settings (binary directory, default timeout)

use crate::error::{OrchestratorError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Snapshot of a process environment
pub type EnvMap = BTreeMap<String, String>;

pub const ENV_CONFIG_FILE: &str = "MCP_ANSIBLE_CONFIG";
pub const ENV_PROJECT_ROOT: &str = "MCP_ANSIBLE_PROJECT_ROOT";
pub const ENV_INVENTORY: &str = "MCP_ANSIBLE_INVENTORY";
pub const ENV_PROJECT_NAME: &str = "MCP_ANSIBLE_PROJECT_NAME";
pub const ENV_ROLES_PATH: &str = "MCP_ANSIBLE_ROLES_PATH";
pub const ENV_COLLECTIONS_PATHS: &str = "MCP_ANSIBLE_COLLECTIONS_PATHS";
pub const ENV_ENGINE_CONFIG: &str = "MCP_ANSIBLE_CFG";
pub const ENV_BIN_DIR: &str = "MCP_ANSIBLE_BIN_DIR";
pub const ENV_TIMEOUT_SECS: &str = "MCP_ANSIBLE_TIMEOUT_SECS";
/// Variables named `MCP_ANSIBLE_ENV_FOO` are forwarded as `FOO`
pub const ENV_FORWARD_PREFIX: &str = "MCP_ANSIBLE_ENV_";

pub const REGISTRY_FILE_NAME: &str = ".ansible-mcp-config.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Capture the current process environment, skipping non-UTF-8 entries
pub fn process_env() -> EnvMap {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}

/// Named bundle of root, inventory and search paths for one automation target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDefinition {
    /// Key in the registry, not stored inside the entry
    #[serde(skip)]
    pub name: String,
    pub root: PathBuf,
    #[serde(default)]
    pub inventory: Option<PathBuf>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub roles_path: Vec<PathBuf>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub collections_paths: Vec<PathBuf>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub env_vars: BTreeMap<String, String>,
}

impl ProjectDefinition {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            inventory: None,
            roles_path: Vec::new(),
            collections_paths: Vec::new(),
            env_vars: BTreeMap::new(),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// On-disk shape of the registry
#[derive(Debug, Serialize, Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    default_project: Option<String>,
    #[serde(default)]
    projects: BTreeMap<String, ProjectDefinition>,
}

/// Persistent store of project definitions plus the designated default
#[derive(Debug, Clone, Default)]
pub struct ProjectRegistry {
    projects: BTreeMap<String, ProjectDefinition>,
    default_project: Option<String>,
    /// None for purely in-memory registries
    location: Option<PathBuf>,
}

impl ProjectRegistry {
    /// Empty registry that never touches the disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Registry document path: env override, then `./.ansible-mcp-config.json`
    /// when it exists, then the home directory file
    pub fn locate(env: &EnvMap, cwd: &Path) -> PathBuf {
        if let Some(path) = env.get(ENV_CONFIG_FILE).filter(|p| !p.is_empty()) {
            return PathBuf::from(path);
        }

        let local = cwd.join(REGISTRY_FILE_NAME);
        if local.exists() {
            return local;
        }

        dirs::home_dir()
            .unwrap_or_else(|| cwd.to_path_buf())
            .join(REGISTRY_FILE_NAME)
    }

    /// Load from the first candidate location
    pub fn load(env: &EnvMap, cwd: &Path) -> Result<Self> {
        Self::load_from(Self::locate(env, cwd))
    }

    /// Load from an explicit path; a missing file yields an empty registry
    /// that will be written there on first registration
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if !path.exists() {
            debug!("No registry document at {}, starting empty", path.display());
            return Ok(Self {
                location: Some(path),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&path).map_err(|source| OrchestratorError::RegistryIo {
            path: path.clone(),
            source,
        })?;
        let mut registry = Self::parse(&content).map_err(|reason| OrchestratorError::InvalidRegistry {
            path: path.clone(),
            reason,
        })?;
        info!("Loaded {} projects from {}", registry.projects.len(), path.display());

        registry.location = Some(path);
        Ok(registry)
    }

    fn parse(content: &str) -> std::result::Result<Self, String> {
        let document: RegistryDocument =
            serde_json::from_str(content).map_err(|e| e.to_string())?;

        let mut projects = BTreeMap::new();
        for (name, mut project) in document.projects {
            if name.trim().is_empty() {
                return Err("project name cannot be empty".to_string());
            }
            project.name = name.clone();
            projects.insert(name, project);
        }

        if let Some(default) = &document.default_project {
            if !projects.contains_key(default) {
                return Err(format!("default project '{}' is not registered", default));
            }
        }

        Ok(Self {
            projects,
            default_project: document.default_project,
            location: None,
        })
    }

    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&ProjectDefinition> {
        self.projects.get(name)
    }

    pub fn projects(&self) -> impl Iterator<Item = &ProjectDefinition> {
        self.projects.values()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn default_project(&self) -> Option<&str> {
        self.default_project.as_deref()
    }

    /// Insert or replace a project wholesale, then rewrite the document.
    /// The project becomes default when asked to or when no default exists.
    pub fn register(&mut self, project: ProjectDefinition, set_as_default: bool) -> Result<()> {
        if project.name.trim().is_empty() {
            return Err(OrchestratorError::validation("project name cannot be empty"));
        }

        let name = project.name.clone();
        let previous_projects = self.projects.clone();
        let previous_default = self.default_project.clone();

        self.projects.insert(name.clone(), project);
        if set_as_default || self.default_project.is_none() {
            self.default_project = Some(name.clone());
        }

        if let Err(e) = self.persist() {
            // Keep memory and disk in agreement
            self.projects = previous_projects;
            self.default_project = previous_default;
            return Err(e);
        }

        info!("Registered project {} (default: {:?})", name, self.default_project);
        Ok(())
    }

    /// Serialized document, byte-stable for identical content
    pub fn to_document_string(&self) -> Result<String> {
        let document = RegistryDocument {
            default_project: self.default_project.clone(),
            projects: self.projects.clone(),
        };
        let mut content = serde_json::to_string_pretty(&document)?;
        content.push('\n');
        Ok(content)
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.location else {
            return Ok(());
        };
        let content = self.to_document_string()?;
        atomic_write(path, content.as_bytes()).map_err(|source| OrchestratorError::RegistryIo {
            path: path.clone(),
            source,
        })?;
        debug!("Registry written to {}", path.display());
        Ok(())
    }
}

/// temp file + rename so readers never see a partial document
fn atomic_write(target: &Path, content: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let temp_path = target.with_extension("json.tmp");
    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, target)
}

/// Where the engine binaries live and how long they may run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub bin_dir: Option<PathBuf>,
    pub default_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            bin_dir: None,
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl EngineSettings {
    pub fn from_env(env: &EnvMap) -> Self {
        let bin_dir = env
            .get(ENV_BIN_DIR)
            .filter(|d| !d.is_empty())
            .map(PathBuf::from);
        let default_timeout = env
            .get(ENV_TIMEOUT_SECS)
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        Self { bin_dir, default_timeout }
    }

    /// Full program path for an engine binary name
    pub fn program(&self, binary: &str) -> String {
        match &self.bin_dir {
            Some(dir) => dir.join(binary).to_string_lossy().into_owned(),
            None => binary.to_string(),
        }
    }
}
