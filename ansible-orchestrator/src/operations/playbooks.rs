//! Playbook files inside a project root: discovery and creation

use crate::error::{OrchestratorError, Result};
use serde_json::Value;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Directories that hold YAML but never top-level playbooks
pub const SKIPPED_DIRS: &[&str] = &[
    ".git",
    "group_vars",
    "host_vars",
    "roles",
    "collections",
    "venv",
    ".venv",
    "__pycache__",
];

fn is_playbook_file(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("yml" | "yaml"))
}

/// Every `*.yml` / `*.yaml` under `root` outside skipped directories, as
/// forward-slash relative paths, sorted
pub fn discover_playbooks(root: &Path) -> Result<Vec<String>> {
    let mut found = Vec::new();
    collect(root, &mut found)?;

    let mut relative: Vec<String> = found
        .iter()
        .filter_map(|path| path.strip_prefix(root).ok())
        .map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect();
    relative.sort();
    debug!("Discovered {} playbooks under {}", relative.len(), root.display());
    Ok(relative)
}

fn collect(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        // Symlinked directories are never walked
        if entry.file_type()?.is_dir() {
            let skip = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| SKIPPED_DIRS.contains(&n));
            if !skip {
                collect(&path, out)?;
            }
        } else if is_playbook_file(&path) {
            out.push(path);
        }
    }
    Ok(())
}

/// Target path for a new playbook; must stay inside the project root
pub fn playbook_path(root: &Path, relative: &str) -> Result<PathBuf> {
    let relative = Path::new(relative.trim());
    if relative.as_os_str().is_empty() {
        return Err(OrchestratorError::validation("`path` is required"));
    }
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(OrchestratorError::validation(format!(
            "playbook path must be relative to the project root: {}",
            relative.display()
        )));
    }
    if !is_playbook_file(relative) {
        return Err(OrchestratorError::validation("playbook path must end in .yml or .yaml"));
    }
    Ok(root.join(relative))
}

/// YAML text for the given content: strings are checked and kept verbatim,
/// structured content is serialized
pub fn render_playbook(content: &Value) -> Result<String> {
    match content {
        Value::String(text) => {
            serde_yaml::from_str::<serde_yaml::Value>(text)
                .map_err(|e| OrchestratorError::validation(format!("content is not valid YAML: {}", e)))?;
            Ok(text.clone())
        }
        Value::Array(_) | Value::Object(_) => Ok(serde_yaml::to_string(content)?),
        _ => Err(OrchestratorError::validation(
            "content must be YAML text, a list of plays or a mapping",
        )),
    }
}

/// Write a playbook under `root`, creating parent directories
pub fn write_playbook(root: &Path, relative: &str, content: &Value) -> Result<PathBuf> {
    let path = playbook_path(root, relative)?;
    let text = render_playbook(content)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, text)?;
    info!("Playbook written to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "---\n").unwrap();
    }

    #[test]
    fn test_discovery_skips_non_playbook_dirs() {
        let dir = TempDir::new().unwrap();
        for rel in [
            "site.yml",
            "deploy/web.yaml",
            "roles/nginx/tasks/main.yml",
            "group_vars/all.yml",
            "host_vars/web01.yml",
            "collections/ansible_collections/x/galaxy.yml",
            ".git/hooks/x.yml",
            ".venv/lib/x.yml",
            "README.md",
        ] {
            touch(dir.path(), rel);
        }

        let found = discover_playbooks(dir.path()).unwrap();
        assert_eq!(found, vec!["deploy/web.yaml", "site.yml"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directories_not_walked() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "site.yml");
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();

        let found = discover_playbooks(dir.path()).unwrap();
        assert_eq!(found, vec!["site.yml"]);
    }

    #[test]
    fn test_path_must_stay_inside_root() {
        let root = Path::new("/srv/infra");
        assert!(playbook_path(root, "../etc/evil.yml").is_err());
        assert!(playbook_path(root, "/etc/evil.yml").is_err());
        assert!(playbook_path(root, "notes.txt").is_err());
        assert_eq!(
            playbook_path(root, "plays/new.yml").unwrap(),
            PathBuf::from("/srv/infra/plays/new.yml")
        );
    }

    #[test]
    fn test_structured_content_serialized() {
        let dir = TempDir::new().unwrap();
        let content = json!([{"name": "web", "hosts": "webservers", "tasks": []}]);
        let path = write_playbook(dir.path(), "plays/web.yml", &content).unwrap();

        let written: serde_yaml::Value = serde_yaml::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written[0]["hosts"], serde_yaml::Value::from("webservers"));
    }

    #[test]
    fn test_text_content_validated() {
        assert!(render_playbook(&json!("- hosts: all\n  tasks: []\n")).is_ok());
        assert_eq!(
            render_playbook(&json!("- hosts: [unclosed")).unwrap_err().kind(),
            "validation_error"
        );
        assert!(render_playbook(&json!(42)).is_err());
    }
}
